pub mod handlers;
pub mod openapi;
pub mod state;
pub mod types;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use state::AppState;

/// Build the complete router.
pub fn build_router(state: Arc<AppState>) -> Router {
    // /api/v1 routes answer with the ApiResponse envelope
    let transfer_routes = Router::new()
        .route("/transfers", post(handlers::create_transfer))
        .route("/transfers/{transfer_id}", get(handlers::get_transfer))
        .route("/fees/quote", get(handlers::quote_fee))
        .route("/claims/redeem", post(handlers::redeem_claim))
        .route("/claims/{claim_code}/cancel", post(handlers::cancel_claim));

    Router::new()
        .route("/api/v1/health", get(handlers::health_check))
        .nest("/api/v1", transfer_routes)
        .route(
            "/process-bill-payment",
            post(handlers::process_bill_payment).fallback(handlers::method_not_allowed),
        )
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
}

/// Start HTTP Gateway server
pub async fn run_server(host: &str, port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = build_router(state);

    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {} (port in use?)", addr))?;

    tracing::info!("Gateway listening on http://{}", addr);
    tracing::info!("API Docs: http://{}/docs", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
