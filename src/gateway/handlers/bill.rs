//! `process-bill-payment` handler
//!
//! Replies with the flat `{success, message, ...}` body existing mobile
//! clients parse, not the `/api/v1` envelope.

use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};

use crate::bill::BillPaymentRequest;

use super::super::state::AppState;
use super::super::types::BillPaymentReply;

type BillReply = (StatusCode, Json<BillPaymentReply>);

fn reply(status: StatusCode, body: BillPaymentReply) -> BillReply {
    (status, Json(body))
}

/// Pay a bill from the user's wallet
///
/// POST /process-bill-payment
#[utoipa::path(
    post,
    path = "/process-bill-payment",
    request_body = BillPaymentRequest,
    responses(
        (status = 200, description = "Bill paid", body = BillPaymentReply),
        (status = 400, description = "Validation failure, bill already paid or insufficient balance", body = BillPaymentReply),
        (status = 404, description = "Bill or profile not found", body = BillPaymentReply),
        (status = 405, description = "Method not allowed", body = BillPaymentReply),
        (status = 500, description = "Server configuration error or failed payment", body = BillPaymentReply)
    ),
    tag = "Bill"
)]
pub async fn process_bill_payment(
    State(state): State<Arc<AppState>>,
    body: Result<Json<BillPaymentRequest>, JsonRejection>,
) -> BillReply {
    let Some(services) = state.services.as_deref() else {
        tracing::error!("Bill payment rejected: backend not configured");
        return reply(
            StatusCode::INTERNAL_SERVER_ERROR,
            BillPaymentReply::failure("Server configuration error"),
        );
    };

    let req = match body {
        Ok(Json(req)) => req,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Bill payment body rejected");
            return reply(
                StatusCode::BAD_REQUEST,
                BillPaymentReply::failure(format!("Invalid request body: {}", rejection.body_text())),
            );
        }
    };

    match services.bills.process(req).await {
        Ok(receipt) => reply(StatusCode::OK, BillPaymentReply::paid(receipt)),
        Err(e) => {
            let status = StatusCode::from_u16(e.http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            if status.is_server_error() {
                tracing::error!(code = e.code(), "Bill payment failed: {}", e);
            }
            reply(status, BillPaymentReply::failure(e.to_string()))
        }
    }
}

/// Anything but POST on `/process-bill-payment`
pub async fn method_not_allowed() -> BillReply {
    reply(
        StatusCode::METHOD_NOT_ALLOWED,
        BillPaymentReply::failure("Method not allowed"),
    )
}
