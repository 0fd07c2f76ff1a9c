//! Transfer handlers

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::core_types::TransferId;
use crate::fee::FeeQuote;
use crate::money::parse_amount;
use crate::store::TransferRecord;
use crate::transfer::TransferOutcome;

use super::super::state::AppState;
use super::super::types::{
    ApiError, ApiResult, CreateTransferRequest, FeeQuoteParams, ok,
};

/// Send money
///
/// POST /api/v1/transfers
///
/// Returns once the transfer is `COMPLETED` or held as `PENDING_CLAIM`.
/// A repeated `idempotency_key` replays the stored outcome.
#[utoipa::path(
    post,
    path = "/api/v1/transfers",
    request_body = CreateTransferRequest,
    responses(
        (status = 200, description = "Transfer completed or held for claim", content_type = "application/json"),
        (status = 400, description = "Invalid parameters"),
        (status = 422, description = "Insufficient funds"),
        (status = 500, description = "Transfer rolled back, or rollback failed"),
        (status = 503, description = "Backend not configured")
    ),
    tag = "Transfer"
)]
pub async fn create_transfer(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTransferRequest>,
) -> ApiResult<TransferOutcome> {
    let services = state.services()?;
    let req = req.into_transfer(&state.currency);
    tracing::info!(
        sender = %req.sender_id,
        performed_by = %req.performed_by,
        amount = %req.amount,
        "Transfer request"
    );
    let outcome = services.coordinator.execute(req).await?;
    ok(outcome)
}

/// Get transfer status
///
/// GET /api/v1/transfers/{transfer_id}
#[utoipa::path(
    get,
    path = "/api/v1/transfers/{transfer_id}",
    params(("transfer_id" = String, Path, description = "Transfer ULID")),
    responses(
        (status = 200, description = "Transfer record", content_type = "application/json"),
        (status = 400, description = "Malformed transfer id"),
        (status = 404, description = "Transfer not found")
    ),
    tag = "Transfer"
)]
pub async fn get_transfer(
    State(state): State<Arc<AppState>>,
    Path(transfer_id): Path<String>,
) -> ApiResult<TransferRecord> {
    let services = state.services()?;
    let id: TransferId = transfer_id
        .parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid transfer id: {}", transfer_id)))?;
    ok(services.coordinator.get(id).await?)
}

/// Quote the fee for a transfer
///
/// GET /api/v1/fees/quote?amount=1000&sender_country=CM&recipient_country=CD
#[utoipa::path(
    get,
    path = "/api/v1/fees/quote",
    params(FeeQuoteParams),
    responses(
        (status = 200, description = "Fee quote", content_type = "application/json"),
        (status = 400, description = "Invalid amount")
    ),
    tag = "Transfer"
)]
pub async fn quote_fee(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FeeQuoteParams>,
) -> ApiResult<FeeQuote> {
    let services = state.services()?;
    let amount = parse_amount(&params.amount)
        .map_err(|e| ApiError::bad_request(format!("Invalid amount: {}", e)))?;
    let quote = services.coordinator.quote(
        amount,
        &params.sender_country,
        params.recipient_country.as_deref(),
    )?;
    ok(quote)
}
