//! Claim handlers

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};

use crate::transfer::ClaimOutcome;

use super::super::state::AppState;
use super::super::types::{ApiResult, CancelClaimRequest, RedeemClaimRequest, ok};

/// Redeem a pending transfer
///
/// POST /api/v1/claims/redeem
#[utoipa::path(
    post,
    path = "/api/v1/claims/redeem",
    request_body = RedeemClaimRequest,
    responses(
        (status = 200, description = "Claim credited", content_type = "application/json"),
        (status = 400, description = "Malformed code or self-claim"),
        (status = 403, description = "Phone number does not match the claim"),
        (status = 404, description = "Unknown claim code"),
        (status = 409, description = "Claim no longer pending")
    ),
    tag = "Claim"
)]
pub async fn redeem_claim(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RedeemClaimRequest>,
) -> ApiResult<ClaimOutcome> {
    let services = state.services()?;
    let outcome = services
        .claims
        .redeem(req.into_redeem(&state.default_country))
        .await?;
    ok(outcome)
}

/// Cancel a pending transfer and refund the sender
///
/// POST /api/v1/claims/{claim_code}/cancel
#[utoipa::path(
    post,
    path = "/api/v1/claims/{claim_code}/cancel",
    params(("claim_code" = String, Path, description = "Six-character claim code")),
    request_body = CancelClaimRequest,
    responses(
        (status = 200, description = "Sender refunded", content_type = "application/json"),
        (status = 404, description = "Unknown claim code"),
        (status = 409, description = "Claim no longer pending")
    ),
    tag = "Claim"
)]
pub async fn cancel_claim(
    State(state): State<Arc<AppState>>,
    Path(claim_code): Path<String>,
    Json(req): Json<CancelClaimRequest>,
) -> ApiResult<ClaimOutcome> {
    let services = state.services()?;
    ok(services.claims.cancel(&claim_code, req.performed_by).await?)
}
