//! OpenAPI / Swagger UI Documentation
//!
//! - Swagger UI: `http://localhost:8080/docs`
//! - OpenAPI JSON: `http://localhost:8080/api-docs/openapi.json`

use utoipa::{Modify, OpenApi};

use crate::bill::{BillPaymentReceipt, BillPaymentRequest};
use crate::gateway::handlers::HealthResponse;
use crate::gateway::types::{
    BillPaymentReply, CancelClaimRequest, CreateTransferRequest, RedeemClaimRequest,
};

/// Appends the build's git hash to the document version
struct BuildInfoAddon;

impl Modify for BuildInfoAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(hash) = option_env!("GIT_HASH") {
            openapi.info.version = format!("{}+{}", openapi.info.version, hash);
        }
    }
}

/// Main API Documentation struct
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Momo Rails API",
        version = "1.0.0",
        description = "Mobile-money transfers, claim codes and bill payments.",
        license(
            name = "MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Development"),
    ),
    paths(
        crate::gateway::handlers::health::health_check,
        crate::gateway::handlers::transfer::create_transfer,
        crate::gateway::handlers::transfer::get_transfer,
        crate::gateway::handlers::transfer::quote_fee,
        crate::gateway::handlers::claim::redeem_claim,
        crate::gateway::handlers::claim::cancel_claim,
        crate::gateway::handlers::bill::process_bill_payment,
    ),
    components(
        schemas(
            HealthResponse,
            CreateTransferRequest,
            RedeemClaimRequest,
            CancelClaimRequest,
            BillPaymentRequest,
            BillPaymentReceipt,
            BillPaymentReply,
        )
    ),
    modifiers(&BuildInfoAddon),
    tags(
        (name = "Transfer", description = "Send money and quote fees"),
        (name = "Claim", description = "Redeem or cancel money held for unregistered recipients"),
        (name = "Bill", description = "Bill payments from the wallet"),
        (name = "System", description = "Health checks and system info")
    )
)]
pub struct ApiDoc;
