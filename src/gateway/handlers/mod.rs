//! HTTP handlers, one file per resource

pub mod bill;
pub mod claim;
pub mod health;
pub mod transfer;

pub use bill::{method_not_allowed, process_bill_payment};
pub use claim::{cancel_claim, redeem_claim};
pub use health::{HealthResponse, health_check};
pub use transfer::{create_transfer, get_transfer, quote_fee};

