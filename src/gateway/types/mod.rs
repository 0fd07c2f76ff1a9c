//! Gateway types module
//!
//! ## Input Types
//! - [`StrictAmount`]: Format-validated amount for API input
//! - [`CreateTransferRequest`], [`RedeemClaimRequest`], [`CancelClaimRequest`],
//!   [`FeeQuoteParams`]: request bodies
//!
//! ## Output Types
//! - [`ApiResponse<T>`]: Unified API response wrapper
//! - [`BillPaymentReply`]: flat body of `/process-bill-payment`

pub mod money;
pub mod requests;
pub mod response;

pub use money::StrictAmount;
pub use requests::{
    BillPaymentReply, CancelClaimRequest, CreateTransferRequest, FeeQuoteParams,
    RedeemClaimRequest,
};
pub use response::{ApiError, ApiResponse, ApiResult, error_codes, ok};
