//! Bill payment errors

use rust_decimal::Decimal;
use thiserror::Error;

use crate::transfer::TransferError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BillPaymentError {
    #[error("{0}")]
    Validation(String),

    #[error("Bill not found")]
    BillNotFound,

    #[error("Bill already paid")]
    AlreadyPaid,

    #[error("User profile not found")]
    ProfileNotFound,

    #[error("Insufficient balance: available {available}, required {required}")]
    InsufficientFunds {
        available: Decimal,
        required: Decimal,
    },

    /// Failed before any money moved
    #[error("Payment processing failed: {0}")]
    Remote(String),

    /// Failed after the debit; carries `ROLLBACK_FAILED` when the refund
    /// did not land either
    #[error("Payment failed: {0}")]
    Aborted(TransferError),
}

impl BillPaymentError {
    pub fn code(&self) -> &'static str {
        match self {
            BillPaymentError::Validation(_) => "VALIDATION_ERROR",
            BillPaymentError::BillNotFound => "BILL_NOT_FOUND",
            BillPaymentError::AlreadyPaid => "BILL_ALREADY_PAID",
            BillPaymentError::ProfileNotFound => "ACCOUNT_NOT_FOUND",
            BillPaymentError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            BillPaymentError::Remote(_) => "REMOTE_CALL_FAILED",
            BillPaymentError::Aborted(e) => e.code(),
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            BillPaymentError::Validation(_)
            | BillPaymentError::AlreadyPaid
            | BillPaymentError::InsufficientFunds { .. } => 400,
            BillPaymentError::BillNotFound | BillPaymentError::ProfileNotFound => 404,
            BillPaymentError::Remote(_) | BillPaymentError::Aborted(_) => 500,
        }
    }
}
