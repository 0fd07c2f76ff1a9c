//! Transfer Error Types

use rust_decimal::Decimal;
use thiserror::Error;

use crate::fee::FeeError;
use crate::ledger::LedgerError;
use crate::resolver::ResolveError;
use crate::store::StoreError;

use super::claim::ClaimError;

/// Transfer error types
///
/// `code()` feeds the API envelope, `http_status()` the HTTP status line.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransferError {
    // === Rejected before any mutation ===
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Insufficient funds: balance {available}, required {required}")]
    InsufficientFunds {
        available: Decimal,
        required: Decimal,
    },

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    // === After the debit ===
    /// The transfer failed after the debit; the debit was compensated.
    #[error("Remote call failed: {0}")]
    RemoteCall(String),

    /// The transfer failed after the debit and so did the compensation.
    #[error("Rollback failed after '{cause}': {compensation}")]
    RollbackFailed { cause: String, compensation: String },

    // === Lookups ===
    #[error("Transfer not found: {0}")]
    TransferNotFound(String),

    #[error("Claim error: {0}")]
    Claim(#[from] ClaimError),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),
}

impl TransferError {
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::Validation(_) => "VALIDATION_ERROR",
            TransferError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            TransferError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            TransferError::RemoteCall(_) => "REMOTE_CALL_FAILED",
            TransferError::RollbackFailed { .. } => "ROLLBACK_FAILED",
            TransferError::TransferNotFound(_) => "TRANSFER_NOT_FOUND",
            TransferError::Claim(e) => e.code(),
            TransferError::InvalidStateTransition(_) => "INVALID_STATE_TRANSITION",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            TransferError::Validation(_) => 400,
            TransferError::InsufficientFunds { .. } => 422,
            TransferError::AccountNotFound(_) | TransferError::TransferNotFound(_) => 404,
            TransferError::Claim(e) => e.http_status(),
            TransferError::RemoteCall(_)
            | TransferError::RollbackFailed { .. }
            | TransferError::InvalidStateTransition(_) => 500,
        }
    }
}

impl From<FeeError> for TransferError {
    fn from(e: FeeError) -> Self {
        TransferError::Validation(e.to_string())
    }
}

/// Ledger errors seen before the debit landed
impl From<LedgerError> for TransferError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::InsufficientFunds {
                available,
                requested,
            } => TransferError::InsufficientFunds {
                available: available.unwrap_or(Decimal::ZERO),
                required: requested,
            },
            LedgerError::NotFound(id) => TransferError::AccountNotFound(id.to_string()),
            LedgerError::InvalidDelta => TransferError::Validation(e.to_string()),
            LedgerError::Remote(_) | LedgerError::Timeout(_) => {
                TransferError::RemoteCall(e.to_string())
            }
        }
    }
}

impl From<ResolveError> for TransferError {
    fn from(e: ResolveError) -> Self {
        TransferError::RemoteCall(e.to_string())
    }
}

impl From<StoreError> for TransferError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => TransferError::TransferNotFound(what),
            StoreError::InvalidTransition { .. } => {
                TransferError::InvalidStateTransition(e.to_string())
            }
            _ => TransferError::RemoteCall(e.to_string()),
        }
    }
}
