//! Balance Ledger Accessor
//!
//! The single choke-point for balance mutation. Nothing else in the crate
//! writes `profiles.balance`; every debit and credit goes through
//! [`BalanceLedger::adjust_balance`], which the backend applies atomically and
//! which leaves an `audit_logs` entry behind.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core_types::UserId;

/// Why a balance moved. Wire names match the `operation_type` argument of
/// `secure_increment_balance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    TransferDebit,
    TransferCredit,
    /// Compensation: sender refund after a failed transfer
    TransferRefund,
    /// Compensation: take back a recipient credit
    TransferReversal,
    ClaimCredit,
    ClaimRefund,
    BillPayment,
    /// Compensation: refund of a failed bill payment
    BillRefund,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::TransferDebit => "transfer_debit",
            OperationType::TransferCredit => "transfer_credit",
            OperationType::TransferRefund => "transfer_refund",
            OperationType::TransferReversal => "transfer_reversal",
            OperationType::ClaimCredit => "claim_credit",
            OperationType::ClaimRefund => "claim_refund",
            OperationType::BillPayment => "bill_payment",
            OperationType::BillRefund => "bill_refund",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Account not found: {0}")]
    NotFound(UserId),

    #[error("Insufficient funds: requested {requested}")]
    InsufficientFunds {
        available: Option<Decimal>,
        requested: Decimal,
    },

    #[error("Balance delta must be non-zero")]
    InvalidDelta,

    #[error("Ledger call failed: {0}")]
    Remote(String),

    /// The call may or may not have been applied
    #[error("Ledger call timed out: {0}")]
    Timeout(String),
}

impl LedgerError {
    /// Outcome unknown: the mutation may have landed.
    #[inline]
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, LedgerError::Timeout(_))
    }
}

/// One `audit_logs` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub user_id: UserId,
    pub delta: Decimal,
    pub operation_type: OperationType,
    pub performed_by: UserId,
    pub balance_after: Decimal,
    pub at: DateTime<Utc>,
}

/// Atomic balance primitive
///
/// Implementations MUST apply `adjust_balance` atomically and MUST reject a
/// delta that would leave the balance below zero.
#[async_trait]
pub trait BalanceLedger: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Current balance (read-only)
    async fn balance(&self, user_id: UserId) -> Result<Decimal, LedgerError>;

    /// Apply a signed delta and return the new balance.
    async fn adjust_balance(
        &self,
        user_id: UserId,
        delta: Decimal,
        operation_type: OperationType,
        performed_by: UserId,
    ) -> Result<Decimal, LedgerError>;
}

/// Subtract `amount` from `user_id`.
pub async fn debit(
    ledger: &dyn BalanceLedger,
    user_id: UserId,
    amount: Decimal,
    operation_type: OperationType,
    performed_by: UserId,
) -> Result<Decimal, LedgerError> {
    ledger
        .adjust_balance(user_id, -amount, operation_type, performed_by)
        .await
}

/// Add `amount` to `user_id`.
pub async fn credit(
    ledger: &dyn BalanceLedger,
    user_id: UserId,
    amount: Decimal,
    operation_type: OperationType,
    performed_by: UserId,
) -> Result<Decimal, LedgerError> {
    ledger
        .adjust_balance(user_id, amount, operation_type, performed_by)
        .await
}
