//! Transfer Store
//!
//! Persistence seam for the rows the orchestration writes: `transfers`,
//! `pending_transfers`, `automatic_bills` and `bill_payment_history`.
//! Status updates are compare-and-swap: they name the status they expect to
//! find and fail with [`StoreError::Conflict`] when another writer got there
//! first.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::core_types::{TransferId, UserId};
use crate::status::{BillStatus, TransactionStatus};
use crate::transfer::state::TransferState;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Concurrent update conflict: {0}")]
    Conflict(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },

    #[error("Duplicate key: {0}")]
    Duplicate(String),

    #[error("Store call failed: {0}")]
    Remote(String),
}

/// Reject transitions the status machine does not allow.
pub fn check_transition(from: TransactionStatus, to: TransactionStatus) -> Result<(), StoreError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(StoreError::InvalidTransition { from, to })
    }
}

/// `transfers` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub id: TransferId,
    pub idempotency_key: Option<String>,
    pub sender_id: UserId,
    /// Null until the recipient is known
    pub recipient_id: Option<UserId>,
    /// What the sender typed (phone or email)
    pub recipient_identifier: String,
    pub amount: Decimal,
    pub fee: Decimal,
    pub platform_commission: Decimal,
    pub currency: String,
    pub status: TransactionStatus,
    pub state: TransferState,
    pub claim_code: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransferRecord {
    /// amount + fee
    pub fn total(&self) -> Decimal {
        self.amount + self.fee
    }
}

/// `pending_transfers` row, keyed by the transfer it holds funds for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingTransfer {
    pub transfer_id: TransferId,
    pub sender_id: UserId,
    pub recipient_phone: String,
    pub recipient_country: Option<String>,
    pub amount: Decimal,
    pub fee: Decimal,
    pub currency: String,
    pub claim_code: String,
    pub status: TransactionStatus,
    pub claimed_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `automatic_bills` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomaticBill {
    pub id: Uuid,
    pub user_id: UserId,
    pub bill_type: String,
    pub provider: Option<String>,
    pub account_number: Option<String>,
    pub amount: Decimal,
    pub status: BillStatus,
    pub last_payment_date: Option<DateTime<Utc>>,
}

/// `bill_payment_history` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillPaymentRecord {
    pub id: Uuid,
    pub user_id: UserId,
    pub bill_id: Option<Uuid>,
    pub bill_type: String,
    pub provider: Option<String>,
    pub account_number: Option<String>,
    pub amount: Decimal,
    pub fee: Decimal,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

/// Fields changed alongside a transfer status update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferPatch {
    pub recipient_id: Option<UserId>,
    pub state: Option<TransferState>,
    pub claim_code: Option<String>,
    pub error: Option<String>,
}

#[async_trait]
pub trait TransferStore: Send + Sync {
    async fn insert_transfer(&self, record: &TransferRecord) -> Result<(), StoreError>;

    async fn get_transfer(&self, id: TransferId) -> Result<Option<TransferRecord>, StoreError>;

    async fn find_transfer_by_key(
        &self,
        idempotency_key: &str,
    ) -> Result<Option<TransferRecord>, StoreError>;

    /// CAS status update: applies only when the row is still in `from`.
    /// `from == to` patches the row without changing its status.
    async fn transition_transfer(
        &self,
        id: TransferId,
        from: TransactionStatus,
        to: TransactionStatus,
        patch: TransferPatch,
    ) -> Result<(), StoreError>;

    async fn claim_code_exists(&self, claim_code: &str) -> Result<bool, StoreError>;

    async fn insert_pending(&self, pending: &PendingTransfer) -> Result<(), StoreError>;

    async fn get_pending_by_code(
        &self,
        claim_code: &str,
    ) -> Result<Option<PendingTransfer>, StoreError>;

    /// CAS status update on a pending transfer.
    async fn transition_pending(
        &self,
        transfer_id: TransferId,
        from: TransactionStatus,
        to: TransactionStatus,
        claimed_by: Option<UserId>,
    ) -> Result<(), StoreError>;

    async fn get_bill(&self, bill_id: Uuid) -> Result<Option<AutomaticBill>, StoreError>;

    /// Set a bill `paid`; fails with `Conflict` if it already is.
    async fn mark_bill_paid(&self, bill_id: Uuid, paid_at: DateTime<Utc>)
    -> Result<(), StoreError>;

    /// Undo `mark_bill_paid`: put a `paid` bill back to `status`.
    async fn reopen_bill(
        &self,
        bill_id: Uuid,
        status: BillStatus,
        last_payment_date: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    async fn insert_bill_history(&self, record: &BillPaymentRecord) -> Result<(), StoreError>;
}
