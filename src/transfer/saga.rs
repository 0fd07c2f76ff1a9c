//! Saga journal
//!
//! Every step that mutated a balance or a row is recorded together with the
//! call that undoes it. On failure the journal is unwound newest first. A
//! compensation that fails does not stop the unwind; the report keeps it so
//! the caller can surface `ROLLBACK_FAILED` instead of pretending the money
//! came back.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::core_types::{TransferId, UserId};
use crate::ledger::{BalanceLedger, LedgerError, OperationType};
use crate::status::{BillStatus, TransactionStatus};
use crate::store::{StoreError, TransferStore};

use super::error::TransferError;
use super::state::TransferState;

/// Inverse of an applied step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compensation {
    Credit {
        user_id: UserId,
        amount: Decimal,
        operation_type: OperationType,
    },
    Debit {
        user_id: UserId,
        amount: Decimal,
        operation_type: OperationType,
    },
    /// Close a claim whose held funds go back to the payer
    CancelClaim {
        transfer_id: TransferId,
        claim_code: String,
    },
    /// Put a bill marked `paid` back where it was
    ReopenBill {
        bill_id: Uuid,
        status: BillStatus,
        last_payment_date: Option<DateTime<Utc>>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompensationError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Compensation {
    async fn apply(
        &self,
        ledger: &dyn BalanceLedger,
        store: &dyn TransferStore,
        performed_by: UserId,
    ) -> Result<(), CompensationError> {
        match self {
            Compensation::Credit {
                user_id,
                amount,
                operation_type,
            } => {
                ledger
                    .adjust_balance(*user_id, *amount, *operation_type, performed_by)
                    .await?;
            }
            Compensation::Debit {
                user_id,
                amount,
                operation_type,
            } => {
                ledger
                    .adjust_balance(*user_id, -*amount, *operation_type, performed_by)
                    .await?;
            }
            Compensation::CancelClaim { transfer_id, .. } => {
                store
                    .transition_pending(
                        *transfer_id,
                        TransactionStatus::Pending,
                        TransactionStatus::Cancelled,
                        None,
                    )
                    .await?;
            }
            Compensation::ReopenBill {
                bill_id,
                status,
                last_payment_date,
            } => {
                store
                    .reopen_bill(*bill_id, *status, *last_payment_date)
                    .await?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Compensation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compensation::Credit {
                user_id,
                amount,
                operation_type,
            } => write!(f, "credit {} to {} ({})", amount, user_id, operation_type),
            Compensation::Debit {
                user_id,
                amount,
                operation_type,
            } => write!(f, "debit {} from {} ({})", amount, user_id, operation_type),
            Compensation::CancelClaim { claim_code, .. } => {
                write!(f, "cancel claim {}", claim_code)
            }
            Compensation::ReopenBill {
                bill_id, status, ..
            } => write!(f, "reopen bill {} as {}", bill_id, status),
        }
    }
}

#[derive(Debug, Clone)]
struct AppliedStep {
    name: &'static str,
    compensation: Compensation,
}

/// Outcome of unwinding a saga
#[derive(Debug, Clone, Default)]
pub struct CompensationReport {
    pub applied: Vec<Compensation>,
    pub failed: Vec<(Compensation, CompensationError)>,
}

impl CompensationReport {
    /// Every compensation landed
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// One line per failed compensation, for logs and the error payload
    pub fn failure_summary(&self) -> String {
        self.failed
            .iter()
            .map(|(c, e)| format!("{}: {}", c, e))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Ordered journal of applied, compensable steps
#[derive(Debug)]
pub struct Saga {
    label: String,
    steps: Vec<AppliedStep>,
}

impl Saga {
    pub fn new(label: impl fmt::Display) -> Self {
        Self {
            label: label.to_string(),
            steps: Vec::new(),
        }
    }

    /// Record a step that has been applied.
    pub fn record(&mut self, name: &'static str, compensation: Compensation) {
        self.steps.push(AppliedStep { name, compensation });
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Unwind every recorded step, newest first.
    pub async fn compensate(
        &mut self,
        ledger: &dyn BalanceLedger,
        store: &dyn TransferStore,
        performed_by: UserId,
    ) -> CompensationReport {
        let mut report = CompensationReport::default();

        while let Some(step) = self.steps.pop() {
            match step.compensation.apply(ledger, store, performed_by).await {
                Ok(()) => {
                    info!(
                        saga = %self.label,
                        step = step.name,
                        compensation = %step.compensation,
                        "Compensation applied"
                    );
                    report.applied.push(step.compensation);
                }
                Err(e) => {
                    error!(
                        saga = %self.label,
                        step = step.name,
                        compensation = %step.compensation,
                        error = %e,
                        "Compensation FAILED"
                    );
                    report.failed.push((step.compensation, e));
                }
            }
        }

        if !report.is_complete() {
            warn!(
                saga = %self.label,
                failed = report.failed.len(),
                "Saga left partially compensated - manual reconciliation required"
            );
        }
        report
    }
}

/// Unwind `saga` after `cause` and decide what the caller reports.
///
/// Nothing recorded: `FAILED` with the cause. Fully compensated:
/// `ROLLED_BACK` with the cause. Otherwise `ROLLBACK_FAILED`.
pub async fn unwind(
    saga: &mut Saga,
    ledger: &dyn BalanceLedger,
    store: &dyn TransferStore,
    performed_by: UserId,
    cause: TransferError,
) -> (TransferState, TransferError) {
    if saga.is_empty() {
        return (TransferState::Failed, cause);
    }

    let report = saga.compensate(ledger, store, performed_by).await;
    if report.is_complete() {
        (TransferState::RolledBack, cause)
    } else {
        (
            TransferState::RollbackFailed,
            TransferError::RollbackFailed {
                cause: cause.to_string(),
                compensation: report.failure_summary(),
            },
        )
    }
}
