//! Transfer request/outcome types

use rust_decimal::Decimal;
use serde::Serialize;

use crate::core_types::{TransferId, UserId};
use crate::resolver::MatchRule;
use crate::status::TransactionStatus;
use crate::store::TransferRecord;

use super::error::TransferError;
use super::state::TransferState;

/// A transfer order
///
/// Identity and corridor are explicit: nothing is read from a session.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub sender_id: UserId,
    pub sender_country: String,
    /// Phone number or email as typed by the sender
    pub recipient: String,
    /// Defaults to the sender's country
    pub recipient_country: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    /// Who triggered the transfer (the sender, an agent, an admin)
    pub performed_by: UserId,
    pub idempotency_key: Option<String>,
}

/// Result of a transfer that reached `COMPLETED` or `PENDING_CLAIM`
/// (or a replay of a stored transfer)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferOutcome {
    pub transfer_id: TransferId,
    pub state: TransferState,
    pub status: TransactionStatus,
    pub amount: Decimal,
    pub fee: Decimal,
    pub platform_commission: Decimal,
    pub total: Decimal,
    pub recipient_id: Option<UserId>,
    pub claim_code: Option<String>,
    pub match_rule: Option<MatchRule>,
    /// Sender balance after the debit; unknown on replay
    pub sender_balance: Option<Decimal>,
    pub replayed: bool,
}

impl TransferOutcome {
    /// Outcome reconstructed from a stored row (idempotent replay).
    ///
    /// A `failed` row replays as the error it ended with.
    pub fn replay_of(record: &TransferRecord) -> Result<Self, TransferError> {
        if record.status == TransactionStatus::Failed {
            let error = record
                .error
                .clone()
                .unwrap_or_else(|| format!("transfer {} failed", record.id));
            return Err(match record.state {
                TransferState::RollbackFailed => TransferError::RollbackFailed {
                    cause: format!("replay of transfer {}", record.id),
                    compensation: error,
                },
                _ => TransferError::RemoteCall(error),
            });
        }

        Ok(Self {
            transfer_id: record.id,
            state: record.state,
            status: record.status,
            amount: record.amount,
            fee: record.fee,
            platform_commission: record.platform_commission,
            total: record.total(),
            recipient_id: record.recipient_id,
            claim_code: record.claim_code.clone(),
            match_rule: None,
            sender_balance: None,
            replayed: true,
        })
    }
}
