//! Transfer Coordinator
//!
//! Drives one transfer through the FSM in a single call:
//!
//! 1. validate, compute the fee quote, replay on a known idempotency key
//! 2. pre-flight balance check (no mutation on insufficient funds)
//! 3. persist the `transfers` row (`pending`, `INITIATED`)
//! 4. debit `amount + fee`, checkpoint the row at `DEBITED`
//! 5. resolve the recipient; credit it, or hold the money under a claim code
//! 6. settle the row as `completed` or `PENDING_CLAIM`
//!
//! Every state change goes through [`TransferState::advance`], so only FSM
//! edges are ever written. Any failure after the debit unwinds the saga and
//! settles the row as `failed` with `ROLLED_BACK` or `ROLLBACK_FAILED`.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use crate::core_types::{Account, TransferId, UserId};
use crate::fee::{FeeQuote, FeeSchedule, calculate_fee};
use crate::ledger::{self, BalanceLedger, OperationType};
use crate::resolver::{MatchRule, RecipientDirectory, Resolution, resolve_recipient};
use crate::status::TransactionStatus;
use crate::store::{PendingTransfer, StoreError, TransferPatch, TransferRecord, TransferStore};

use super::claim::ClaimIssuer;
use super::error::TransferError;
use super::saga::{Compensation, Saga, unwind};
use super::state::TransferState;
use super::types::{TransferOutcome, TransferRequest};

/// Money that has left the payer and must reach a recipient
#[derive(Debug, Clone)]
pub(crate) struct SettleOrder<'a> {
    pub transfer_id: TransferId,
    pub sender_id: UserId,
    pub recipient: &'a str,
    pub country: &'a str,
    pub amount: Decimal,
    /// Fee recorded on a pending claim (refunded with it on cancel)
    pub fee: Decimal,
    pub currency: &'a str,
    pub performed_by: UserId,
}

/// Where settled money ended up
#[derive(Debug, Clone)]
pub(crate) enum Settlement {
    Credited { recipient: Account, rule: MatchRule },
    Held { claim_code: String },
}

/// Transfer Coordinator
pub struct TransferCoordinator {
    ledger: Arc<dyn BalanceLedger>,
    directory: Arc<dyn RecipientDirectory>,
    store: Arc<dyn TransferStore>,
    fees: FeeSchedule,
    claims: ClaimIssuer,
}

impl TransferCoordinator {
    pub fn new(
        ledger: Arc<dyn BalanceLedger>,
        directory: Arc<dyn RecipientDirectory>,
        store: Arc<dyn TransferStore>,
        fees: FeeSchedule,
        claims: ClaimIssuer,
    ) -> Self {
        Self {
            ledger,
            directory,
            store,
            fees,
            claims,
        }
    }

    pub fn ledger(&self) -> &Arc<dyn BalanceLedger> {
        &self.ledger
    }

    pub fn store(&self) -> &Arc<dyn TransferStore> {
        &self.store
    }

    /// Fee quote without side effects
    pub fn quote(
        &self,
        amount: Decimal,
        sender_country: &str,
        recipient_country: Option<&str>,
    ) -> Result<FeeQuote, TransferError> {
        Ok(calculate_fee(
            amount,
            sender_country,
            recipient_country,
            &self.fees,
        )?)
    }

    pub async fn get(&self, id: TransferId) -> Result<TransferRecord, TransferError> {
        self.store
            .get_transfer(id)
            .await?
            .ok_or_else(|| TransferError::TransferNotFound(id.to_string()))
    }

    /// Execute a transfer to a terminal state.
    pub async fn execute(&self, req: TransferRequest) -> Result<TransferOutcome, TransferError> {
        // === INITIATED ===
        let recipient = req.recipient.trim();
        if recipient.is_empty() {
            return Err(TransferError::Validation("recipient is required".into()));
        }
        let key = req
            .idempotency_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty());

        if let Some(key) = key
            && let Some(existing) = self.store.find_transfer_by_key(key).await?
        {
            debug!(key = %key, transfer_id = %existing.id, "Duplicate idempotency key, replaying");
            return TransferOutcome::replay_of(&existing);
        }

        let quote = self.quote(
            req.amount,
            &req.sender_country,
            req.recipient_country.as_deref(),
        )?;

        // Pre-flight: reject before any mutating call
        let available = self.ledger.balance(req.sender_id).await?;
        if available < quote.total {
            info!(
                sender = %req.sender_id,
                available = %available,
                required = %quote.total,
                "Transfer rejected: insufficient funds"
            );
            return Err(TransferError::InsufficientFunds {
                available,
                required: quote.total,
            });
        }

        let id = TransferId::new();
        let now = Utc::now();
        let record = TransferRecord {
            id,
            idempotency_key: key.map(str::to_string),
            sender_id: req.sender_id,
            recipient_id: None,
            recipient_identifier: recipient.to_string(),
            amount: quote.amount,
            fee: quote.fee,
            platform_commission: quote.platform_commission,
            currency: req.currency.clone(),
            status: TransactionStatus::Pending,
            state: TransferState::Initiated,
            claim_code: None,
            error: None,
            created_at: now,
            updated_at: now,
        };
        match (self.store.insert_transfer(&record).await, key) {
            (Ok(()), _) => {}
            (Err(StoreError::Duplicate(_)), Some(key)) => {
                // Lost the race against a concurrent request with the same key
                let existing = self
                    .store
                    .find_transfer_by_key(key)
                    .await?
                    .ok_or_else(|| TransferError::TransferNotFound(key.to_string()))?;
                return TransferOutcome::replay_of(&existing);
            }
            (Err(e), _) => return Err(e.into()),
        }
        info!(
            transfer_id = %id,
            sender = %req.sender_id,
            amount = %quote.amount,
            fee = %quote.fee,
            corridor = ?quote.corridor,
            "Transfer initiated"
        );

        // === DEBITED ===
        let mut state = TransferState::Initiated;
        let sender_balance = match ledger::debit(
            self.ledger.as_ref(),
            req.sender_id,
            quote.total,
            OperationType::TransferDebit,
            req.performed_by,
        )
        .await
        {
            Ok(balance) => balance,
            Err(e) if e.is_indeterminate() => {
                // Outcome unknown: no compensation
                error!(
                    transfer_id = %id,
                    sender = %req.sender_id,
                    error = %e,
                    "Debit outcome unknown, not compensated - manual reconciliation required"
                );
                let patch = TransferPatch {
                    error: Some(format!("debit outcome unknown: {}", e)),
                    ..Default::default()
                };
                self.patch_row(id, TransactionStatus::Pending, patch).await;
                return Err(e.into());
            }
            Err(e) => {
                let err = TransferError::from(e);
                warn!(transfer_id = %id, error = %err, "Debit rejected");
                self.settle_failed(id, &mut state, TransferState::Failed, &err)
                    .await;
                return Err(err);
            }
        };
        debug!(transfer_id = %id, balance = %sender_balance, "Sender debited");

        let mut saga = Saga::new(id);
        saga.record(
            "debit_sender",
            Compensation::Credit {
                user_id: req.sender_id,
                amount: quote.total,
                operation_type: OperationType::TransferRefund,
            },
        );

        let order = SettleOrder {
            transfer_id: id,
            sender_id: req.sender_id,
            recipient,
            country: req
                .recipient_country
                .as_deref()
                .unwrap_or(req.sender_country.as_str()),
            amount: quote.amount,
            fee: quote.fee,
            currency: &req.currency,
            performed_by: req.performed_by,
        };

        match self.advance(&mut saga, &order, &mut state).await {
            Ok(settlement) => {
                let (recipient_id, claim_code, match_rule, status) = match settlement {
                    Settlement::Credited { recipient, rule } => {
                        (Some(recipient.id), None, Some(rule), TransactionStatus::Completed)
                    }
                    Settlement::Held { claim_code } => {
                        (None, Some(claim_code), None, TransactionStatus::Pending)
                    }
                };
                info!(transfer_id = %id, state = %state, "Transfer settled");
                Ok(TransferOutcome {
                    transfer_id: id,
                    state,
                    status,
                    amount: quote.amount,
                    fee: quote.fee,
                    platform_commission: quote.platform_commission,
                    total: quote.total,
                    recipient_id,
                    claim_code,
                    match_rule,
                    sender_balance: Some(sender_balance),
                    replayed: false,
                })
            }
            Err(cause) => {
                warn!(transfer_id = %id, error = %cause, "Transfer failed after debit, unwinding");
                let (end, err) = unwind(
                    &mut saga,
                    self.ledger.as_ref(),
                    self.store.as_ref(),
                    req.performed_by,
                    cause,
                )
                .await;
                if end == TransferState::RollbackFailed {
                    error!(transfer_id = %id, error = %err, "Transfer ROLLBACK_FAILED");
                } else {
                    info!(transfer_id = %id, state = %end, "Transfer rolled back");
                }
                self.settle_failed(id, &mut state, end, &err).await;
                Err(err)
            }
        }
    }

    /// Everything after the debit: checkpoint, settle the money, then the row.
    async fn advance(
        &self,
        saga: &mut Saga,
        order: &SettleOrder<'_>,
        state: &mut TransferState,
    ) -> Result<Settlement, TransferError> {
        state.advance(TransferState::Debited)?;
        let debited = TransferPatch {
            state: Some(*state),
            ..Default::default()
        };
        self.store
            .transition_transfer(
                order.transfer_id,
                TransactionStatus::Pending,
                TransactionStatus::Pending,
                debited,
            )
            .await?;

        let settlement = self.settle(saga, order, state).await?;

        let (next, to, patch) = match &settlement {
            Settlement::Credited { recipient, .. } => (
                TransferState::Completed,
                TransactionStatus::Completed,
                TransferPatch {
                    recipient_id: Some(recipient.id),
                    ..Default::default()
                },
            ),
            Settlement::Held { claim_code } => (
                TransferState::PendingClaim,
                TransactionStatus::Pending,
                TransferPatch {
                    claim_code: Some(claim_code.clone()),
                    ..Default::default()
                },
            ),
        };
        self.checkpoint(order.transfer_id, state, next, to, patch)
            .await?;
        Ok(settlement)
    }

    /// Write `next` to a `pending` row; `state` follows only once the write landed.
    async fn checkpoint(
        &self,
        id: TransferId,
        state: &mut TransferState,
        next: TransferState,
        to: TransactionStatus,
        mut patch: TransferPatch,
    ) -> Result<(), TransferError> {
        let mut target = *state;
        target.advance(next)?;
        patch.state = Some(target);
        self.store
            .transition_transfer(id, TransactionStatus::Pending, to, patch)
            .await?;
        *state = target;
        Ok(())
    }

    /// Resolve the recipient and move `amount` to it, or hold it under a
    /// claim code. Every applied step is recorded on `saga`; `state` must be
    /// `DEBITED` on entry.
    pub(crate) async fn settle(
        &self,
        saga: &mut Saga,
        order: &SettleOrder<'_>,
        state: &mut TransferState,
    ) -> Result<Settlement, TransferError> {
        let resolution =
            resolve_recipient(self.directory.as_ref(), order.recipient, order.country).await?;

        match resolution {
            Resolution::Found { account, rule } => {
                state.advance(TransferState::Resolved)?;
                if account.id == order.sender_id {
                    return Err(TransferError::Validation(
                        "cannot transfer to own account".into(),
                    ));
                }
                debug!(
                    transfer_id = %order.transfer_id,
                    recipient = %account.id,
                    "Transfer {}",
                    state
                );

                ledger::credit(
                    self.ledger.as_ref(),
                    account.id,
                    order.amount,
                    OperationType::TransferCredit,
                    order.performed_by,
                )
                .await?;
                saga.record(
                    "credit_recipient",
                    Compensation::Debit {
                        user_id: account.id,
                        amount: order.amount,
                        operation_type: OperationType::TransferReversal,
                    },
                );
                state.advance(TransferState::Credited)?;
                debug!(transfer_id = %order.transfer_id, "Transfer {}", state);

                Ok(Settlement::Credited {
                    recipient: account,
                    rule,
                })
            }
            Resolution::NotFound => {
                state.advance(TransferState::Unresolved)?;
                debug!(transfer_id = %order.transfer_id, "Transfer {}", state);

                let claim_code = self.claims.issue().await?;
                let now = Utc::now();
                let pending = PendingTransfer {
                    transfer_id: order.transfer_id,
                    sender_id: order.sender_id,
                    recipient_phone: order.recipient.to_string(),
                    recipient_country: Some(order.country.to_string()),
                    amount: order.amount,
                    fee: order.fee,
                    currency: order.currency.to_string(),
                    claim_code: claim_code.clone(),
                    status: TransactionStatus::Pending,
                    claimed_by: None,
                    created_at: now,
                    updated_at: now,
                };
                self.store.insert_pending(&pending).await?;
                saga.record(
                    "issue_claim",
                    Compensation::CancelClaim {
                        transfer_id: order.transfer_id,
                        claim_code: claim_code.clone(),
                    },
                );
                info!(
                    transfer_id = %order.transfer_id,
                    recipient = %order.recipient,
                    "Recipient not registered, funds held for claim"
                );

                Ok(Settlement::Held { claim_code })
            }
        }
    }

    /// Best-effort: mark the row `failed` at `end`.
    async fn settle_failed(
        &self,
        id: TransferId,
        state: &mut TransferState,
        end: TransferState,
        err: &TransferError,
    ) {
        if let Err(e) = state.advance(end) {
            error!(transfer_id = %id, error = %e, "Refusing to settle transfer row");
            return;
        }
        let patch = TransferPatch {
            state: Some(end),
            error: Some(err.to_string()),
            ..Default::default()
        };
        self.patch_row(id, TransactionStatus::Failed, patch).await;
    }

    /// Best-effort update of a `pending` transfers row
    async fn patch_row(&self, id: TransferId, to: TransactionStatus, patch: TransferPatch) {
        if let Err(e) = self
            .store
            .transition_transfer(id, TransactionStatus::Pending, to, patch)
            .await
        {
            error!(transfer_id = %id, status = %to, error = %e, "Failed to update transfer row");
        }
    }
}
