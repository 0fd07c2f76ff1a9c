//! Pending-Claim Issuer
//!
//! When a transfer's recipient has no local account the money is held in a
//! `pending_transfers` row under a 6-character claim code. The recipient
//! redeems it later (matching phone + code); an operator can cancel it, which
//! refunds the sender.
//!
//! Codes are checked against the store before use and regenerated on
//! collision, up to `max_attempts`.

use std::sync::Arc;

use rand::Rng;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::core_types::{TransferId, UserId};
use crate::ledger::{self, BalanceLedger, OperationType};
use crate::resolver::phones_match;
use crate::status::TransactionStatus;
use crate::store::{PendingTransfer, StoreError, TransferPatch, TransferStore};

use super::error::TransferError;
use super::saga::{Compensation, Saga, unwind};
use super::state::TransferState;

/// Claim code length
pub const CLAIM_CODE_LEN: usize = 6;

/// Default regeneration attempts on collision
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

const CLAIM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClaimError {
    #[error("No free claim code after {attempts} attempts")]
    CodeSpaceExhausted { attempts: u32 },

    #[error("Invalid claim code format")]
    InvalidCode,

    #[error("Claim not found")]
    NotFound,

    #[error("Claim is no longer pending (status: {0})")]
    NotPending(TransactionStatus),

    #[error("Phone number does not match the claim")]
    PhoneMismatch,

    #[error("Sender cannot claim their own transfer")]
    SelfClaim,
}

impl ClaimError {
    pub fn code(&self) -> &'static str {
        match self {
            ClaimError::CodeSpaceExhausted { .. } => "CLAIM_CODE_EXHAUSTED",
            ClaimError::InvalidCode => "INVALID_CLAIM_CODE",
            ClaimError::NotFound => "CLAIM_NOT_FOUND",
            ClaimError::NotPending(_) => "CLAIM_NOT_PENDING",
            ClaimError::PhoneMismatch => "CLAIM_PHONE_MISMATCH",
            ClaimError::SelfClaim => "CLAIM_SELF",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            ClaimError::CodeSpaceExhausted { .. } => 500,
            ClaimError::InvalidCode | ClaimError::SelfClaim => 400,
            ClaimError::NotFound => 404,
            ClaimError::NotPending(_) => 409,
            ClaimError::PhoneMismatch => 403,
        }
    }
}

/// Random 6-character code over `A-Z0-9`
pub fn generate_claim_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CLAIM_CODE_LEN)
        .map(|_| CLAIM_CODE_ALPHABET[rng.gen_range(0..CLAIM_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Upper-cased, trimmed code; `None` when the format is wrong.
pub fn normalize_claim_code(code: &str) -> Option<String> {
    let code = code.trim().to_ascii_uppercase();
    let valid = code.len() == CLAIM_CODE_LEN && code.bytes().all(|b| CLAIM_CODE_ALPHABET.contains(&b));
    valid.then_some(code)
}

type CodeGenerator = Box<dyn Fn() -> String + Send + Sync>;

/// Generates claim codes that are unused in the store
pub struct ClaimIssuer {
    store: Arc<dyn TransferStore>,
    max_attempts: u32,
    generator: CodeGenerator,
}

impl ClaimIssuer {
    pub fn new(store: Arc<dyn TransferStore>, max_attempts: u32) -> Self {
        Self::with_generator(
            store,
            max_attempts,
            Box::new(|| generate_claim_code(&mut rand::thread_rng())),
        )
    }

    /// Custom code source (tests force collisions with this)
    pub fn with_generator(
        store: Arc<dyn TransferStore>,
        max_attempts: u32,
        generator: CodeGenerator,
    ) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
            generator,
        }
    }

    /// A claim code not present in `pending_transfers`.
    pub async fn issue(&self) -> Result<String, TransferError> {
        for attempt in 1..=self.max_attempts {
            let code = (self.generator)();
            if !self.store.claim_code_exists(&code).await? {
                debug!(attempt, "Claim code issued");
                return Ok(code);
            }
            warn!(attempt, "Claim code collision, regenerating");
        }
        Err(ClaimError::CodeSpaceExhausted {
            attempts: self.max_attempts,
        }
        .into())
    }
}

/// Redeem request from a (newly registered) recipient
#[derive(Debug, Clone)]
pub struct RedeemRequest {
    pub claimant_id: UserId,
    pub claimant_phone: String,
    pub claim_code: String,
    /// Fallback country for phone comparison when the claim has none
    pub country: String,
    pub performed_by: UserId,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClaimOutcome {
    pub transfer_id: TransferId,
    pub status: TransactionStatus,
    pub amount: Decimal,
    /// Balance of the account that received the money
    pub new_balance: Decimal,
}

/// Redeem and cancel flows for pending transfers
pub struct ClaimService {
    ledger: Arc<dyn BalanceLedger>,
    store: Arc<dyn TransferStore>,
}

impl ClaimService {
    pub fn new(ledger: Arc<dyn BalanceLedger>, store: Arc<dyn TransferStore>) -> Self {
        Self { ledger, store }
    }

    async fn load_pending(&self, code: &str) -> Result<PendingTransfer, TransferError> {
        let code = normalize_claim_code(code).ok_or(ClaimError::InvalidCode)?;
        let pending = self
            .store
            .get_pending_by_code(&code)
            .await?
            .ok_or(ClaimError::NotFound)?;
        if pending.status != TransactionStatus::Pending {
            return Err(ClaimError::NotPending(pending.status).into());
        }
        Ok(pending)
    }

    /// Credit the claimant with the held amount and close the claim.
    pub async fn redeem(&self, req: RedeemRequest) -> Result<ClaimOutcome, TransferError> {
        let pending = self.load_pending(&req.claim_code).await?;

        if req.claimant_id == pending.sender_id {
            return Err(ClaimError::SelfClaim.into());
        }
        let country = pending
            .recipient_country
            .as_deref()
            .unwrap_or(req.country.as_str());
        let Some(rule) = phones_match(&req.claimant_phone, &pending.recipient_phone, country) else {
            return Err(ClaimError::PhoneMismatch.into());
        };
        debug!(transfer_id = %pending.transfer_id, rule = %rule, "Claimant phone matched");

        let new_balance = ledger::credit(
            self.ledger.as_ref(),
            req.claimant_id,
            pending.amount,
            OperationType::ClaimCredit,
            req.performed_by,
        )
        .await?;

        let mut saga = Saga::new(pending.transfer_id);
        saga.record(
            "credit_claimant",
            Compensation::Debit {
                user_id: req.claimant_id,
                amount: pending.amount,
                operation_type: OperationType::TransferReversal,
            },
        );

        if let Err(e) = self
            .store
            .transition_pending(
                pending.transfer_id,
                TransactionStatus::Pending,
                TransactionStatus::Completed,
                Some(req.claimant_id),
            )
            .await
        {
            let cause = self
                .claim_store_error(&pending, TransactionStatus::Completed, e)
                .await;
            let (state, err) = unwind(
                &mut saga,
                self.ledger.as_ref(),
                self.store.as_ref(),
                req.performed_by,
                cause,
            )
            .await;
            warn!(transfer_id = %pending.transfer_id, state = %state, error = %err, "Claim redeem failed");
            return Err(err);
        }

        let patch = TransferPatch {
            recipient_id: Some(req.claimant_id),
            state: Some(TransferState::Completed),
            ..Default::default()
        };
        self.close_transfer_row(pending.transfer_id, TransactionStatus::Completed, patch)
            .await;

        info!(
            transfer_id = %pending.transfer_id,
            claimant = %req.claimant_id,
            amount = %pending.amount,
            "Claim redeemed"
        );
        Ok(ClaimOutcome {
            transfer_id: pending.transfer_id,
            status: TransactionStatus::Completed,
            amount: pending.amount,
            new_balance,
        })
    }

    /// Administrative cancellation: refund the sender `amount + fee`.
    pub async fn cancel(
        &self,
        claim_code: &str,
        performed_by: UserId,
    ) -> Result<ClaimOutcome, TransferError> {
        let pending = self.load_pending(claim_code).await?;
        let refund = pending.amount + pending.fee;

        let new_balance = ledger::credit(
            self.ledger.as_ref(),
            pending.sender_id,
            refund,
            OperationType::ClaimRefund,
            performed_by,
        )
        .await?;

        let mut saga = Saga::new(pending.transfer_id);
        saga.record(
            "refund_sender",
            Compensation::Debit {
                user_id: pending.sender_id,
                amount: refund,
                operation_type: OperationType::TransferReversal,
            },
        );

        if let Err(e) = self
            .store
            .transition_pending(
                pending.transfer_id,
                TransactionStatus::Pending,
                TransactionStatus::Cancelled,
                None,
            )
            .await
        {
            let cause = self
                .claim_store_error(&pending, TransactionStatus::Cancelled, e)
                .await;
            let (state, err) = unwind(
                &mut saga,
                self.ledger.as_ref(),
                self.store.as_ref(),
                performed_by,
                cause,
            )
            .await;
            warn!(transfer_id = %pending.transfer_id, state = %state, error = %err, "Claim cancel failed");
            return Err(err);
        }

        self.close_transfer_row(
            pending.transfer_id,
            TransactionStatus::Cancelled,
            TransferPatch::default(),
        )
        .await;

        info!(
            transfer_id = %pending.transfer_id,
            sender = %pending.sender_id,
            refund = %refund,
            performed_by = %performed_by,
            "Claim cancelled, sender refunded"
        );
        Ok(ClaimOutcome {
            transfer_id: pending.transfer_id,
            status: TransactionStatus::Cancelled,
            amount: refund,
            new_balance,
        })
    }
}

impl ClaimService {
    /// Best-effort: the claim row is authoritative and already closed.
    /// Settlements made by a bill payment have no `transfers` row.
    async fn close_transfer_row(
        &self,
        transfer_id: TransferId,
        to: TransactionStatus,
        patch: TransferPatch,
    ) {
        match self
            .store
            .transition_transfer(transfer_id, TransactionStatus::Pending, to, patch)
            .await
        {
            Ok(()) => {}
            Err(StoreError::NotFound(_)) => {
                debug!(transfer_id = %transfer_id, "No transfer row for claim");
            }
            Err(e) => {
                error!(
                    transfer_id = %transfer_id,
                    status = %to,
                    error = %e,
                    "Claim closed but transfer row not updated"
                );
            }
        }
    }

    /// A lost CAS on the claim row means someone else closed it first;
    /// report the status they left it in.
    async fn claim_store_error(
        &self,
        pending: &PendingTransfer,
        attempted: TransactionStatus,
        e: StoreError,
    ) -> TransferError {
        if !matches!(e, StoreError::Conflict(_)) {
            return e.into();
        }
        let status = match self.store.get_pending_by_code(&pending.claim_code).await {
            Ok(Some(row)) if row.status != TransactionStatus::Pending => row.status,
            _ => attempted,
        };
        ClaimError::NotPending(status).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::Mutex;

    #[test]
    fn test_generate_claim_code_format() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let code = generate_claim_code(&mut rng);
            assert_eq!(code.len(), CLAIM_CODE_LEN);
            assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_normalize_claim_code() {
        assert_eq!(normalize_claim_code(" ab12cd "), Some("AB12CD".to_string()));
        assert_eq!(normalize_claim_code("AB12C"), None);
        assert_eq!(normalize_claim_code("AB-2CD"), None);
    }

    #[tokio::test]
    async fn test_issue_regenerates_on_collision() {
        let backend = Arc::new(MemoryBackend::new());
        backend.reserve_claim_code("AAAAAA");

        let codes = Mutex::new(vec!["BBBBBB".to_string(), "AAAAAA".to_string()]);
        let issuer = ClaimIssuer::with_generator(
            backend.clone(),
            3,
            Box::new(move || codes.lock().unwrap().pop().unwrap()),
        );

        assert_eq!(issuer.issue().await.unwrap(), "BBBBBB");
    }

    #[tokio::test]
    async fn test_issue_exhausted() {
        let backend = Arc::new(MemoryBackend::new());
        backend.reserve_claim_code("AAAAAA");

        let issuer =
            ClaimIssuer::with_generator(backend.clone(), 3, Box::new(|| "AAAAAA".to_string()));

        assert_eq!(
            issuer.issue().await,
            Err(TransferError::Claim(ClaimError::CodeSpaceExhausted {
                attempts: 3
            }))
        );
    }
}
