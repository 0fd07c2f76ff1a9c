//! Integration Tests for the transfer FSM and the claim flows
//!
//! These run the complete saga against the memory backend, using its fault
//! switches to simulate failing remote calls.

use std::sync::Arc;

use rust_decimal_macros::dec;
use uuid::Uuid;

use crate::backend::memory::{MemoryBackend, StoreOp};
use crate::core_types::UserId;
use crate::fee::FeeSchedule;
use crate::ledger::{LedgerError, OperationType};
use crate::resolver::MatchRule;
use crate::status::TransactionStatus;
use crate::store::StoreError;

use super::claim::{ClaimError, ClaimIssuer, ClaimService, RedeemRequest};
use super::coordinator::TransferCoordinator;
use super::error::TransferError;
use super::state::TransferState;
use super::types::TransferRequest;

const UNREGISTERED: &str = "+237699000111";

/// Coordinator and claim service sharing one memory backend
struct TestHarness {
    backend: Arc<MemoryBackend>,
    coordinator: TransferCoordinator,
    claims: ClaimService,
}

impl TestHarness {
    fn new() -> Self {
        let backend = Arc::new(MemoryBackend::new());
        let coordinator = TransferCoordinator::new(
            backend.clone(),
            backend.clone(),
            backend.clone(),
            FeeSchedule::default(),
            ClaimIssuer::new(backend.clone(), 5),
        );
        let claims = ClaimService::new(backend.clone(), backend.clone());
        Self {
            backend,
            coordinator,
            claims,
        }
    }

    fn balance(&self, user: UserId) -> rust_decimal::Decimal {
        self.backend.balance_of(user).unwrap()
    }
}

fn request(sender: UserId, recipient: &str, amount: rust_decimal::Decimal) -> TransferRequest {
    TransferRequest {
        sender_id: sender,
        sender_country: "CM".into(),
        recipient: recipient.into(),
        recipient_country: None,
        amount,
        currency: "XAF".into(),
        performed_by: sender,
        idempotency_key: None,
    }
}

fn redeem(claimant: UserId, phone: &str, code: &str) -> RedeemRequest {
    RedeemRequest {
        claimant_id: claimant,
        claimant_phone: phone.into(),
        claim_code: code.into(),
        country: "CM".into(),
        performed_by: claimant,
    }
}

// ========================================================================
// Happy Path Tests
// ========================================================================

/// Registered recipient: debit amount + fee, credit amount
#[tokio::test]
async fn test_transfer_to_registered_recipient() {
    let h = TestHarness::new();
    let sender = h.backend.add_account("+237650000001", dec!(10000));
    let recipient = h.backend.add_account("+237677123456", dec!(0));

    let outcome = h
        .coordinator
        .execute(request(sender, "677123456", dec!(1000)))
        .await
        .unwrap();

    assert_eq!(outcome.state, TransferState::Completed);
    assert_eq!(outcome.status, TransactionStatus::Completed);
    assert_eq!(outcome.fee, dec!(15));
    assert_eq!(outcome.total, dec!(1015));
    assert_eq!(outcome.recipient_id, Some(recipient));
    assert_eq!(outcome.match_rule, Some(MatchRule::Last9));
    assert_eq!(outcome.sender_balance, Some(dec!(8985)));
    assert!(!outcome.replayed);

    assert_eq!(h.balance(sender), dec!(8985));
    assert_eq!(h.balance(recipient), dec!(1000));

    let row = h.backend.transfer(outcome.transfer_id).unwrap();
    assert_eq!(row.status, TransactionStatus::Completed);
    assert_eq!(row.state, TransferState::Completed);
    assert_eq!(row.recipient_id, Some(recipient));
}

/// Unregistered recipient: money held under a claim code
#[tokio::test]
async fn test_transfer_to_unregistered_recipient_is_held() {
    let h = TestHarness::new();
    let sender = h.backend.add_account("+237650000001", dec!(10000));

    let outcome = h
        .coordinator
        .execute(request(sender, UNREGISTERED, dec!(1000)))
        .await
        .unwrap();

    assert_eq!(outcome.state, TransferState::PendingClaim);
    assert_eq!(outcome.status, TransactionStatus::Pending);
    assert_eq!(h.balance(sender), dec!(8985));

    let code = outcome.claim_code.unwrap();
    assert_eq!(code.len(), 6);
    let pending = h.backend.pending_by_code(&code).unwrap();
    assert_eq!(pending.transfer_id, outcome.transfer_id);
    assert_eq!(pending.amount, dec!(1000));
    assert_eq!(pending.fee, dec!(15));
    assert_eq!(pending.status, TransactionStatus::Pending);

    let row = h.backend.transfer(outcome.transfer_id).unwrap();
    assert_eq!(row.state, TransferState::PendingClaim);
    assert_eq!(row.claim_code.as_deref(), Some(code.as_str()));
}

#[tokio::test]
async fn test_cross_border_fee() {
    let h = TestHarness::new();
    let sender = h.backend.add_account("+237650000001", dec!(10000));
    h.backend.add_account("+243812345678", dec!(0));

    let mut req = request(sender, "+243812345678", dec!(1000));
    req.recipient_country = Some("CD".into());
    let outcome = h.coordinator.execute(req).await.unwrap();

    assert_eq!(outcome.fee, dec!(10));
    assert_eq!(h.balance(sender), dec!(8990));
}

// ========================================================================
// Rejections (no balance mutation)
// ========================================================================

#[tokio::test]
async fn test_insufficient_funds_touches_nothing() {
    let h = TestHarness::new();
    let sender = h.backend.add_account("+237650000001", dec!(500));
    h.backend.add_account("+237677123456", dec!(0));

    let err = h
        .coordinator
        .execute(request(sender, "677123456", dec!(1000)))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        TransferError::InsufficientFunds {
            available: dec!(500),
            required: dec!(1015),
        }
    );
    assert_eq!(h.backend.adjust_calls(), 0);
    assert!(h.backend.transfers().is_empty());
}

#[tokio::test]
async fn test_empty_recipient_rejected() {
    let h = TestHarness::new();
    let sender = h.backend.add_account("+237650000001", dec!(10000));

    let err = h
        .coordinator
        .execute(request(sender, "   ", dec!(1000)))
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::Validation(_)));
    assert_eq!(h.backend.adjust_calls(), 0);
}

#[tokio::test]
async fn test_zero_amount_rejected() {
    let h = TestHarness::new();
    let sender = h.backend.add_account("+237650000001", dec!(10000));

    let err = h
        .coordinator
        .execute(request(sender, "677123456", dec!(0)))
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::Validation(_)));
    assert_eq!(h.backend.adjust_calls(), 0);
}

// ========================================================================
// Failure After Debit
// ========================================================================

/// Credit fails: sender refunded in full, row ROLLED_BACK
#[tokio::test]
async fn test_credit_failure_rolls_back() {
    let h = TestHarness::new();
    let sender = h.backend.add_account("+237650000001", dec!(10000));
    let recipient = h.backend.add_account("+237677123456", dec!(0));
    h.backend.fail_operation(
        OperationType::TransferCredit,
        LedgerError::Remote("connection reset".into()),
    );

    let err = h
        .coordinator
        .execute(request(sender, "677123456", dec!(1000)))
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::RemoteCall(_)));
    assert_eq!(h.balance(sender), dec!(10000));
    assert_eq!(h.balance(recipient), dec!(0));

    let row = &h.backend.transfers()[0];
    assert_eq!(row.status, TransactionStatus::Failed);
    assert_eq!(row.state, TransferState::RolledBack);
    assert!(row.error.is_some());

    let deltas: Vec<_> = h
        .backend
        .audit_log()
        .iter()
        .map(|e| (e.operation_type, e.delta))
        .collect();
    assert_eq!(
        deltas,
        vec![
            (OperationType::TransferDebit, dec!(-1015)),
            (OperationType::TransferRefund, dec!(1015)),
        ]
    );
}

/// Credit and refund both fail: ROLLBACK_FAILED surfaces
#[tokio::test]
async fn test_rollback_failure_is_reported() {
    let h = TestHarness::new();
    let sender = h.backend.add_account("+237650000001", dec!(10000));
    h.backend.add_account("+237677123456", dec!(0));
    h.backend.fail_operation(
        OperationType::TransferCredit,
        LedgerError::Remote("connection reset".into()),
    );
    h.backend.fail_operation(
        OperationType::TransferRefund,
        LedgerError::Remote("connection reset".into()),
    );

    let err = h
        .coordinator
        .execute(request(sender, "677123456", dec!(1000)))
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::RollbackFailed { .. }));
    assert_eq!(err.code(), "ROLLBACK_FAILED");
    assert_eq!(h.balance(sender), dec!(8985));

    let row = &h.backend.transfers()[0];
    assert_eq!(row.status, TransactionStatus::Failed);
    assert_eq!(row.state, TransferState::RollbackFailed);
}

#[tokio::test]
async fn test_lookup_failure_rolls_back() {
    let h = TestHarness::new();
    let sender = h.backend.add_account("+237650000001", dec!(10000));
    h.backend.fail_lookup(true);

    let err = h
        .coordinator
        .execute(request(sender, "677123456", dec!(1000)))
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::RemoteCall(_)));
    assert_eq!(h.balance(sender), dec!(10000));
    assert_eq!(h.backend.transfers()[0].state, TransferState::RolledBack);
}

#[tokio::test]
async fn test_self_transfer_refunded() {
    let h = TestHarness::new();
    let sender = h.backend.add_account("+237650000001", dec!(10000));

    let err = h
        .coordinator
        .execute(request(sender, "650000001", dec!(1000)))
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::Validation(_)));
    assert_eq!(h.balance(sender), dec!(10000));
    assert_eq!(h.backend.transfers()[0].state, TransferState::RolledBack);
}

#[tokio::test]
async fn test_pending_insert_failure_refunds_sender() {
    let h = TestHarness::new();
    let sender = h.backend.add_account("+237650000001", dec!(10000));
    h.backend.fail_store(StoreOp::InsertPending, true);

    let err = h
        .coordinator
        .execute(request(sender, UNREGISTERED, dec!(1000)))
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::RemoteCall(_)));
    assert_eq!(h.balance(sender), dec!(10000));
    assert_eq!(h.backend.transfers()[0].state, TransferState::RolledBack);
}

fn audit_deltas(h: &TestHarness) -> Vec<(OperationType, rust_decimal::Decimal)> {
    h.backend
        .audit_log()
        .iter()
        .map(|e| (e.operation_type, e.delta))
        .collect()
}

/// DEBITED checkpoint cannot be written: nothing else runs, sender refunded
#[tokio::test]
async fn test_debited_checkpoint_failure_refunds_sender() {
    let h = TestHarness::new();
    let sender = h.backend.add_account("+237650000001", dec!(10000));
    let recipient = h.backend.add_account("+237677123456", dec!(0));
    h.backend.fail_store(StoreOp::TransitionTransfer, true);

    let err = h
        .coordinator
        .execute(request(sender, "677123456", dec!(1000)))
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::RemoteCall(_)));
    assert_eq!(h.balance(sender), dec!(10000));
    assert_eq!(h.balance(recipient), dec!(0));
    assert_eq!(
        audit_deltas(&h),
        vec![
            (OperationType::TransferDebit, dec!(-1015)),
            (OperationType::TransferRefund, dec!(1015)),
        ]
    );
    assert_eq!(h.backend.transfers()[0].state, TransferState::Initiated);
}

/// Final row update fails after the credit: recipient reversed, sender
/// refunded, row left at the DEBITED checkpoint
#[tokio::test]
async fn test_row_update_failure_reverses_credit() {
    let h = TestHarness::new();
    let sender = h.backend.add_account("+237650000001", dec!(10000));
    let recipient = h.backend.add_account("+237677123456", dec!(0));
    h.backend.fail_store_after(StoreOp::TransitionTransfer, 1);

    let err = h
        .coordinator
        .execute(request(sender, "677123456", dec!(1000)))
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::RemoteCall(_)));
    assert_eq!(h.balance(sender), dec!(10000));
    assert_eq!(h.balance(recipient), dec!(0));
    assert_eq!(
        audit_deltas(&h),
        vec![
            (OperationType::TransferDebit, dec!(-1015)),
            (OperationType::TransferCredit, dec!(1000)),
            (OperationType::TransferReversal, dec!(-1000)),
            (OperationType::TransferRefund, dec!(1015)),
        ]
    );

    let row = &h.backend.transfers()[0];
    assert_eq!(row.status, TransactionStatus::Pending);
    assert_eq!(row.state, TransferState::Debited);
}

/// Final row update fails after a hold: the claim is cancelled with the refund
#[tokio::test]
async fn test_row_update_failure_cancels_claim() {
    let h = TestHarness::new();
    let sender = h.backend.add_account("+237650000001", dec!(10000));
    h.backend.fail_store_after(StoreOp::TransitionTransfer, 1);

    let err = h
        .coordinator
        .execute(request(sender, UNREGISTERED, dec!(1000)))
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::RemoteCall(_)));
    assert_eq!(h.balance(sender), dec!(10000));

    let row = &h.backend.transfers()[0];
    assert_eq!(row.status, TransactionStatus::Pending);
    assert_eq!(row.state, TransferState::Debited);
    assert_eq!(row.claim_code, None);

    let claims = h.backend.pending_transfers();
    assert_eq!(claims.len(), 1);
    assert_eq!(claims[0].transfer_id, row.id);
    assert_eq!(claims[0].status, TransactionStatus::Cancelled);
}

/// Debit timed out: outcome unknown, nothing compensated, row left pending
#[tokio::test]
async fn test_debit_timeout_not_compensated() {
    let h = TestHarness::new();
    let sender = h.backend.add_account("+237650000001", dec!(10000));
    h.backend.add_account("+237677123456", dec!(0));
    h.backend.fail_operation(
        OperationType::TransferDebit,
        LedgerError::Timeout("10s elapsed".into()),
    );

    let err = h
        .coordinator
        .execute(request(sender, "677123456", dec!(1000)))
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::RemoteCall(_)));
    assert_eq!(h.backend.adjust_calls(), 1);

    let row = &h.backend.transfers()[0];
    assert_eq!(row.status, TransactionStatus::Pending);
    assert_eq!(row.state, TransferState::Initiated);
    assert!(row.error.as_deref().unwrap().contains("unknown"));
}

// ========================================================================
// Idempotency
// ========================================================================

#[tokio::test]
async fn test_idempotency_key_replays() {
    let h = TestHarness::new();
    let sender = h.backend.add_account("+237650000001", dec!(10000));
    h.backend.add_account("+237677123456", dec!(0));

    let mut req = request(sender, "677123456", dec!(1000));
    req.idempotency_key = Some("order-42".into());

    let first = h.coordinator.execute(req.clone()).await.unwrap();
    let second = h.coordinator.execute(req).await.unwrap();

    assert!(!first.replayed);
    assert!(second.replayed);
    assert_eq!(first.transfer_id, second.transfer_id);
    assert_eq!(second.state, TransferState::Completed);
    assert_eq!(h.balance(sender), dec!(8985));
    assert_eq!(h.backend.transfers().len(), 1);
}

/// A failed transfer replays as a failure, never as a success
#[tokio::test]
async fn test_idempotency_key_replays_failure() {
    let h = TestHarness::new();
    let sender = h.backend.add_account("+237650000001", dec!(10000));
    h.backend.add_account("+237677123456", dec!(0));
    h.backend.fail_lookup(true);

    let mut req = request(sender, "677123456", dec!(1000));
    req.idempotency_key = Some("order-43".into());

    let first = h.coordinator.execute(req.clone()).await.unwrap_err();
    assert!(matches!(first, TransferError::RemoteCall(_)));

    h.backend.fail_lookup(false);
    let second = h.coordinator.execute(req).await.unwrap_err();
    assert_eq!(second.code(), "REMOTE_CALL_FAILED");
    assert_eq!(h.balance(sender), dec!(10000));
    assert_eq!(h.backend.transfers().len(), 1);
    assert_eq!(h.backend.adjust_calls(), 2);
}

#[tokio::test]
async fn test_idempotency_key_replays_rollback_failure() {
    let h = TestHarness::new();
    let sender = h.backend.add_account("+237650000001", dec!(10000));
    h.backend.add_account("+237677123456", dec!(0));
    h.backend.fail_operation(
        OperationType::TransferCredit,
        LedgerError::Remote("connection reset".into()),
    );
    h.backend.fail_operation(
        OperationType::TransferRefund,
        LedgerError::Remote("connection reset".into()),
    );

    let mut req = request(sender, "677123456", dec!(1000));
    req.idempotency_key = Some("order-44".into());

    let first = h.coordinator.execute(req.clone()).await.unwrap_err();
    assert_eq!(first.code(), "ROLLBACK_FAILED");

    let second = h.coordinator.execute(req).await.unwrap_err();
    assert_eq!(second.code(), "ROLLBACK_FAILED");
    assert_eq!(h.balance(sender), dec!(8985));
    assert_eq!(h.backend.transfers().len(), 1);
}

#[tokio::test]
async fn test_get_transfer() {
    let h = TestHarness::new();
    let sender = h.backend.add_account("+237650000001", dec!(10000));
    let outcome = h
        .coordinator
        .execute(request(sender, UNREGISTERED, dec!(1000)))
        .await
        .unwrap();

    let record = h.coordinator.get(outcome.transfer_id).await.unwrap();
    assert_eq!(record.sender_id, sender);
    assert_eq!(record.total(), dec!(1015));

    let missing = h.coordinator.get(crate::core_types::TransferId::new()).await;
    assert!(matches!(missing, Err(TransferError::TransferNotFound(_))));
}

// ========================================================================
// Claims
// ========================================================================

async fn held_transfer(h: &TestHarness) -> (UserId, String) {
    let sender = h.backend.add_account("+237650000001", dec!(10000));
    let outcome = h
        .coordinator
        .execute(request(sender, UNREGISTERED, dec!(1000)))
        .await
        .unwrap();
    (sender, outcome.claim_code.unwrap())
}

#[tokio::test]
async fn test_redeem_credits_claimant_once() {
    let h = TestHarness::new();
    let (_, code) = held_transfer(&h).await;
    let claimant = h.backend.add_account(UNREGISTERED, dec!(0));

    let outcome = h
        .claims
        .redeem(redeem(claimant, "0699000111", &code.to_lowercase()))
        .await
        .unwrap();

    assert_eq!(outcome.status, TransactionStatus::Completed);
    assert_eq!(outcome.amount, dec!(1000));
    assert_eq!(outcome.new_balance, dec!(1000));
    assert_eq!(h.balance(claimant), dec!(1000));

    let pending = h.backend.pending_by_code(&code).unwrap();
    assert_eq!(pending.status, TransactionStatus::Completed);
    assert_eq!(pending.claimed_by, Some(claimant));

    let row = h.backend.transfer(outcome.transfer_id).unwrap();
    assert_eq!(row.status, TransactionStatus::Completed);
    assert_eq!(row.recipient_id, Some(claimant));

    let again = h
        .claims
        .redeem(redeem(claimant, UNREGISTERED, &code))
        .await
        .unwrap_err();
    assert_eq!(
        again,
        TransferError::Claim(ClaimError::NotPending(TransactionStatus::Completed))
    );
    assert_eq!(h.balance(claimant), dec!(1000));
}

#[tokio::test]
async fn test_redeem_rejects_other_phone() {
    let h = TestHarness::new();
    let (_, code) = held_transfer(&h).await;
    let stranger = h.backend.add_account("+237655555555", dec!(0));

    let err = h
        .claims
        .redeem(redeem(stranger, "+237655555555", &code))
        .await
        .unwrap_err();

    assert_eq!(err, TransferError::Claim(ClaimError::PhoneMismatch));
    assert_eq!(h.balance(stranger), dec!(0));
    assert_eq!(
        h.backend.pending_by_code(&code).unwrap().status,
        TransactionStatus::Pending
    );
}

#[tokio::test]
async fn test_redeem_rejects_sender() {
    let h = TestHarness::new();
    let (sender, code) = held_transfer(&h).await;

    let err = h
        .claims
        .redeem(redeem(sender, UNREGISTERED, &code))
        .await
        .unwrap_err();
    assert_eq!(err, TransferError::Claim(ClaimError::SelfClaim));
}

#[tokio::test]
async fn test_redeem_unknown_or_malformed_code() {
    let h = TestHarness::new();
    held_transfer(&h).await;
    let claimant = h.backend.add_account(UNREGISTERED, dec!(0));

    let err = h
        .claims
        .redeem(redeem(claimant, UNREGISTERED, "ZZZZZZ"))
        .await
        .unwrap_err();
    assert_eq!(err, TransferError::Claim(ClaimError::NotFound));

    let err = h
        .claims
        .redeem(redeem(claimant, UNREGISTERED, "AB-1"))
        .await
        .unwrap_err();
    assert_eq!(err, TransferError::Claim(ClaimError::InvalidCode));
}

#[tokio::test]
async fn test_redeem_credit_failure_keeps_claim_pending() {
    let h = TestHarness::new();
    let (_, code) = held_transfer(&h).await;
    let claimant = h.backend.add_account(UNREGISTERED, dec!(0));
    h.backend.fail_operation(
        OperationType::ClaimCredit,
        LedgerError::Remote("connection reset".into()),
    );

    let err = h
        .claims
        .redeem(redeem(claimant, UNREGISTERED, &code))
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::RemoteCall(_)));
    assert_eq!(
        h.backend.pending_by_code(&code).unwrap().status,
        TransactionStatus::Pending
    );
}

#[tokio::test]
async fn test_cancel_refunds_amount_and_fee() {
    let h = TestHarness::new();
    let (sender, code) = held_transfer(&h).await;
    assert_eq!(h.balance(sender), dec!(8985));
    let admin = Uuid::new_v4();

    let outcome = h.claims.cancel(&code, admin).await.unwrap();

    assert_eq!(outcome.status, TransactionStatus::Cancelled);
    assert_eq!(outcome.new_balance, dec!(10000));
    assert_eq!(h.balance(sender), dec!(10000));

    let row = h.backend.transfer(outcome.transfer_id).unwrap();
    assert_eq!(row.status, TransactionStatus::Cancelled);

    let refund = h.backend.audit_log().pop().unwrap();
    assert_eq!(refund.operation_type, OperationType::ClaimRefund);
    assert_eq!(refund.performed_by, admin);

    let again = h.claims.cancel(&code, admin).await.unwrap_err();
    assert_eq!(
        again,
        TransferError::Claim(ClaimError::NotPending(TransactionStatus::Cancelled))
    );
    assert_eq!(h.balance(sender), dec!(10000));
}

/// Claim row closed by someone else mid-redeem: the credit is reversed
#[tokio::test]
async fn test_redeem_lost_claim_race_reverses_credit() {
    let h = TestHarness::new();
    let (_, code) = held_transfer(&h).await;
    let claimant = h.backend.add_account(UNREGISTERED, dec!(0));
    h.backend.fail_store_with(
        StoreOp::TransitionPending,
        StoreError::Conflict(format!("claim {} is completed, expected pending", code)),
    );

    let err = h
        .claims
        .redeem(redeem(claimant, UNREGISTERED, &code))
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::Claim(ClaimError::NotPending(_))));
    assert_eq!(h.balance(claimant), dec!(0));
    let tail: Vec<_> = audit_deltas(&h).into_iter().rev().take(2).rev().collect();
    assert_eq!(
        tail,
        vec![
            (OperationType::ClaimCredit, dec!(1000)),
            (OperationType::TransferReversal, dec!(-1000)),
        ]
    );
}

/// Claim row closed by someone else mid-cancel: the refund is reversed
#[tokio::test]
async fn test_cancel_lost_claim_race_reverses_refund() {
    let h = TestHarness::new();
    let (sender, code) = held_transfer(&h).await;
    h.backend.fail_store_with(
        StoreOp::TransitionPending,
        StoreError::Conflict(format!("claim {} is completed, expected pending", code)),
    );

    let err = h.claims.cancel(&code, Uuid::new_v4()).await.unwrap_err();

    assert!(matches!(err, TransferError::Claim(ClaimError::NotPending(_))));
    assert_eq!(h.balance(sender), dec!(8985));
    let tail: Vec<_> = audit_deltas(&h).into_iter().rev().take(2).rev().collect();
    assert_eq!(
        tail,
        vec![
            (OperationType::ClaimRefund, dec!(1015)),
            (OperationType::TransferReversal, dec!(-1015)),
        ]
    );
}
