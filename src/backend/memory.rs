//! In-memory backend
//!
//! Implements the ledger, directory and store traits over a single mutex,
//! which makes every `adjust_balance` atomic. Used by tests and local runs.
//! Failures are injected per ledger operation type and per store operation.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::core_types::{Account, TransferId, UserId};
use crate::ledger::{AuditEntry, BalanceLedger, LedgerError, OperationType};
use crate::resolver::{RecipientDirectory, ResolveError, digits};
use crate::status::{BillStatus, TransactionStatus};
use crate::store::{
    AutomaticBill, BillPaymentRecord, PendingTransfer, StoreError, TransferPatch, TransferRecord,
    TransferStore, check_transition,
};

/// Store calls that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    InsertTransfer,
    TransitionTransfer,
    InsertPending,
    TransitionPending,
    MarkBillPaid,
    ReopenBill,
    InsertBillHistory,
}

/// Armed store fault: `passes` calls succeed, the next ones fail with `error`
#[derive(Debug, Clone)]
struct StoreFault {
    passes: usize,
    error: StoreError,
}

#[derive(Debug, Clone)]
struct Profile {
    account: Account,
    balance: Decimal,
}

#[derive(Default)]
struct State {
    profiles: Vec<Profile>,
    transfers: HashMap<TransferId, TransferRecord>,
    pending: HashMap<TransferId, PendingTransfer>,
    bills: HashMap<Uuid, AutomaticBill>,
    bill_history: Vec<BillPaymentRecord>,
    audit: Vec<AuditEntry>,
    reserved_codes: HashSet<String>,
}

impl State {
    fn profile_mut(&mut self, user_id: UserId) -> Option<&mut Profile> {
        self.profiles.iter_mut().find(|p| p.account.id == user_id)
    }
}

#[derive(Default)]
struct Faults {
    ledger: HashMap<OperationType, LedgerError>,
    store: HashMap<StoreOp, StoreFault>,
    lookup: bool,
}

/// In-memory backend
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
    faults: Mutex<Faults>,
    adjust_calls: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn store_fault(&self, op: StoreOp) -> Result<(), StoreError> {
        match self.faults().store.get_mut(&op) {
            None => Ok(()),
            Some(fault) if fault.passes > 0 => {
                fault.passes -= 1;
                Ok(())
            }
            Some(fault) => Err(fault.error.clone()),
        }
    }

    // === Seeding ===

    /// Register an account with a generated id.
    pub fn add_account(&self, phone: &str, balance: Decimal) -> UserId {
        let account = Account {
            id: Uuid::new_v4(),
            full_name: format!("User {}", phone),
            phone: phone.to_string(),
            email: None,
            country: None,
        };
        let id = account.id;
        self.insert_account(account, balance);
        id
    }

    pub fn insert_account(&self, account: Account, balance: Decimal) {
        self.state().profiles.push(Profile { account, balance });
    }

    pub fn add_bill(&self, bill: AutomaticBill) {
        self.state().bills.insert(bill.id, bill);
    }

    /// Mark a claim code as taken without a pending row behind it.
    pub fn reserve_claim_code(&self, code: &str) {
        self.state().reserved_codes.insert(code.to_string());
    }

    // === Fault injection ===

    /// Every `adjust_balance` with `op` fails with `error`, without applying.
    pub fn fail_operation(&self, op: OperationType, error: LedgerError) {
        self.faults().ledger.insert(op, error);
    }

    pub fn fail_store(&self, op: StoreOp, fail: bool) {
        if fail {
            self.fail_store_after(op, 0);
        } else {
            self.faults().store.remove(&op);
        }
    }

    /// Let `passes` calls of `op` through, then fail every later one.
    pub fn fail_store_after(&self, op: StoreOp, passes: usize) {
        let error = StoreError::Remote(format!("injected {:?} failure", op));
        self.faults().store.insert(op, StoreFault { passes, error });
    }

    /// Every call of `op` answers `error` (e.g. a lost CAS race).
    pub fn fail_store_with(&self, op: StoreOp, error: StoreError) {
        self.faults()
            .store
            .insert(op, StoreFault { passes: 0, error });
    }

    pub fn fail_lookup(&self, fail: bool) {
        self.faults().lookup = fail;
    }

    // === Inspection ===

    pub fn balance_of(&self, user_id: UserId) -> Option<Decimal> {
        self.state()
            .profiles
            .iter()
            .find(|p| p.account.id == user_id)
            .map(|p| p.balance)
    }

    /// `adjust_balance` calls, including rejected ones
    pub fn adjust_calls(&self) -> usize {
        self.adjust_calls.load(Ordering::SeqCst)
    }

    pub fn audit_log(&self) -> Vec<AuditEntry> {
        self.state().audit.clone()
    }

    pub fn transfer(&self, id: TransferId) -> Option<TransferRecord> {
        self.state().transfers.get(&id).cloned()
    }

    pub fn transfers(&self) -> Vec<TransferRecord> {
        self.state().transfers.values().cloned().collect()
    }

    pub fn pending_by_code(&self, code: &str) -> Option<PendingTransfer> {
        self.state()
            .pending
            .values()
            .find(|p| p.claim_code == code)
            .cloned()
    }

    pub fn pending_transfers(&self) -> Vec<PendingTransfer> {
        self.state().pending.values().cloned().collect()
    }

    pub fn bill(&self, id: Uuid) -> Option<AutomaticBill> {
        self.state().bills.get(&id).cloned()
    }

    pub fn bill_history(&self) -> Vec<BillPaymentRecord> {
        self.state().bill_history.clone()
    }
}

#[async_trait]
impl BalanceLedger for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn balance(&self, user_id: UserId) -> Result<Decimal, LedgerError> {
        self.balance_of(user_id).ok_or(LedgerError::NotFound(user_id))
    }

    async fn adjust_balance(
        &self,
        user_id: UserId,
        delta: Decimal,
        operation_type: OperationType,
        performed_by: UserId,
    ) -> Result<Decimal, LedgerError> {
        self.adjust_calls.fetch_add(1, Ordering::SeqCst);

        if delta.is_zero() {
            return Err(LedgerError::InvalidDelta);
        }
        if let Some(err) = self.faults().ledger.get(&operation_type) {
            return Err(err.clone());
        }

        let mut state = self.state();
        let profile = state
            .profile_mut(user_id)
            .ok_or(LedgerError::NotFound(user_id))?;

        let balance_after = profile
            .balance
            .checked_add(delta)
            .ok_or_else(|| LedgerError::Remote("balance overflow".into()))?;
        if balance_after < Decimal::ZERO {
            return Err(LedgerError::InsufficientFunds {
                available: Some(profile.balance),
                requested: -delta,
            });
        }
        profile.balance = balance_after;

        state.audit.push(AuditEntry {
            user_id,
            delta,
            operation_type,
            performed_by,
            balance_after,
            at: Utc::now(),
        });
        Ok(balance_after)
    }
}

#[async_trait]
impl RecipientDirectory for MemoryBackend {
    async fn find_recipient(&self, search_term: &str) -> Result<Vec<Account>, ResolveError> {
        if self.faults().lookup {
            return Err(ResolveError::Remote("injected lookup failure".into()));
        }

        let term = search_term.trim();
        let term_digits = digits(term);
        let is_email = term.contains('@');

        let found = self
            .state()
            .profiles
            .iter()
            .filter(|p| {
                let account = &p.account;
                if is_email {
                    return account
                        .email
                        .as_deref()
                        .is_some_and(|e| e.eq_ignore_ascii_case(term));
                }
                account.phone == term
                    || (!term_digits.is_empty() && digits(&account.phone).contains(&term_digits))
            })
            .map(|p| p.account.clone())
            .collect();
        Ok(found)
    }
}

#[async_trait]
impl TransferStore for MemoryBackend {
    async fn insert_transfer(&self, record: &TransferRecord) -> Result<(), StoreError> {
        self.store_fault(StoreOp::InsertTransfer)?;
        let mut state = self.state();

        if state.transfers.contains_key(&record.id) {
            return Err(StoreError::Duplicate(record.id.to_string()));
        }
        if let Some(key) = record.idempotency_key.as_deref()
            && state
                .transfers
                .values()
                .any(|t| t.idempotency_key.as_deref() == Some(key))
        {
            return Err(StoreError::Duplicate(key.to_string()));
        }
        state.transfers.insert(record.id, record.clone());
        Ok(())
    }

    async fn get_transfer(&self, id: TransferId) -> Result<Option<TransferRecord>, StoreError> {
        Ok(self.transfer(id))
    }

    async fn find_transfer_by_key(
        &self,
        idempotency_key: &str,
    ) -> Result<Option<TransferRecord>, StoreError> {
        Ok(self
            .state()
            .transfers
            .values()
            .find(|t| t.idempotency_key.as_deref() == Some(idempotency_key))
            .cloned())
    }

    async fn transition_transfer(
        &self,
        id: TransferId,
        from: TransactionStatus,
        to: TransactionStatus,
        patch: TransferPatch,
    ) -> Result<(), StoreError> {
        self.store_fault(StoreOp::TransitionTransfer)?;
        if from != to {
            check_transition(from, to)?;
        }

        let mut state = self.state();
        let row = state
            .transfers
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if row.status != from {
            return Err(StoreError::Conflict(format!(
                "transfer {} is {}, expected {}",
                id, row.status, from
            )));
        }

        row.status = to;
        if let Some(recipient_id) = patch.recipient_id {
            row.recipient_id = Some(recipient_id);
        }
        if let Some(s) = patch.state {
            row.state = s;
        }
        if let Some(code) = patch.claim_code {
            row.claim_code = Some(code);
        }
        if let Some(error) = patch.error {
            row.error = Some(error);
        }
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn claim_code_exists(&self, claim_code: &str) -> Result<bool, StoreError> {
        let state = self.state();
        Ok(state.reserved_codes.contains(claim_code)
            || state.pending.values().any(|p| p.claim_code == claim_code))
    }

    async fn insert_pending(&self, pending: &PendingTransfer) -> Result<(), StoreError> {
        self.store_fault(StoreOp::InsertPending)?;
        let mut state = self.state();

        if state.pending.contains_key(&pending.transfer_id)
            || state
                .pending
                .values()
                .any(|p| p.claim_code == pending.claim_code)
        {
            return Err(StoreError::Duplicate(pending.claim_code.clone()));
        }
        state.pending.insert(pending.transfer_id, pending.clone());
        Ok(())
    }

    async fn get_pending_by_code(
        &self,
        claim_code: &str,
    ) -> Result<Option<PendingTransfer>, StoreError> {
        Ok(self.pending_by_code(claim_code))
    }

    async fn transition_pending(
        &self,
        transfer_id: TransferId,
        from: TransactionStatus,
        to: TransactionStatus,
        claimed_by: Option<UserId>,
    ) -> Result<(), StoreError> {
        self.store_fault(StoreOp::TransitionPending)?;
        check_transition(from, to)?;

        let mut state = self.state();
        let row = state
            .pending
            .get_mut(&transfer_id)
            .ok_or_else(|| StoreError::NotFound(transfer_id.to_string()))?;
        if row.status != from {
            return Err(StoreError::Conflict(format!(
                "claim {} is {}, expected {}",
                row.claim_code, row.status, from
            )));
        }

        row.status = to;
        if claimed_by.is_some() {
            row.claimed_by = claimed_by;
        }
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn get_bill(&self, bill_id: Uuid) -> Result<Option<AutomaticBill>, StoreError> {
        Ok(self.bill(bill_id))
    }

    async fn mark_bill_paid(
        &self,
        bill_id: Uuid,
        paid_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.store_fault(StoreOp::MarkBillPaid)?;
        let mut state = self.state();

        let bill = state
            .bills
            .get_mut(&bill_id)
            .ok_or_else(|| StoreError::NotFound(bill_id.to_string()))?;
        if bill.status == BillStatus::Paid {
            return Err(StoreError::Conflict(format!("bill {} already paid", bill_id)));
        }
        bill.status = BillStatus::Paid;
        bill.last_payment_date = Some(paid_at);
        Ok(())
    }

    async fn reopen_bill(
        &self,
        bill_id: Uuid,
        status: BillStatus,
        last_payment_date: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        self.store_fault(StoreOp::ReopenBill)?;
        let mut state = self.state();

        let bill = state
            .bills
            .get_mut(&bill_id)
            .ok_or_else(|| StoreError::NotFound(bill_id.to_string()))?;
        if bill.status != BillStatus::Paid {
            return Err(StoreError::Conflict(format!(
                "bill {} is {}, expected paid",
                bill_id, bill.status
            )));
        }
        bill.status = status;
        bill.last_payment_date = last_payment_date;
        Ok(())
    }

    async fn insert_bill_history(&self, record: &BillPaymentRecord) -> Result<(), StoreError> {
        self.store_fault(StoreOp::InsertBillHistory)?;
        self.state().bill_history.push(record.clone());
        Ok(())
    }
}
