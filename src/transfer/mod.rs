//! Transfer Orchestration
//!
//! Moves money from a sender to a recipient identified by phone or email,
//! through the single balance primitive [`crate::ledger::BalanceLedger`].
//!
//! # State Machine
//!
//! ```text
//! INITIATED → DEBITED → RESOLVED → CREDITED → COMPLETED
//!     ↓          ↓
//!   FAILED       └──→ UNRESOLVED → PENDING_CLAIM
//!
//! any failure after DEBITED → ROLLED_BACK | ROLLBACK_FAILED
//! ```
//!
//! # Safety Invariants
//!
//! 1. **Persist-Before-Debit**: the `transfers` row exists before money moves
//!    and is checkpointed at `DEBITED` before anything else runs
//! 2. **Compensation as data**: every applied step (balance, claim, bill) is
//!    journaled in a [`saga::Saga`] together with its inverse
//! 3. **Unknown is not failed**: a timed-out debit is never compensated
//! 4. **Observable rollback gap**: a failed compensation ends in
//!    `ROLLBACK_FAILED`, never in `ROLLED_BACK`

pub mod claim;
pub mod coordinator;
pub mod error;
pub mod saga;
pub mod state;
pub mod types;

#[cfg(test)]
mod integration_tests;

pub use claim::{ClaimError, ClaimIssuer, ClaimOutcome, ClaimService, RedeemRequest};
pub use coordinator::TransferCoordinator;
pub use error::TransferError;
pub use state::TransferState;
pub use types::{TransferOutcome, TransferRequest};
