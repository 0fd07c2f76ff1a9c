//! Transfer FSM State Definitions
//!
//! ```text
//! INITIATED → DEBITED → RESOLVED → CREDITED → COMPLETED
//!     ↓          ↓  ↘
//!   FAILED       ↓   UNRESOLVED → PENDING_CLAIM
//!                ↓
//!        ROLLED_BACK | ROLLBACK_FAILED   (from any state after DEBITED)
//! ```
//!
//! State IDs are SMALLINT-friendly for the `transfers.state` column.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::error::TransferError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum TransferState {
    /// Request validated, fee computed
    Initiated = 0,

    /// Sender debited amount + fee - funds are IN-FLIGHT
    Debited = 10,

    /// Recipient matched a local account
    Resolved = 20,

    /// No local account matched
    Unresolved = 21,

    /// Recipient credited with the amount
    Credited = 30,

    /// Terminal: money moved
    Completed = 40,

    /// Terminal: funds held under a claim code
    PendingClaim = 41,

    /// Terminal: rejected before any balance mutation
    Failed = -10,

    /// Terminal: failed after the debit, every compensation applied
    RolledBack = -30,

    /// Terminal: failed after the debit and a compensation failed too.
    /// The sender may be left debited; needs manual reconciliation.
    RollbackFailed = -40,
}

impl TransferState {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferState::Completed
                | TransferState::PendingClaim
                | TransferState::Failed
                | TransferState::RolledBack
                | TransferState::RollbackFailed
        )
    }

    /// Sender debited, outcome not settled yet
    #[inline]
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            TransferState::Debited
                | TransferState::Resolved
                | TransferState::Unresolved
                | TransferState::Credited
        )
    }

    /// Legal FSM edges
    pub fn can_advance_to(&self, next: TransferState) -> bool {
        use TransferState::*;
        match (self, next) {
            (Initiated, Debited) | (Initiated, Failed) => true,
            (Debited, Resolved) | (Debited, Unresolved) => true,
            (Resolved, Credited) => true,
            (Credited, Completed) => true,
            (Unresolved, PendingClaim) => true,
            (from, RolledBack) | (from, RollbackFailed) => from.is_in_flight(),
            _ => false,
        }
    }

    /// Move along a legal edge; `self` is unchanged on an illegal one.
    pub fn advance(&mut self, next: TransferState) -> Result<(), TransferError> {
        if !self.can_advance_to(next) {
            return Err(TransferError::InvalidStateTransition(format!(
                "{} -> {}",
                self, next
            )));
        }
        *self = next;
        Ok(())
    }

    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(TransferState::Initiated),
            10 => Some(TransferState::Debited),
            20 => Some(TransferState::Resolved),
            21 => Some(TransferState::Unresolved),
            30 => Some(TransferState::Credited),
            40 => Some(TransferState::Completed),
            41 => Some(TransferState::PendingClaim),
            -10 => Some(TransferState::Failed),
            -30 => Some(TransferState::RolledBack),
            -40 => Some(TransferState::RollbackFailed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferState::Initiated => "INITIATED",
            TransferState::Debited => "DEBITED",
            TransferState::Resolved => "RESOLVED",
            TransferState::Unresolved => "UNRESOLVED",
            TransferState::Credited => "CREDITED",
            TransferState::Completed => "COMPLETED",
            TransferState::PendingClaim => "PENDING_CLAIM",
            TransferState::Failed => "FAILED",
            TransferState::RolledBack => "ROLLED_BACK",
            TransferState::RollbackFailed => "ROLLBACK_FAILED",
        }
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<i16> for TransferState {
    type Error = ();

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        TransferState::from_id(value).ok_or(())
    }
}

impl FromStr for TransferState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let state = match s {
            "INITIATED" => TransferState::Initiated,
            "DEBITED" => TransferState::Debited,
            "RESOLVED" => TransferState::Resolved,
            "UNRESOLVED" => TransferState::Unresolved,
            "CREDITED" => TransferState::Credited,
            "COMPLETED" => TransferState::Completed,
            "PENDING_CLAIM" => TransferState::PendingClaim,
            "FAILED" => TransferState::Failed,
            "ROLLED_BACK" => TransferState::RolledBack,
            "ROLLBACK_FAILED" => TransferState::RollbackFailed,
            other => return Err(format!("unknown transfer state: {}", other)),
        };
        Ok(state)
    }
}

impl Serialize for TransferState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TransferState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
