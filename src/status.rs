//! Transaction Status
//!
//! One closed status enumeration for every ledger-touching row
//! (`transfers`, `pending_transfers`, `bill_payment_history`,
//! `merchant_payments`). Stored rows written by older clients use several
//! spellings; parsing folds them onto the canonical variants, writing always
//! emits the canonical string.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown transaction status: {0}")]
pub struct UnknownStatus(pub String);

/// Lifecycle status of a ledger row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionStatus {
    /// Funds held, waiting for a claim or a follow-up step
    Pending,
    /// Money moved
    Completed,
    /// Administratively cancelled, funds returned
    Cancelled,
    /// Soft-deleted
    Archived,
    /// Did not complete
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Cancelled => "cancelled",
            TransactionStatus::Archived => "archived",
            TransactionStatus::Failed => "failed",
        }
    }

    /// Status transitions are one-directional.
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (Pending, Completed)
                | (Pending, Cancelled)
                | (Pending, Failed)
                | (Completed, Archived)
                | (Cancelled, Archived)
                | (Failed, Archived)
        )
    }

    #[inline]
    pub fn is_final(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" | "processing" => Ok(TransactionStatus::Pending),
            "completed" | "complete" | "success" | "successful" | "paid" | "claimed" => {
                Ok(TransactionStatus::Completed)
            }
            "cancelled" | "canceled" => Ok(TransactionStatus::Cancelled),
            "archived" | "deleted" => Ok(TransactionStatus::Archived),
            "failed" | "error" => Ok(TransactionStatus::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl Serialize for TransactionStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TransactionStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// `automatic_bills.status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillStatus {
    Pending,
    Paid,
    Overdue,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Pending => "pending",
            BillStatus::Paid => "paid",
            BillStatus::Overdue => "overdue",
        }
    }
}

impl fmt::Display for BillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" | "unpaid" => Ok(BillStatus::Pending),
            "paid" => Ok(BillStatus::Paid),
            "overdue" => Ok(BillStatus::Overdue),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_aliases() {
        assert_eq!("success".parse(), Ok(TransactionStatus::Completed));
        assert_eq!("Paid".parse(), Ok(TransactionStatus::Completed));
        assert_eq!("canceled".parse(), Ok(TransactionStatus::Cancelled));
        assert_eq!("deleted".parse(), Ok(TransactionStatus::Archived));
        assert!("bogus".parse::<TransactionStatus>().is_err());
    }

    #[test]
    fn test_transitions() {
        use TransactionStatus::*;
        assert!(Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Completed.can_transition_to(Archived));

        assert!(!Completed.can_transition_to(Pending));
        assert!(!Cancelled.can_transition_to(Completed));
        assert!(!Archived.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Pending));

        assert!(!Pending.is_final());
        assert!(Cancelled.is_final());
    }

    #[test]
    fn test_serde_canonical() {
        let json = serde_json::to_string(&TransactionStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
        let parsed: TransactionStatus = serde_json::from_str("\"success\"").unwrap();
        assert_eq!(parsed, TransactionStatus::Completed);
    }
}
