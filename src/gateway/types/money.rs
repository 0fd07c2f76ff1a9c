//! Money types for API boundary enforcement
//!
//! `StrictAmount` validates format during deserialization, so handlers only
//! ever see positive amounts with at most two decimals.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::money::parse_amount;

/// Strict format amount
///
/// - Only JSON strings (numbers bypass format validation)
/// - Rejects `.5`, `5.`, signs, exponents and zero
/// - Rejects more than two decimals
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrictAmount(Decimal);

impl StrictAmount {
    pub fn inner(self) -> Decimal {
        self.0
    }
}

impl std::ops::Deref for StrictAmount {
    type Target = Decimal;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'de> Deserialize<'de> for StrictAmount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        let s = String::deserialize(deserializer)?;
        parse_amount(&s).map(StrictAmount).map_err(D::Error::custom)
    }
}

impl Serialize for StrictAmount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}
