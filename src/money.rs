//! Money Module
//!
//! Currency amounts are `rust_decimal::Decimal` in major units (e.g. 1015.50).
//! Every amount that reaches the ledger goes through [`round_currency`], so
//! balances never carry more than [`CURRENCY_SCALE`] decimal places.
//!
//! ## Usage
//! ```rust
//! use momo_rails::money::{format_amount, parse_amount};
//!
//! let amount = parse_amount("1000.5").unwrap();
//! assert_eq!(format_amount(amount), "1000.50");
//! ```

use rust_decimal::prelude::*;
use thiserror::Error;

/// Decimal places kept for every stored amount
pub const CURRENCY_SCALE: u32 = 2;

/// Money conversion errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("Precision overflow: provided {provided} decimals, max allowed {max}")]
    PrecisionOverflow { provided: u32, max: u32 },

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Parse a client-supplied amount string.
///
/// Strict: rejects signs, `.5`, `5.`, exponents, thousands separators and
/// more than [`CURRENCY_SCALE`] decimals. Zero is rejected.
pub fn parse_amount(amount_str: &str) -> Result<Decimal, MoneyError> {
    let s = amount_str.trim();
    if s.is_empty() {
        return Err(MoneyError::InvalidFormat("empty string".into()));
    }
    if s.starts_with('-') || s.starts_with('+') {
        return Err(MoneyError::InvalidAmount);
    }

    let (whole, frac) = match s.split_once('.') {
        None => (s, ""),
        Some((w, f)) => {
            if w.is_empty() {
                return Err(MoneyError::InvalidFormat(
                    "missing leading zero (e.g., use 0.5 instead of .5)".into(),
                ));
            }
            if f.is_empty() {
                return Err(MoneyError::InvalidFormat(
                    "missing fractional part (e.g., use 5.0 instead of 5.)".into(),
                ));
            }
            (w, f)
        }
    };

    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(MoneyError::InvalidFormat(format!(
            "invalid character in amount: {}",
            s
        )));
    }

    if frac.len() > CURRENCY_SCALE as usize {
        return Err(MoneyError::PrecisionOverflow {
            provided: frac.len() as u32,
            max: CURRENCY_SCALE,
        });
    }

    let value = Decimal::from_str(s).map_err(|e| MoneyError::InvalidFormat(e.to_string()))?;
    require_positive(value)
}

/// Reject zero and negative amounts
pub fn require_positive(amount: Decimal) -> Result<Decimal, MoneyError> {
    if amount <= Decimal::ZERO {
        return Err(MoneyError::InvalidAmount);
    }
    Ok(amount)
}

/// Reject amounts carrying more than [`CURRENCY_SCALE`] decimals
pub fn require_currency_scale(amount: Decimal) -> Result<Decimal, MoneyError> {
    if amount.scale() > CURRENCY_SCALE {
        return Err(MoneyError::PrecisionOverflow {
            provided: amount.scale(),
            max: CURRENCY_SCALE,
        });
    }
    Ok(amount)
}

/// Round to currency precision, midpoint away from zero
#[inline]
pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Display string with exactly [`CURRENCY_SCALE`] decimals
pub fn format_amount(amount: Decimal) -> String {
    format!(
        "{:.prec$}",
        round_currency(amount),
        prec = CURRENCY_SCALE as usize
    )
}
