//! Fee calculation
//!
//! All fee rates use 10^6 precision: 15_000 = 1.50%

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::{CURRENCY_SCALE, require_currency_scale, require_positive, round_currency};

/// Fee rate precision (10^6 = 1,000,000)
pub const FEE_PRECISION: u64 = 1_000_000;

/// Domestic transfer fee (15_000 = 1.50%)
pub const DEFAULT_DOMESTIC_FEE: u64 = 15_000;

/// Cross-border transfer fee (10_000 = 1.00%)
pub const DEFAULT_CROSS_BORDER_FEE: u64 = 10_000;

/// Platform share of every transfer (5_000 = 0.50%), capped at the fee
pub const DEFAULT_PLATFORM_COMMISSION: u64 = 5_000;

/// Flat bill payment fee (15_000 = 1.50%)
pub const BILL_PAYMENT_FEE: u64 = 15_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeeError {
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Amount supports at most {max} decimal places")]
    Precision { max: u32 },

    #[error("Amount too large")]
    Overflow,
}

/// Positive, at most [`CURRENCY_SCALE`] decimals
fn check_amount(amount: Decimal) -> Result<Decimal, FeeError> {
    let amount = require_positive(amount).map_err(|_| FeeError::InvalidAmount)?;
    require_currency_scale(amount).map_err(|_| FeeError::Precision {
        max: CURRENCY_SCALE,
    })
}

/// (sender country, recipient country) classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Corridor {
    Domestic,
    CrossBorder,
}

impl Corridor {
    /// A missing recipient country is treated as domestic.
    pub fn classify(sender_country: &str, recipient_country: Option<&str>) -> Self {
        match recipient_country.map(str::trim).filter(|c| !c.is_empty()) {
            Some(rc) if !rc.eq_ignore_ascii_case(sender_country.trim()) => Corridor::CrossBorder,
            _ => Corridor::Domestic,
        }
    }
}

/// Fee rates per corridor (10^6 precision)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub domestic_rate: u64,
    pub cross_border_rate: u64,
    pub platform_commission_rate: u64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            domestic_rate: DEFAULT_DOMESTIC_FEE,
            cross_border_rate: DEFAULT_CROSS_BORDER_FEE,
            platform_commission_rate: DEFAULT_PLATFORM_COMMISSION,
        }
    }
}

impl FeeSchedule {
    pub fn rate_for(&self, corridor: Corridor) -> u64 {
        match corridor {
            Corridor::Domestic => self.domestic_rate,
            Corridor::CrossBorder => self.cross_border_rate,
        }
    }
}

/// Result of a fee calculation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeeQuote {
    pub amount: Decimal,
    pub fee: Decimal,
    pub platform_commission: Decimal,
    /// amount + fee, what the sender is debited
    pub total: Decimal,
    pub corridor: Corridor,
}

/// Apply a 10^6-precision rate, rounded to currency precision.
///
/// Checked arithmetic: an amount whose product with the rate leaves the
/// `Decimal` range is an [`FeeError::Overflow`].
#[inline]
pub fn apply_rate(amount: Decimal, rate: u64) -> Result<Decimal, FeeError> {
    amount
        .checked_mul(Decimal::from(rate))
        .and_then(|scaled| scaled.checked_div(Decimal::from(FEE_PRECISION)))
        .map(round_currency)
        .ok_or(FeeError::Overflow)
}

/// Calculate the fee for a transfer.
///
/// Pure: identical inputs always produce identical quotes.
///
/// # Example
/// ```
/// use momo_rails::fee::{calculate_fee, FeeSchedule};
/// use rust_decimal::Decimal;
///
/// let quote = calculate_fee(Decimal::from(1000), "CM", Some("CM"), &FeeSchedule::default()).unwrap();
/// assert_eq!(quote.fee, Decimal::from(15));
/// assert_eq!(quote.total, Decimal::from(1015));
/// ```
pub fn calculate_fee(
    amount: Decimal,
    sender_country: &str,
    recipient_country: Option<&str>,
    schedule: &FeeSchedule,
) -> Result<FeeQuote, FeeError> {
    let amount = check_amount(amount)?;
    let corridor = Corridor::classify(sender_country, recipient_country);

    let fee = apply_rate(amount, schedule.rate_for(corridor))?;
    let platform_commission = apply_rate(amount, schedule.platform_commission_rate)?.min(fee);
    let total = amount.checked_add(fee).ok_or(FeeError::Overflow)?;

    Ok(FeeQuote {
        amount,
        fee,
        platform_commission,
        total,
        corridor,
    })
}

/// Fee charged on top of a bill payment
pub fn bill_payment_fee(amount: Decimal) -> Result<Decimal, FeeError> {
    apply_rate(check_amount(amount)?, BILL_PAYMENT_FEE)
}
