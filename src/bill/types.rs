use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::core_types::UserId;
use crate::money::{CURRENCY_SCALE, require_currency_scale};

use super::error::BillPaymentError;

/// `POST /process-bill-payment` body
///
/// Every field is optional at the wire level so a missing one answers 400
/// with a readable message rather than a decoder error.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct BillPaymentRequest {
    #[schema(value_type = Option<String>, format = "uuid")]
    pub user_id: Option<UserId>,
    #[schema(value_type = Option<String>, example = "10000")]
    pub amount: Option<Decimal>,
    /// Ad-hoc payment: recorded in `bill_payment_history`
    pub bill_type: Option<String>,
    /// Payment of a registered `automatic_bills` row
    #[schema(value_type = Option<String>, format = "uuid")]
    pub bill_id: Option<Uuid>,
    pub provider: Option<String>,
    pub account_number: Option<String>,
    /// Settle the bill amount to this phone number's account
    pub recipient_phone: Option<String>,
    pub recipient_country: Option<String>,
    /// Agent or admin acting for the user; defaults to the user
    #[schema(value_type = Option<String>, format = "uuid")]
    pub performed_by: Option<UserId>,
}

/// What the payment targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillTarget {
    Registered(Uuid),
    AdHoc { bill_type: String },
}

/// A request that passed validation
#[derive(Debug, Clone)]
pub struct BillOrder {
    pub user_id: UserId,
    pub amount: Decimal,
    pub target: BillTarget,
    pub provider: Option<String>,
    pub account_number: Option<String>,
    pub recipient_phone: Option<String>,
    pub recipient_country: Option<String>,
    pub performed_by: UserId,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl BillPaymentRequest {
    pub fn validate(self) -> Result<BillOrder, BillPaymentError> {
        let (Some(user_id), Some(amount)) = (self.user_id, self.amount) else {
            return Err(BillPaymentError::Validation(
                "Missing required fields: user_id and amount".into(),
            ));
        };
        if amount <= Decimal::ZERO {
            return Err(BillPaymentError::Validation(
                "Amount must be greater than zero".into(),
            ));
        }
        let amount = require_currency_scale(amount).map_err(|_| {
            BillPaymentError::Validation(format!(
                "Amount supports at most {} decimal places",
                CURRENCY_SCALE
            ))
        })?;

        let target = match (self.bill_id, non_empty(self.bill_type)) {
            (Some(bill_id), _) => BillTarget::Registered(bill_id),
            (None, Some(bill_type)) => BillTarget::AdHoc { bill_type },
            (None, None) => {
                return Err(BillPaymentError::Validation(
                    "Missing required field: bill_type or bill_id".into(),
                ));
            }
        };

        Ok(BillOrder {
            user_id,
            amount,
            target,
            provider: non_empty(self.provider),
            account_number: non_empty(self.account_number),
            recipient_phone: non_empty(self.recipient_phone),
            recipient_country: non_empty(self.recipient_country),
            performed_by: self.performed_by.unwrap_or(user_id),
        })
    }
}

/// Successful bill payment
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct BillPaymentReceipt {
    #[schema(value_type = String, format = "uuid")]
    pub payment_id: Uuid,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub bill_id: Option<Uuid>,
    #[schema(value_type = String)]
    pub amount: Decimal,
    #[schema(value_type = String)]
    pub fee: Decimal,
    /// amount + fee, what the user was debited
    #[schema(value_type = String)]
    pub total: Decimal,
    #[schema(value_type = String)]
    pub new_balance: Decimal,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub recipient_id: Option<UserId>,
    pub claim_code: Option<String>,
}
