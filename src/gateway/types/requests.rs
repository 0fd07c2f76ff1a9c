//! Request and reply bodies

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::bill::BillPaymentReceipt;
use crate::core_types::UserId;
use crate::transfer::{RedeemRequest, TransferRequest};

use super::money::StrictAmount;

/// `POST /api/v1/transfers`
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateTransferRequest {
    #[schema(value_type = String, format = "uuid")]
    pub sender_id: UserId,
    #[schema(example = "CM")]
    pub sender_country: String,
    /// Phone number or email
    #[schema(example = "+237677123456")]
    pub recipient: String,
    #[serde(default)]
    pub recipient_country: Option<String>,
    #[schema(value_type = String, example = "1000")]
    pub amount: StrictAmount,
    #[serde(default)]
    pub currency: Option<String>,
    /// Defaults to `sender_id`
    #[serde(default)]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub performed_by: Option<UserId>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl CreateTransferRequest {
    pub fn into_transfer(self, default_currency: &str) -> TransferRequest {
        TransferRequest {
            sender_id: self.sender_id,
            sender_country: self.sender_country,
            recipient: self.recipient,
            recipient_country: self.recipient_country,
            amount: self.amount.inner(),
            currency: self
                .currency
                .unwrap_or_else(|| default_currency.to_string()),
            performed_by: self.performed_by.unwrap_or(self.sender_id),
            idempotency_key: self.idempotency_key,
        }
    }
}

/// `POST /api/v1/claims/redeem`
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RedeemClaimRequest {
    #[schema(value_type = String, format = "uuid")]
    pub claimant_id: UserId,
    #[schema(example = "+237677123456")]
    pub claimant_phone: String,
    #[schema(example = "K7Q2ZD")]
    pub claim_code: String,
    /// Used to read the phone numbers when the claim has no country
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub performed_by: Option<UserId>,
}

impl RedeemClaimRequest {
    pub fn into_redeem(self, default_country: &str) -> RedeemRequest {
        RedeemRequest {
            claimant_id: self.claimant_id,
            claimant_phone: self.claimant_phone,
            claim_code: self.claim_code,
            country: self
                .country
                .unwrap_or_else(|| default_country.to_string()),
            performed_by: self.performed_by.unwrap_or(self.claimant_id),
        }
    }
}

/// `POST /api/v1/claims/{code}/cancel`
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CancelClaimRequest {
    #[schema(value_type = String, format = "uuid")]
    pub performed_by: UserId,
}

/// `GET /api/v1/fees/quote`
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FeeQuoteParams {
    /// Amount as a decimal string
    pub amount: String,
    pub sender_country: String,
    pub recipient_country: Option<String>,
}

/// Body of every `/process-bill-payment` reply
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BillPaymentReply {
    pub success: bool,
    pub message: String,
    /// Total debited (amount + fee)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub new_balance: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<BillPaymentReceipt>,
}

impl BillPaymentReply {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            amount: None,
            new_balance: None,
            receipt: None,
        }
    }

    pub fn paid(receipt: BillPaymentReceipt) -> Self {
        Self {
            success: true,
            message: "Bill payment processed successfully".to_string(),
            amount: Some(receipt.total),
            new_balance: Some(receipt.new_balance),
            receipt: Some(receipt),
        }
    }
}
