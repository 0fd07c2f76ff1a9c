use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::core_types::TransferId;
use crate::fee::bill_payment_fee;
use crate::ledger::{self, LedgerError, OperationType};
use crate::status::{BillStatus, TransactionStatus};
use crate::store::{AutomaticBill, BillPaymentRecord};
use crate::transfer::TransferCoordinator;
use crate::transfer::TransferError;
use crate::transfer::coordinator::{SettleOrder, Settlement};
use crate::transfer::saga::{Compensation, Saga, unwind};
use crate::transfer::state::TransferState;

use super::error::BillPaymentError;
use super::types::{BillOrder, BillPaymentReceipt, BillPaymentRequest, BillTarget};

/// `process-bill-payment` flow
pub struct BillPaymentService {
    coordinator: Arc<TransferCoordinator>,
    currency: String,
    /// Corridor for `recipient_phone` when the request names none
    default_country: String,
}

impl BillPaymentService {
    pub fn new(
        coordinator: Arc<TransferCoordinator>,
        currency: impl Into<String>,
        default_country: impl Into<String>,
    ) -> Self {
        Self {
            coordinator,
            currency: currency.into(),
            default_country: default_country.into(),
        }
    }

    async fn load_bill(
        &self,
        order: &BillOrder,
        bill_id: Uuid,
    ) -> Result<AutomaticBill, BillPaymentError> {
        let bill = self
            .coordinator
            .store()
            .get_bill(bill_id)
            .await
            .map_err(|e| BillPaymentError::Remote(e.to_string()))?
            // Someone else's bill is reported as missing
            .filter(|b| b.user_id == order.user_id)
            .ok_or(BillPaymentError::BillNotFound)?;

        if bill.status == BillStatus::Paid {
            return Err(BillPaymentError::AlreadyPaid);
        }
        Ok(bill)
    }

    pub async fn process(
        &self,
        req: BillPaymentRequest,
    ) -> Result<BillPaymentReceipt, BillPaymentError> {
        let order = req.validate()?;
        let ledger = self.coordinator.ledger();

        let bill = match &order.target {
            BillTarget::Registered(bill_id) => Some(self.load_bill(&order, *bill_id).await?),
            BillTarget::AdHoc { .. } => None,
        };

        let available = ledger.balance(order.user_id).await.map_err(|e| match e {
            LedgerError::NotFound(_) => BillPaymentError::ProfileNotFound,
            other => BillPaymentError::Remote(other.to_string()),
        })?;

        let fee = bill_payment_fee(order.amount)
            .map_err(|e| BillPaymentError::Validation(e.to_string()))?;
        let total = order
            .amount
            .checked_add(fee)
            .ok_or_else(|| BillPaymentError::Validation("Amount too large".into()))?;
        if available < total {
            return Err(BillPaymentError::InsufficientFunds {
                available,
                required: total,
            });
        }

        let payment_id = Uuid::new_v4();
        let new_balance = match ledger::debit(
            ledger.as_ref(),
            order.user_id,
            total,
            OperationType::BillPayment,
            order.performed_by,
        )
        .await
        {
            Ok(balance) => balance,
            Err(LedgerError::InsufficientFunds { .. }) => {
                return Err(BillPaymentError::InsufficientFunds {
                    available,
                    required: total,
                });
            }
            Err(LedgerError::NotFound(_)) => return Err(BillPaymentError::ProfileNotFound),
            Err(e) => {
                if e.is_indeterminate() {
                    error!(
                        payment_id = %payment_id,
                        user_id = %order.user_id,
                        error = %e,
                        "Bill debit outcome unknown, not compensated - manual reconciliation required"
                    );
                }
                return Err(BillPaymentError::Remote(e.to_string()));
            }
        };
        info!(
            payment_id = %payment_id,
            user_id = %order.user_id,
            amount = %order.amount,
            fee = %fee,
            "Bill payment debited"
        );

        let mut saga = Saga::new(format!("bill:{}", payment_id));
        saga.record(
            "debit_payer",
            Compensation::Credit {
                user_id: order.user_id,
                amount: total,
                operation_type: OperationType::BillRefund,
            },
        );

        match self
            .complete(&mut saga, &order, bill.as_ref(), payment_id, fee)
            .await
        {
            Ok(settlement) => {
                let (recipient_id, claim_code) = match settlement {
                    Some(Settlement::Credited { recipient, .. }) => (Some(recipient.id), None),
                    Some(Settlement::Held { claim_code }) => (None, Some(claim_code)),
                    None => (None, None),
                };
                info!(payment_id = %payment_id, total = %total, "Bill payment completed");
                Ok(BillPaymentReceipt {
                    payment_id,
                    user_id: order.user_id,
                    bill_id: bill.map(|b| b.id),
                    amount: order.amount,
                    fee,
                    total,
                    new_balance,
                    recipient_id,
                    claim_code,
                })
            }
            Err(cause) => {
                warn!(payment_id = %payment_id, error = %cause, "Bill payment failed after debit, refunding");
                let (state, err) = unwind(
                    &mut saga,
                    ledger.as_ref(),
                    self.coordinator.store().as_ref(),
                    order.performed_by,
                    cause,
                )
                .await;
                error!(payment_id = %payment_id, state = %state, error = %err, "Bill payment aborted");
                Err(BillPaymentError::Aborted(err))
            }
        }
    }

    /// Steps after the debit, each recorded on `saga`. The history row is
    /// written last so a failed payment never leaves one behind.
    async fn complete(
        &self,
        saga: &mut Saga,
        order: &BillOrder,
        bill: Option<&AutomaticBill>,
        payment_id: Uuid,
        fee: Decimal,
    ) -> Result<Option<Settlement>, TransferError> {
        let store = self.coordinator.store();
        let now = Utc::now();

        if let Some(bill) = bill {
            store.mark_bill_paid(bill.id, now).await?;
            saga.record(
                "mark_bill_paid",
                Compensation::ReopenBill {
                    bill_id: bill.id,
                    status: bill.status,
                    last_payment_date: bill.last_payment_date,
                },
            );
        }

        let settlement = match order.recipient_phone.as_deref() {
            Some(phone) => {
                let settle = SettleOrder {
                    transfer_id: TransferId::new(),
                    sender_id: order.user_id,
                    recipient: phone,
                    country: order
                        .recipient_country
                        .as_deref()
                        .unwrap_or(self.default_country.as_str()),
                    amount: order.amount,
                    // Fee stays with the bill payment
                    fee: Decimal::ZERO,
                    currency: &self.currency,
                    performed_by: order.performed_by,
                };
                let mut state = TransferState::Debited;
                Some(self.coordinator.settle(saga, &settle, &mut state).await?)
            }
            None => None,
        };

        if let BillTarget::AdHoc { bill_type } = &order.target {
            let record = BillPaymentRecord {
                id: payment_id,
                user_id: order.user_id,
                bill_id: None,
                bill_type: bill_type.clone(),
                provider: order.provider.clone(),
                account_number: order.account_number.clone(),
                amount: order.amount,
                fee,
                status: TransactionStatus::Completed,
                created_at: now,
            };
            store.insert_bill_history(&record).await?;
        }
        Ok(settlement)
    }
}
