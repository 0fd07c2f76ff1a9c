//! Hosted platform backend (PostgREST over HTTP)
//!
//! RPCs go to `POST {url}/rest/v1/rpc/<name>`, tables to `{url}/rest/v1/<table>`
//! with PostgREST filters. Every request carries the service-role key as both
//! `apikey` and bearer token. CAS updates are `PATCH ...&status=eq.<from>`
//! with `Prefer: return=representation`; an empty result is a lost race or a
//! missing row.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::config::SupabaseCredentials;
use crate::core_types::{Account, TransferId, UserId};
use crate::ledger::{BalanceLedger, LedgerError, OperationType};
use crate::money::round_currency;
use crate::resolver::{RecipientDirectory, ResolveError};
use crate::status::{BillStatus, TransactionStatus};
use crate::store::{
    AutomaticBill, BillPaymentRecord, PendingTransfer, StoreError, TransferPatch, TransferRecord,
    TransferStore, check_transition,
};
use crate::transfer::state::TransferState;

/// Failure of one HTTP exchange
#[derive(Debug)]
enum CallError {
    Timeout(String),
    /// Non-2xx answer: status and PostgREST `message` (or raw body)
    Status(StatusCode, String),
    Transport(String),
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallError::Timeout(msg) => write!(f, "timeout: {}", msg),
            CallError::Status(status, msg) => write!(f, "HTTP {}: {}", status, msg),
            CallError::Transport(msg) => write!(f, "{}", msg),
        }
    }
}

impl From<reqwest::Error> for CallError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CallError::Timeout(e.to_string())
        } else {
            CallError::Transport(e.to_string())
        }
    }
}

impl From<CallError> for StoreError {
    fn from(e: CallError) -> Self {
        match e {
            CallError::Status(StatusCode::CONFLICT, msg) => StoreError::Duplicate(msg),
            other => StoreError::Remote(other.to_string()),
        }
    }
}

#[derive(Deserialize)]
struct PostgrestError {
    message: Option<String>,
}

/// `transfers` row as stored (state as SMALLINT)
#[derive(Deserialize)]
struct TransferRow {
    id: TransferId,
    idempotency_key: Option<String>,
    sender_id: UserId,
    recipient_id: Option<UserId>,
    recipient_identifier: String,
    amount: Decimal,
    fee: Decimal,
    platform_commission: Decimal,
    currency: String,
    status: TransactionStatus,
    state: i16,
    claim_code: Option<String>,
    error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TransferRow> for TransferRecord {
    type Error = StoreError;

    fn try_from(row: TransferRow) -> Result<Self, Self::Error> {
        let state = TransferState::from_id(row.state)
            .ok_or_else(|| StoreError::Remote(format!("Invalid state ID: {}", row.state)))?;
        Ok(TransferRecord {
            id: row.id,
            idempotency_key: row.idempotency_key,
            sender_id: row.sender_id,
            recipient_id: row.recipient_id,
            recipient_identifier: row.recipient_identifier,
            amount: row.amount,
            fee: row.fee,
            platform_commission: row.platform_commission,
            currency: row.currency,
            status: row.status,
            state,
            claim_code: row.claim_code,
            error: row.error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub struct RestBackend {
    client: Client,
    base_url: String,
    service_role_key: String,
}

impl RestBackend {
    pub fn new(credentials: SupabaseCredentials, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: format!("{}/rest/v1", credentials.url.trim_end_matches('/')),
            service_role_key: credentials.service_role_key,
        })
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
    }

    fn table(&self, table: &str) -> String {
        format!("{}/{}", self.base_url, table)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, CallError> {
        let response = self.authed(builder).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<PostgrestError>(&body)
            .ok()
            .and_then(|e| e.message)
            .unwrap_or(body);
        Err(CallError::Status(status, message))
    }

    async fn rpc<T: DeserializeOwned>(&self, name: &str, args: Value) -> Result<T, CallError> {
        let url = format!("{}/rpc/{}", self.base_url, name);
        let response = self.send(self.client.post(url).json(&args)).await?;
        Ok(response.json().await?)
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, String)],
    ) -> Result<Vec<T>, CallError> {
        let response = self
            .send(
                self.client
                    .get(self.table(table))
                    .query(&[("select", "*")])
                    .query(filters),
            )
            .await?;
        Ok(response.json().await?)
    }

    async fn insert(&self, table: &str, row: Value) -> Result<(), CallError> {
        self.send(
            self.client
                .post(self.table(table))
                .header("Prefer", "return=minimal")
                .json(&row),
        )
        .await?;
        Ok(())
    }

    /// PATCH rows matching `filters`; returns how many rows changed.
    async fn update(
        &self,
        table: &str,
        filters: &[(&str, String)],
        changes: Value,
    ) -> Result<usize, CallError> {
        let response = self
            .send(
                self.client
                    .patch(self.table(table))
                    .query(filters)
                    .header("Prefer", "return=representation")
                    .json(&changes),
            )
            .await?;
        let rows: Vec<Value> = response.json().await?;
        Ok(rows.len())
    }

    async fn cas_miss(&self, table: &str, key_column: &str, key: String) -> StoreError {
        match self
            .select::<Value>(table, &[(key_column, format!("eq.{}", key))])
            .await
        {
            Ok(rows) if rows.is_empty() => StoreError::NotFound(key),
            Ok(rows) => {
                let status = rows[0]["status"].as_str().unwrap_or("?").to_string();
                StoreError::Conflict(format!("{} {} is {}", table, key, status))
            }
            Err(e) => e.into(),
        }
    }
}

#[async_trait]
impl BalanceLedger for RestBackend {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn balance(&self, user_id: UserId) -> Result<Decimal, LedgerError> {
        #[derive(Deserialize)]
        struct BalanceRow {
            balance: Decimal,
        }

        let rows: Vec<BalanceRow> = self
            .select("profiles", &[("id", format!("eq.{}", user_id))])
            .await
            .map_err(|e| match e {
                CallError::Timeout(msg) => LedgerError::Timeout(msg),
                other => LedgerError::Remote(other.to_string()),
            })?;
        rows.first()
            .map(|r| r.balance)
            .ok_or(LedgerError::NotFound(user_id))
    }

    async fn adjust_balance(
        &self,
        user_id: UserId,
        delta: Decimal,
        operation_type: OperationType,
        performed_by: UserId,
    ) -> Result<Decimal, LedgerError> {
        if delta.is_zero() {
            return Err(LedgerError::InvalidDelta);
        }

        let args = json!({
            "target_user_id": user_id,
            "amount": delta,
            "operation_type": operation_type.as_str(),
            "performed_by": performed_by,
        });
        match self.rpc::<Decimal>("secure_increment_balance", args).await {
            Ok(balance) => Ok(round_currency(balance)),
            Err(CallError::Timeout(msg)) => Err(LedgerError::Timeout(msg)),
            Err(CallError::Status(_, msg)) if msg.to_ascii_lowercase().contains("insufficient") => {
                Err(LedgerError::InsufficientFunds {
                    available: None,
                    requested: -delta,
                })
            }
            Err(CallError::Status(_, msg)) if msg.to_ascii_lowercase().contains("not found") => {
                Err(LedgerError::NotFound(user_id))
            }
            Err(e) => Err(LedgerError::Remote(e.to_string())),
        }
    }
}

#[async_trait]
impl RecipientDirectory for RestBackend {
    async fn find_recipient(&self, search_term: &str) -> Result<Vec<Account>, ResolveError> {
        self.rpc("find_recipient", json!({ "search_term": search_term }))
            .await
            .map_err(|e| match e {
                CallError::Timeout(msg) => ResolveError::Timeout(msg),
                other => ResolveError::Remote(other.to_string()),
            })
    }
}

fn transfer_json(record: &TransferRecord) -> Value {
    json!({
        "id": record.id,
        "idempotency_key": record.idempotency_key,
        "sender_id": record.sender_id,
        "recipient_id": record.recipient_id,
        "recipient_identifier": record.recipient_identifier,
        "amount": record.amount,
        "fee": record.fee,
        "platform_commission": record.platform_commission,
        "currency": record.currency,
        "status": record.status,
        "state": record.state.id(),
        "claim_code": record.claim_code,
        "error": record.error,
        "created_at": record.created_at,
        "updated_at": record.updated_at,
    })
}

#[async_trait]
impl TransferStore for RestBackend {
    async fn insert_transfer(&self, record: &TransferRecord) -> Result<(), StoreError> {
        Ok(self.insert("transfers", transfer_json(record)).await?)
    }

    async fn get_transfer(&self, id: TransferId) -> Result<Option<TransferRecord>, StoreError> {
        let rows: Vec<TransferRow> = self
            .select("transfers", &[("id", format!("eq.{}", id))])
            .await?;
        rows.into_iter().next().map(TryInto::try_into).transpose()
    }

    async fn find_transfer_by_key(
        &self,
        idempotency_key: &str,
    ) -> Result<Option<TransferRecord>, StoreError> {
        let rows: Vec<TransferRow> = self
            .select(
                "transfers",
                &[("idempotency_key", format!("eq.{}", idempotency_key))],
            )
            .await?;
        rows.into_iter().next().map(TryInto::try_into).transpose()
    }

    async fn transition_transfer(
        &self,
        id: TransferId,
        from: TransactionStatus,
        to: TransactionStatus,
        patch: TransferPatch,
    ) -> Result<(), StoreError> {
        if from != to {
            check_transition(from, to)?;
        }

        let mut changes = json!({ "status": to, "updated_at": Utc::now() });
        if let Some(recipient_id) = patch.recipient_id {
            changes["recipient_id"] = json!(recipient_id);
        }
        if let Some(state) = patch.state {
            changes["state"] = json!(state.id());
        }
        if let Some(code) = patch.claim_code {
            changes["claim_code"] = json!(code);
        }
        if let Some(error) = patch.error {
            changes["error"] = json!(error);
        }

        let filters = [
            ("id", format!("eq.{}", id)),
            ("status", format!("eq.{}", from)),
        ];
        if self.update("transfers", &filters, changes).await? == 0 {
            return Err(self.cas_miss("transfers", "id", id.to_string()).await);
        }
        Ok(())
    }

    async fn claim_code_exists(&self, claim_code: &str) -> Result<bool, StoreError> {
        let rows: Vec<Value> = self
            .select(
                "pending_transfers",
                &[("claim_code", format!("eq.{}", claim_code))],
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn insert_pending(&self, pending: &PendingTransfer) -> Result<(), StoreError> {
        let row = serde_json::to_value(pending).map_err(|e| StoreError::Remote(e.to_string()))?;
        Ok(self.insert("pending_transfers", row).await?)
    }

    async fn get_pending_by_code(
        &self,
        claim_code: &str,
    ) -> Result<Option<PendingTransfer>, StoreError> {
        let rows: Vec<PendingTransfer> = self
            .select(
                "pending_transfers",
                &[("claim_code", format!("eq.{}", claim_code))],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn transition_pending(
        &self,
        transfer_id: TransferId,
        from: TransactionStatus,
        to: TransactionStatus,
        claimed_by: Option<UserId>,
    ) -> Result<(), StoreError> {
        check_transition(from, to)?;

        let mut changes = json!({ "status": to, "updated_at": Utc::now() });
        if let Some(claimant) = claimed_by {
            changes["claimed_by"] = json!(claimant);
        }
        let filters = [
            ("transfer_id", format!("eq.{}", transfer_id)),
            ("status", format!("eq.{}", from)),
        ];
        if self.update("pending_transfers", &filters, changes).await? == 0 {
            return Err(self
                .cas_miss("pending_transfers", "transfer_id", transfer_id.to_string())
                .await);
        }
        Ok(())
    }

    async fn get_bill(&self, bill_id: Uuid) -> Result<Option<AutomaticBill>, StoreError> {
        let rows: Vec<AutomaticBill> = self
            .select("automatic_bills", &[("id", format!("eq.{}", bill_id))])
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn mark_bill_paid(
        &self,
        bill_id: Uuid,
        paid_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let filters = [
            ("id", format!("eq.{}", bill_id)),
            ("status", "neq.paid".to_string()),
        ];
        let changes = json!({ "status": "paid", "last_payment_date": paid_at });
        if self.update("automatic_bills", &filters, changes).await? == 0 {
            return Err(match self.get_bill(bill_id).await? {
                Some(_) => StoreError::Conflict(format!("bill {} already paid", bill_id)),
                None => StoreError::NotFound(bill_id.to_string()),
            });
        }
        Ok(())
    }

    async fn reopen_bill(
        &self,
        bill_id: Uuid,
        status: BillStatus,
        last_payment_date: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let filters = [
            ("id", format!("eq.{}", bill_id)),
            ("status", "eq.paid".to_string()),
        ];
        let changes = json!({ "status": status, "last_payment_date": last_payment_date });
        if self.update("automatic_bills", &filters, changes).await? == 0 {
            return Err(self
                .cas_miss("automatic_bills", "id", bill_id.to_string())
                .await);
        }
        Ok(())
    }

    async fn insert_bill_history(&self, record: &BillPaymentRecord) -> Result<(), StoreError> {
        let row = serde_json::to_value(record).map_err(|e| StoreError::Remote(e.to_string()))?;
        Ok(self.insert("bill_payment_history", row).await?)
    }
}
