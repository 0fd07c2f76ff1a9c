//! Backends
//!
//! One implementation per deployment of the three seams
//! ([`BalanceLedger`], [`RecipientDirectory`], [`TransferStore`]).

pub mod memory;
pub mod postgres;
pub mod rest;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use uuid::Uuid;

use crate::config::{AppConfig, BackendKind, SupabaseCredentials};
use crate::core_types::Account;
use crate::ledger::BalanceLedger;
use crate::resolver::RecipientDirectory;
use crate::store::TransferStore;

use memory::MemoryBackend;
use postgres::{Database, PostgresBackend};
use rest::RestBackend;

/// The three seams, usually served by one object
#[derive(Clone)]
pub struct Backend {
    pub kind: BackendKind,
    pub ledger: Arc<dyn BalanceLedger>,
    pub directory: Arc<dyn RecipientDirectory>,
    pub store: Arc<dyn TransferStore>,
}

impl Backend {
    pub fn from_shared<B>(kind: BackendKind, backend: Arc<B>) -> Self
    where
        B: BalanceLedger + RecipientDirectory + TransferStore + 'static,
    {
        Self {
            kind,
            ledger: backend.clone(),
            directory: backend.clone(),
            store: backend,
        }
    }

    pub fn memory(backend: Arc<MemoryBackend>) -> Self {
        Self::from_shared(BackendKind::Memory, backend)
    }
}

/// Build the configured backend.
///
/// `Ok(None)` when the rest backend lacks its credentials: the service
/// still starts and answers "Server configuration error".
pub async fn connect(config: &AppConfig) -> anyhow::Result<Option<Backend>> {
    let timeout = Duration::from_millis(config.backend.request_timeout_ms);

    match config.backend.kind {
        BackendKind::Memory => {
            let memory = Arc::new(MemoryBackend::new());
            for seed in &config.backend.seed_accounts {
                memory.insert_account(
                    Account {
                        id: seed.id.unwrap_or_else(Uuid::new_v4),
                        full_name: seed.full_name.clone(),
                        phone: seed.phone.clone(),
                        email: seed.email.clone(),
                        country: seed.country.clone(),
                    },
                    seed.balance,
                );
            }
            info!(accounts = config.backend.seed_accounts.len(), "Memory backend ready");
            Ok(Some(Backend::memory(memory)))
        }
        BackendKind::Rest => {
            let Some(credentials) = SupabaseCredentials::from_env() else {
                tracing::error!("SUPABASE_URL / SUPABASE_SERVICE_ROLE_KEY not set");
                return Ok(None);
            };
            info!(url = %credentials.url, "REST backend ready");
            let rest = RestBackend::new(credentials, timeout).context("Failed to build HTTP client")?;
            Ok(Some(Backend::from_shared(BackendKind::Rest, Arc::new(rest))))
        }
        BackendKind::Postgres => {
            let url = config
                .postgres_url()
                .context("postgres backend requires DATABASE_URL or backend.postgres_url")?;
            let db = Database::connect(&url)
                .await
                .context("Failed to connect to PostgreSQL")?;
            Ok(Some(Backend::from_shared(
                BackendKind::Postgres,
                Arc::new(PostgresBackend::new(db, timeout)),
            )))
        }
    }
}
