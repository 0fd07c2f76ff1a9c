use std::fs;

use anyhow::Context;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::fee::FeeSchedule;
use crate::transfer::claim::DEFAULT_MAX_ATTEMPTS;

pub const ENV_SUPABASE_URL: &str = "SUPABASE_URL";
pub const ENV_SUPABASE_SERVICE_ROLE_KEY: &str = "SUPABASE_SERVICE_ROLE_KEY";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub fees: FeeSchedule,
    #[serde(default)]
    pub claims: ClaimConfig,
    /// Currency recorded on transfers
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Country used to read phone numbers when a request names none
    #[serde(default = "default_country")]
    pub default_country: String,
}

fn default_currency() -> String {
    "XAF".to_string()
}

fn default_country() -> String {
    "CM".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Memory,
    Rest,
    Postgres,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Per remote call
    pub request_timeout_ms: u64,
    /// Overridden by `DATABASE_URL`
    #[serde(default)]
    pub postgres_url: Option<String>,
    /// Accounts loaded into the memory backend at startup
    #[serde(default)]
    pub seed_accounts: Vec<SeedAccount>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Memory,
            request_timeout_ms: 10_000,
            postgres_url: None,
            seed_accounts: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SeedAccount {
    #[serde(default)]
    pub id: Option<uuid::Uuid>,
    pub full_name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    pub balance: Decimal,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClaimConfig {
    /// Claim-code regenerations on collision before giving up
    pub max_attempts: u32,
}

impl Default for ClaimConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Hosted platform credentials, from the environment only
#[derive(Clone)]
pub struct SupabaseCredentials {
    pub url: String,
    pub service_role_key: String,
}

impl std::fmt::Debug for SupabaseCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseCredentials")
            .field("url", &self.url)
            .field("service_role_key", &"<redacted>")
            .finish()
    }
}

impl SupabaseCredentials {
    /// `None` unless both variables are set and non-empty.
    pub fn from_env() -> Option<Self> {
        let read = |name| std::env::var(name).ok().filter(|v: &String| !v.trim().is_empty());
        Some(Self {
            url: read(ENV_SUPABASE_URL)?,
            service_role_key: read(ENV_SUPABASE_SERVICE_ROLE_KEY)?,
        })
    }
}

impl AppConfig {
    pub fn load(env: &str) -> anyhow::Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse {}", config_path))
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// `DATABASE_URL` wins over the configured URL
    pub fn postgres_url(&self) -> Option<String> {
        std::env::var(ENV_DATABASE_URL)
            .ok()
            .or_else(|| self.backend.postgres_url.clone())
    }
}
