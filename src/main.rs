//! Momo Rails gateway
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌─────────────┐    ┌──────────┐
//! │  Config  │───▶│ Backend  │───▶│ Coordinator │───▶│ Gateway  │
//! │  (YAML)  │    │(mem/rest/│    │ Claims/Bills│    │  (HTTP)  │
//! └──────────┘    │   pg)    │    └─────────────┘    └──────────┘
//!                 └──────────┘
//! ```
//!
//! Usage: `momo_rails [--env dev] [--port 8080]`

use std::sync::Arc;

use momo_rails::backend;
use momo_rails::config::AppConfig;
use momo_rails::gateway::{self, state::AppState};

fn get_arg(names: &[&str]) -> Option<String> {
    let args: Vec<String> = std::env::args().collect();
    args.iter()
        .position(|a| names.contains(&a.as_str()))
        .and_then(|i| args.get(i + 1).cloned())
}

fn get_env() -> String {
    get_arg(&["--env", "-e"]).unwrap_or_else(|| "dev".to_string())
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    get_arg(&["--port"]).and_then(|p| p.parse().ok())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let app_config = AppConfig::load(&env)?;
    let _log_guard = momo_rails::logging::init_logging(&app_config);

    tracing::info!(
        version = option_env!("GIT_HASH").unwrap_or("unknown"),
        backend = ?app_config.backend.kind,
        "Starting Momo Rails in {} mode",
        env
    );

    let backend = backend::connect(&app_config).await?;
    if backend.is_none() {
        tracing::warn!("No backend configured: money endpoints will answer 'Server configuration error'");
    }
    let state = Arc::new(AppState::new(backend, &app_config));

    let port = get_port_override().unwrap_or(app_config.gateway.port);
    gateway::run_server(&app_config.gateway.host, port, state).await
}
