//! here/now server binary - composition root.
//!
//! Ties the crates together into a single executable:
//! 1. Parse CLI arguments and initialize tracing
//! 2. Load configuration from TOML, apply env overrides
//! 3. Open the SQLite event log
//! 4. Start the axum API server

use clap::Parser;

use herenow_api::{routes, AppState};
use herenow_core::config::HereNowConfig;
use herenow_storage::Database;

mod cli;
use cli::CliArgs;

/// Expand ~ to the home directory in a path string.
fn resolve_data_dir(data_dir: &str) -> std::path::PathBuf {
    if let Some(rest) = data_dir.strip_prefix("~/") {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        std::path::PathBuf::from(home).join(rest)
    } else {
        std::path::PathBuf::from(data_dir)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config first: the log level may come from it.
    let config_file = args.resolve_config_path();
    let mut config = HereNowConfig::load_or_default(&config_file);
    config.apply_env();

    config.server.port = args.resolve_port(config.server.port);
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    if let Some(level) = args.resolve_log_level() {
        config.general.log_level = level;
    }

    // Tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting here/now v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");
    tracing::info!(domains = ?config.tracking.allowed_domains, "Domain allowlist active");

    // Storage.
    let data_dir = resolve_data_dir(&config.general.data_dir);
    std::fs::create_dir_all(&data_dir)?;

    let db_path = data_dir.join("herenow.db");
    let db = Database::new(&db_path)?;
    tracing::info!(path = %db_path.display(), "SQLite event log opened");

    // API server.
    let state = AppState::new(config, db);
    routes::start_server(state).await?;

    Ok(())
}
