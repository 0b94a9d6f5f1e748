pub mod api; // HTTP facade
pub mod availability; // Availability Calendar
pub mod clock;
pub mod commission; // Commission Ledger
pub mod config;
pub mod core_state; // Transport-agnostic service state
pub mod db;
pub mod directory;
pub mod error;
pub mod fulfillment; // Fulfillment Trigger
pub mod inventory; // Inventory Ledger & Kit Catalog
pub mod locks;
pub mod models;
pub mod scheduling; // Appointment Scheduler

use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub use core_state::CoreState;
pub use error::{ConflictReason, CoreError};

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Ledger unavailable: {0}")]
    Core(#[from] CoreError),
    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Initialize tracing from `RUST_LOG`, falling back to the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}

/// Run the ledger service until Ctrl-C.
pub async fn run() -> Result<(), StartupError> {
    init_tracing();
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = config::CoreConfig::from_env()?;
    let bind_addr = config.bind_addr;
    let core = Arc::new(CoreState::open(config)?);

    let server = api::start_api_server(core, bind_addr).await?;
    tracing::info!(addr = %server.addr, "ledger API listening");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Ctrl-C received, shutting down");
    server.stop().await;
    Ok(())
}
