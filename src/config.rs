use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "clinic-ledger";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const ENV_DB: &str = "CLINIC_LEDGER_DB";
pub const ENV_BIND: &str = "CLINIC_LEDGER_BIND";
pub const ENV_BUSY_TIMEOUT_MS: &str = "CLINIC_LEDGER_BUSY_TIMEOUT_MS";
pub const ENV_SLOT_STEP_MINUTES: &str = "CLINIC_LEDGER_SLOT_STEP_MINUTES";

const DEFAULT_BIND: &str = "127.0.0.1:8640";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_SLOT_STEP_MINUTES: i64 = 15;

/// Get the application data directory: `~/.clinic-ledger/`
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(format!(".{APP_NAME}"))
}

/// Default database file inside the data directory
pub fn default_db_path() -> PathBuf {
    app_data_dir().join("ledger.db")
}

/// Log filter used when `RUST_LOG` is unset
pub fn default_log_filter() -> &'static str {
    "clinic_ledger=info,tower_http=info"
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Runtime settings of the ledger service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub bind_addr: SocketAddr,
    /// How long a writer waits on the storage lock before `Busy`.
    pub busy_timeout: Duration,
    /// Granularity of free-slot suggestions.
    pub slot_step_minutes: i64,
}

impl CoreConfig {
    /// Settings for a database at `db_path`, everything else defaulted.
    pub fn with_db_path(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8640)),
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
            slot_step_minutes: DEFAULT_SLOT_STEP_MINUTES,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let db_path = lookup(ENV_DB).map(PathBuf::from).unwrap_or_else(default_db_path);

        let bind = lookup(ENV_BIND).unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind_addr = bind
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::Invalid { key: ENV_BIND, value: bind.clone() })?;

        let busy_timeout_ms = parse_or(&lookup, ENV_BUSY_TIMEOUT_MS, DEFAULT_BUSY_TIMEOUT_MS)?;
        let slot_step_minutes = parse_or(&lookup, ENV_SLOT_STEP_MINUTES, DEFAULT_SLOT_STEP_MINUTES)?;
        if !(1..=1440).contains(&slot_step_minutes) {
            return Err(ConfigError::Invalid {
                key: ENV_SLOT_STEP_MINUTES,
                value: slot_step_minutes.to_string(),
            });
        }

        Ok(Self {
            db_path,
            bind_addr,
            busy_timeout: Duration::from_millis(busy_timeout_ms),
            slot_step_minutes,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}
