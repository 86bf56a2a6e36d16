//! Environment configuration
//!
//! Loaded once at startup and treated as immutable afterwards. Values
//! come from `LEDGER_*` variables; tenant and lake hostname are required.

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Configuration {
    /// Tenant this ledger instance serves
    pub tenant: String,

    /// Root of the journal storage; the tenant directory lives below it
    pub root_storage: PathBuf,

    /// Endpoint of the actor transport
    pub lake_hostname: String,

    /// Cadence of the transaction integrity scan
    pub transaction_integrity_scan_interval: Duration,

    /// Log filter level for the tracing subscriber
    pub log_level: String,
}

impl Configuration {
    pub fn from_env() -> Result<Self, ConfigError> {
        let tenant = get_env_string("LEDGER_TENANT", "");
        let storage = get_env_string("LEDGER_STORAGE", "/data");
        let lake_hostname = get_env_string("LEDGER_LAKE_HOSTNAME", "");
        let scan_interval = get_env_duration(
            "LEDGER_TRANSACTION_INTEGRITY_SCANINTERVAL",
            Duration::from_secs(60),
        )?;
        let log_level = get_env_string("LEDGER_LOG_LEVEL", "DEBUG");

        if tenant.is_empty() {
            return Err(ConfigError::MissingValue("LEDGER_TENANT"));
        }
        if lake_hostname.is_empty() {
            return Err(ConfigError::MissingValue("LEDGER_LAKE_HOSTNAME"));
        }
        if storage.is_empty() {
            return Err(ConfigError::MissingValue("LEDGER_STORAGE"));
        }

        Ok(Configuration {
            tenant,
            root_storage: PathBuf::from(storage),
            lake_hostname,
            transaction_integrity_scan_interval: scan_interval,
            log_level,
        })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required parameter {0}")]
    MissingValue(&'static str),

    #[error("invalid value of variable {key}: {value}")]
    InvalidDuration { key: &'static str, value: String },
}

fn get_env_string(key: &str, fallback: &str) -> String {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

fn get_env_duration(key: &'static str, fallback: Duration) -> Result<Duration, ConfigError> {
    let value = get_env_string(key, "");
    if value.is_empty() {
        return Ok(fallback);
    }
    parse_duration(&value).ok_or(ConfigError::InvalidDuration { key, value })
}

/// Parse `30s`, `1m`, `2h`, `500ms` or a plain number of seconds
fn parse_duration(value: &str) -> Option<Duration> {
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);
    let count: u64 = digits.parse().ok()?;
    match unit {
        "" | "s" => Some(Duration::from_secs(count)),
        "m" => Some(Duration::from_secs(count * 60)),
        "h" => Some(Duration::from_secs(count * 3600)),
        "ms" => Some(Duration::from_millis(count)),
        _ => None,
    }
}
