use std::time::Duration;

use anyhow::{Context, Result};
use tracing::warn;

/// Drain interval used when `DRAIN_INTERVAL_MINUTES` is unset or unusable.
pub const DEFAULT_DRAIN_INTERVAL_MINUTES: u64 = 5;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Upper bound on pooled Postgres connections.
    pub db_max_connections: u32,
    /// Minutes between the end of one drain run and the start of the next.
    pub drain_interval_minutes: u64,
    /// Where malformed staged payloads are written before their key is deleted.
    pub dead_letter_dir: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            db_max_connections: optional("DB_MAX_CONNECTIONS", "10")
                .parse()
                .context("DB_MAX_CONNECTIONS must be a positive integer")?,
            drain_interval_minutes: parse_interval_minutes(
                std::env::var("DRAIN_INTERVAL_MINUTES").ok().as_deref(),
            ),
            dead_letter_dir: optional("DEAD_LETTER_DIR", "dead_letter"),
        })
    }

    pub fn drain_interval(&self) -> Duration {
        Duration::from_secs(self.drain_interval_minutes * 60)
    }
}

/// Unset, non-numeric, and zero values fall back to the default instead of
/// failing startup.
fn parse_interval_minutes(raw: Option<&str>) -> u64 {
    let Some(raw) = raw else {
        return DEFAULT_DRAIN_INTERVAL_MINUTES;
    };
    match raw.trim().parse::<u64>() {
        Ok(minutes) if minutes > 0 => minutes,
        _ => {
            warn!(
                value = %raw,
                default = DEFAULT_DRAIN_INTERVAL_MINUTES,
                "DRAIN_INTERVAL_MINUTES is not a positive integer; using default"
            );
            DEFAULT_DRAIN_INTERVAL_MINUTES
        }
    }
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing required env var: {key}"))
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}
