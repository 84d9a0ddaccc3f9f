//! Application configuration.
//!
//! Defaults are compiled in; the server reads overrides from the
//! environment (`main` loads a `.env` file into it first, if present).
//!
//! | Variable | Default |
//! |----------|---------|
//! | `REESTR_PORT` | 3000 |
//! | `REESTR_MAX_UPLOAD_MB` | 50 |
//! | `REESTR_SESSION_TTL_MINUTES` | 60 |
//! | `REESTR_OUTPUT_ENCODING` | windows-1251 |

use chrono::Duration;
use std::env;
use std::str::FromStr;

use crate::api::logs::log_warning;
use crate::export::OutputEncoding;

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 3000;

/// Maximum upload size (in megabytes).
pub const DEFAULT_MAX_UPLOAD_MB: usize = 50;

/// Idle time after which a session is dropped.
pub const DEFAULT_SESSION_TTL_MINUTES: i64 = 60;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub max_upload_bytes: usize,
    pub session_ttl: Duration,
    pub output_encoding: OutputEncoding,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            session_ttl: Duration::minutes(DEFAULT_SESSION_TTL_MINUTES),
            output_encoding: OutputEncoding::default(),
        }
    }
}

impl ServerConfig {
    /// Build configuration from environment variables.
    ///
    /// Unparseable or out-of-range values are reported and replaced by the
    /// default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: env_or("REESTR_PORT", defaults.port),
            max_upload_bytes: upload_limit(env_or("REESTR_MAX_UPLOAD_MB", DEFAULT_MAX_UPLOAD_MB)),
            session_ttl: session_ttl(env_or(
                "REESTR_SESSION_TTL_MINUTES",
                DEFAULT_SESSION_TTL_MINUTES,
            )),
            output_encoding: env_or("REESTR_OUTPUT_ENCODING", defaults.output_encoding),
        }
    }

    /// Override the port (CLI flag).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

/// Megabytes to bytes.
fn upload_limit(megabytes: usize) -> usize {
    megabytes.checked_mul(1024 * 1024).unwrap_or_else(|| {
        log_warning(format!(
            "Ignoring REESTR_MAX_UPLOAD_MB={}: too large",
            megabytes
        ));
        DEFAULT_MAX_UPLOAD_MB * 1024 * 1024
    })
}

/// Positive idle TTL in minutes.
fn session_ttl(minutes: i64) -> Duration {
    Duration::try_minutes(minutes)
        .filter(|ttl| *ttl > Duration::zero())
        .unwrap_or_else(|| {
            log_warning(format!(
                "Ignoring REESTR_SESSION_TTL_MINUTES={}: out of range",
                minutes
            ));
            Duration::minutes(DEFAULT_SESSION_TTL_MINUTES)
        })
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => parse_or(key, &raw, default),
        Err(_) => default,
    }
}

fn parse_or<T: FromStr>(key: &str, raw: &str, default: T) -> T {
    raw.trim().parse().unwrap_or_else(|_| {
        log_warning(format!("Ignoring invalid {}={:?}", key, raw));
        default
    })
}
