//! Environment-driven server configuration.
//!
//! | Variable | Default |
//! |---|---|
//! | `BUZZLINE_BIND` | `0.0.0.0:8080` |
//! | `BUZZLINE_HOST_PIN` | random six-digit PIN, logged at startup |
//! | `BUZZLINE_CATALOG` | none (empty catalog) |
//! | `BUZZLINE_RATE_LIMIT` | `10` events per second |
//! | `BUZZLINE_IDLE_TIMEOUT_SECS` | `60` |

use std::path::PathBuf;
use std::str::FromStr;

use buzzline_session::SessionConfig;
use rand::Rng;

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    /// Credential hosts present in `hello`.
    pub host_pin: String,
    /// `true` when no PIN was configured and one was generated.
    pub pin_generated: bool,
    /// JSON question catalog loaded at startup.
    pub catalog_path: Option<PathBuf>,
    pub session: SessionConfig,
}

impl ServerConfig {
    /// Reads the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`. Blank values count as unset;
    /// unparsable numbers fall back to the default with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        let bind = var("BUZZLINE_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());

        let (host_pin, pin_generated) = match var("BUZZLINE_HOST_PIN") {
            Some(pin) => (pin, false),
            None => (generate_pin(&mut rand::rng()), true),
        };

        let defaults = SessionConfig::default();
        let rate = parse_or("BUZZLINE_RATE_LIMIT", var("BUZZLINE_RATE_LIMIT"), defaults.rate_limit_per_sec);
        let idle = parse_or(
            "BUZZLINE_IDLE_TIMEOUT_SECS",
            var("BUZZLINE_IDLE_TIMEOUT_SECS"),
            defaults.idle_timeout_secs,
        );

        Self {
            bind,
            host_pin,
            pin_generated,
            catalog_path: var("BUZZLINE_CATALOG").map(PathBuf::from),
            session: SessionConfig {
                rate_limit_per_sec: rate.max(1),
                rate_limit_burst: rate.max(1),
                idle_timeout_secs: idle.max(1),
                ..defaults
            },
        }
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(key: &str, value: Option<String>, default: T) -> T {
    match value {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, %default, "invalid number, using default");
            default
        }),
    }
}

fn generate_pin<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("{:06}", rng.random_range(0..1_000_000u32))
}
