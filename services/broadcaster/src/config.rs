//! Broadcaster configuration.
//!
//! Environment variables are the sole config source. Everything except
//! `DATABASE_URL` has a default:
//!
//! | Variable              | Default                      |
//! |-----------------------|------------------------------|
//! | `BIND_ADDR`           | `0.0.0.0:$PORT` or `:3001`   |
//! | `POLL_INTERVAL_SECS`  | `5`                          |
//! | `BOOTSTRAP_WINDOW`    | `100`                        |
//! | `DB_RETRY_DELAY_SECS` | `5`                          |
//! | `QUERY_TIMEOUT_SECS`  | `30`                         |
//! | `DB_MAX_CONNECTIONS`  | `10`                         |
//! | `RUN_MIGRATIONS`      | `true`                       |
//! | `STATIC_DIR`          | unset (no static assets)     |
//! | `LOG_LEVEL`           | `info`                       |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use sw_protocol::DEFAULT_BOOTSTRAP_WINDOW;

const DEFAULT_PORT: u16 = 3001;

#[derive(Debug, Clone)]
pub struct BroadcasterConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub poll_interval: Duration,
    pub bootstrap_window: usize,
    pub db_retry_delay: Duration,
    pub query_timeout: Duration,
    pub db_max_connections: u32,
    pub run_migrations: bool,
    pub static_dir: Option<PathBuf>,
    pub log_level: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name}={value:?} is invalid: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

impl BroadcasterConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from any variable lookup; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let bind_addr = match get("BIND_ADDR") {
            Some(addr) => addr,
            None => {
                let port: u16 = parse_or("PORT", get("PORT"), DEFAULT_PORT)?;
                format!("0.0.0.0:{port}")
            }
        };

        Ok(Self {
            database_url,
            bind_addr,
            poll_interval: secs("POLL_INTERVAL_SECS", get("POLL_INTERVAL_SECS"), 5)?,
            bootstrap_window: nonzero(
                "BOOTSTRAP_WINDOW",
                get("BOOTSTRAP_WINDOW"),
                DEFAULT_BOOTSTRAP_WINDOW,
            )?,
            db_retry_delay: secs("DB_RETRY_DELAY_SECS", get("DB_RETRY_DELAY_SECS"), 5)?,
            query_timeout: secs("QUERY_TIMEOUT_SECS", get("QUERY_TIMEOUT_SECS"), 30)?,
            db_max_connections: nonzero("DB_MAX_CONNECTIONS", get("DB_MAX_CONNECTIONS"), 10)?,
            run_migrations: flag("RUN_MIGRATIONS", get("RUN_MIGRATIONS"), true)?,
            static_dir: get("STATIC_DIR").map(PathBuf::from),
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_owned()),
        })
    }
}

fn parse_or<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value,
        }),
    }
}

fn nonzero<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialEq + Default,
    T::Err: std::fmt::Display,
{
    let parsed = parse_or(name, raw, default)?;
    if parsed == T::default() {
        return Err(ConfigError::Invalid {
            name,
            value: "0".to_owned(),
            reason: "must be greater than zero".to_owned(),
        });
    }
    Ok(parsed)
}

fn secs(name: &'static str, raw: Option<String>, default: u64) -> Result<Duration, ConfigError> {
    nonzero(name, raw, default).map(Duration::from_secs)
}

fn flag(name: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(value) = raw else {
        return Ok(default);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value,
            reason: "expected true or false".to_owned(),
        }),
    }
}
