use std::path::PathBuf;
use std::str::FromStr;

use crate::engine::{EngineOptions, HolidayScope};

/// Server settings, read once from `AGENDA_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub port: u16,
    pub bind: String,
    pub data_dir: PathBuf,
    pub password: String,
    pub max_connections: usize,
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
    pub tls_cert: Option<String>,
    pub tls_key: Option<String>,
    pub holiday_scope: HolidayScope,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5433,
            bind: "0.0.0.0".into(),
            data_dir: PathBuf::from("./data"),
            password: "agenda".into(),
            max_connections: 256,
            compact_threshold: 1000,
            metrics_port: None,
            tls_cert: None,
            tls_key: None,
            holiday_scope: HolidayScope::Tenant,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset keys take their defaults; set but
    /// unparsable ones are errors rather than silently ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            port: parsed(&lookup, "AGENDA_PORT")?.unwrap_or(defaults.port),
            bind: lookup("AGENDA_BIND").unwrap_or(defaults.bind),
            data_dir: lookup("AGENDA_DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            password: lookup("AGENDA_PASSWORD").unwrap_or(defaults.password),
            max_connections: parsed(&lookup, "AGENDA_MAX_CONNECTIONS")?.unwrap_or(defaults.max_connections),
            compact_threshold: parsed(&lookup, "AGENDA_COMPACT_THRESHOLD")?.unwrap_or(defaults.compact_threshold),
            metrics_port: parsed(&lookup, "AGENDA_METRICS_PORT")?,
            tls_cert: lookup("AGENDA_TLS_CERT"),
            tls_key: lookup("AGENDA_TLS_KEY"),
            holiday_scope: parsed(&lookup, "AGENDA_HOLIDAY_SCOPE")?.unwrap_or(defaults.holiday_scope),
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            holiday_scope: self.holiday_scope,
        }
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        })
}

#[derive(Debug)]
pub enum ConfigError {
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Invalid { key, value, reason } => {
                write!(f, "invalid {key}={value:?}: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
