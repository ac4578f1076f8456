//! Server configuration loaded from the environment.

use std::env;

use thiserror::Error;
use tracing::{info, Level};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

const BIND_ADDR_KEY: &str = "RECORDS_BIND_ADDR";
const LOG_LEVEL_KEY: &str = "RECORDS_LOG_LEVEL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// `RECORDS_BIND_ADDR`
    pub bind_addr: String,
    /// `RECORDS_LOG_LEVEL`
    pub log_level: Level,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            log_level: Level::INFO,
        }
    }
}

impl ServerConfig {
    /// Load from the environment. Also returns the keys that were not set
    /// and fell back to defaults, so they can be logged once tracing is up.
    pub fn load() -> Result<(Self, Vec<&'static str>), ConfigError> {
        Self::resolve(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Missing keys fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Self::resolve(lookup).map(|(config, _)| config)
    }

    /// Like [`from_lookup`](Self::from_lookup), plus the keys that were defaulted.
    pub fn resolve(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(Self, Vec<&'static str>), ConfigError> {
        let defaults = Self::default();
        let mut defaulted = Vec::new();

        let bind_addr = match lookup(BIND_ADDR_KEY) {
            Some(addr) if !addr.trim().is_empty() => addr.trim().to_string(),
            Some(addr) => {
                return Err(ConfigError::Invalid {
                    key: BIND_ADDR_KEY,
                    value: addr,
                    reason: "must not be empty".into(),
                })
            }
            None => {
                defaulted.push(BIND_ADDR_KEY);
                defaults.bind_addr
            }
        };

        let log_level = match lookup(LOG_LEVEL_KEY) {
            Some(level) => level.trim().parse::<Level>().map_err(|e| {
                ConfigError::Invalid {
                    key: LOG_LEVEL_KEY,
                    value: level.clone(),
                    reason: e.to_string(),
                }
            })?,
            None => {
                defaulted.push(LOG_LEVEL_KEY);
                defaults.log_level
            }
        };

        Ok((
            Self {
                bind_addr,
                log_level,
            },
            defaulted,
        ))
    }

    /// Log each defaulted key with the value it fell back to.
    pub fn log_defaults(&self, defaulted: &[&'static str]) {
        for key in defaulted {
            match *key {
                BIND_ADDR_KEY => info!("{key} not set, using default: {}", self.bind_addr),
                LOG_LEVEL_KEY => info!("{key} not set, using default: {}", self.log_level),
                _ => info!("{key} not set, using default"),
            }
        }
    }
}
