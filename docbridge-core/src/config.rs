//! Bridge configuration.
//!
//! The bridge needs a store connection URL and a database name. Both are required and
//! have no default; a missing value is fatal before any operation can run. They are
//! usually read from the environment (`MONGODB_URL`, `MONGODB_NAME`) but can also be
//! deserialized from a host configuration file or built directly.

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, BridgeResult};

/// Default prefix of the configuration environment variables.
pub const DEFAULT_ENV_PREFIX: &str = "MONGODB";

/// Placeholder some hosts report for an unset variable.
const UNSET_SENTINEL: &str = "unknown";

/// Store connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Connection string of the backing store.
    pub url: String,
    /// Name of the database every collection lives in.
    pub database: String,
}

impl BridgeConfig {
    pub fn new(url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            database: database.into(),
        }
    }

    /// Reads `MONGODB_URL` and `MONGODB_NAME` from the process environment.
    pub fn from_env() -> BridgeResult<Self> {
        Self::from_env_with_prefix(DEFAULT_ENV_PREFIX)
    }

    /// Reads `{prefix}_URL` and `{prefix}_NAME` from the process environment.
    pub fn from_env_with_prefix(prefix: &str) -> BridgeResult<Self> {
        Self::from_lookup(prefix, |key| std::env::var(key).ok())
    }

    /// Reads `{prefix}_URL` and `{prefix}_NAME` through `lookup`.
    pub fn from_lookup<F>(prefix: &str, lookup: F) -> BridgeResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |suffix: &str, what: &str| {
            let key = format!("{prefix}_{suffix}");
            lookup(&key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty() && value != UNSET_SENTINEL)
                .ok_or_else(|| BridgeError::Configuration(format!("{what} is not specified ({key})")))
        };

        Ok(Self {
            url: required("URL", "Database URL")?,
            database: required("NAME", "Database name")?,
        })
    }

    /// Checks that both settings are present.
    pub fn validate(&self) -> BridgeResult<()> {
        if self.url.trim().is_empty() {
            return Err(BridgeError::Configuration("Database URL is not specified".into()));
        }
        if self.database.trim().is_empty() {
            return Err(BridgeError::Configuration("Database name is not specified".into()));
        }

        Ok(())
    }
}
