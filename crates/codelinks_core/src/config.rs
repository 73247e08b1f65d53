//! Core runtime configuration.
//!
//! # Responsibility
//! - Collect database and logging settings from `CODELINKS_*` variables.
//!
//! # Invariants
//! - A missing `CODELINKS_DB_PATH` selects a private in-memory database;
//!   callers that must persist data check `require_persistent`.
//! - Parsing never panics; bad values surface as `ConfigError`.

use crate::db::sqlite::DEFAULT_BUSY_TIMEOUT;
use crate::db::DbLocation;
use crate::logging::default_log_level;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_DB_PATH: &str = "CODELINKS_DB_PATH";
pub const ENV_BUSY_TIMEOUT_MS: &str = "CODELINKS_BUSY_TIMEOUT_MS";
pub const ENV_LOG_LEVEL: &str = "CODELINKS_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "CODELINKS_LOG_DIR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidNumber { key: &'static str, value: String },
    MissingDatabase,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidNumber { key, value } => {
                write!(f, "`{key}` must be a non-negative integer, got `{value}`")
            }
            Self::MissingDatabase => {
                write!(f, "no database configured; pass --db or set `{ENV_DB_PATH}`")
            }
        }
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub database: DbLocation,
    pub busy_timeout: Duration,
    pub log_level: String,
    /// File logging is enabled only when set.
    pub log_dir: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database: DbLocation::shared_memory(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl CoreConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, which returns a variable's value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let value = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };
        let mut config = Self::default();

        if let Some(path) = value(ENV_DB_PATH) {
            config.database = DbLocation::file(path);
        }
        if let Some(raw) = value(ENV_BUSY_TIMEOUT_MS) {
            let millis = raw.parse::<u64>().map_err(|_| ConfigError::InvalidNumber {
                key: ENV_BUSY_TIMEOUT_MS,
                value: raw.clone(),
            })?;
            config.busy_timeout = Duration::from_millis(millis);
        }
        if let Some(level) = value(ENV_LOG_LEVEL) {
            config.log_level = level;
        }
        config.log_dir = value(ENV_LOG_DIR).map(PathBuf::from);

        Ok(config)
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self.database, DbLocation::File(_))
    }

    /// Rejects the in-memory default, whose data vanishes with the process.
    pub fn require_persistent(&self) -> Result<(), ConfigError> {
        if self.is_persistent() {
            Ok(())
        } else {
            Err(ConfigError::MissingDatabase)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig, ENV_BUSY_TIMEOUT_MS, ENV_DB_PATH, ENV_LOG_DIR};
    use crate::db::DbLocation;
    use std::collections::HashMap;
    use std::time::Duration;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = CoreConfig::from_lookup(lookup_from(&[])).expect("defaults");
        assert!(matches!(config.database, DbLocation::SharedMemory(_)));
        assert_eq!(config.busy_timeout, Duration::from_secs(5));
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn reads_path_timeout_and_log_dir() {
        let config = CoreConfig::from_lookup(lookup_from(&[
            (ENV_DB_PATH, "/tmp/codelinks.sqlite3"),
            (ENV_BUSY_TIMEOUT_MS, " 250 "),
            (ENV_LOG_DIR, "/tmp/codelinks-logs"),
        ]))
        .expect("valid config");
        assert_eq!(
            config.database,
            DbLocation::file("/tmp/codelinks.sqlite3")
        );
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
        assert_eq!(
            config.log_dir.as_deref(),
            Some(std::path::Path::new("/tmp/codelinks-logs"))
        );
    }

    #[test]
    fn in_memory_default_is_not_persistent() {
        let config = CoreConfig::default();
        assert!(!config.is_persistent());
        assert_eq!(
            config.require_persistent(),
            Err(ConfigError::MissingDatabase)
        );
        assert!(ConfigError::MissingDatabase
            .to_string()
            .contains(ENV_DB_PATH));

        let config = CoreConfig::from_lookup(lookup_from(&[(ENV_DB_PATH, "links.sqlite3")]))
            .expect("valid config");
        assert!(config.is_persistent());
        assert_eq!(config.require_persistent(), Ok(()));
    }

    #[test]
    fn rejects_non_numeric_timeout() {
        let err = CoreConfig::from_lookup(lookup_from(&[(ENV_BUSY_TIMEOUT_MS, "soon")]))
            .expect_err("timeout must be numeric");
        assert_eq!(
            err,
            ConfigError::InvalidNumber {
                key: ENV_BUSY_TIMEOUT_MS,
                value: "soon".to_string()
            }
        );
    }
}
