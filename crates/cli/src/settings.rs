//! Settings loaded from `cardbank.toml`
//!
//! ```toml
//! [database]
//! url = "sqlite:data/cardbank.db"
//! max_connections = 8
//! lock_timeout_ms = 5000
//!
//! [security]
//! memory_kib = 19456
//! iterations = 2
//! parallelism = 1
//!
//! [log]
//! filter = "info"
//! ```
//!
//! Every key is optional. A missing file means all defaults.

use cardbank_engine::SecurityConfig;
use cardbank_persistence::StoreConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub database: StoreConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub log: LogSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSettings {
    /// `tracing` filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl Settings {
    /// Load from a file; defaults if it does not exist
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    pub fn load_str(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.database
            .validate()
            .map_err(|e| SettingsError::Validation(e.to_string()))?;
        self.security
            .validate()
            .map_err(|e| SettingsError::Validation(e.to_string()))?;
        if self.log.filter.trim().is_empty() {
            return Err(SettingsError::Validation("log filter is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_string() {
        let settings = Settings::load_str(
            r#"
[database]
url = "sqlite:/tmp/bank.db"
lock_timeout_ms = 250

[log]
filter = "cardbank_engine=debug"
"#,
        )
        .unwrap();
        assert_eq!(settings.database.url, "sqlite:/tmp/bank.db");
        assert_eq!(settings.database.lock_timeout_ms, 250);
        assert_eq!(settings.database.max_connections, 8);
        assert_eq!(settings.security, SecurityConfig::default());
        assert_eq!(settings.log.filter, "cardbank_engine=debug");
    }

    #[test]
    fn test_empty_is_default() {
        assert_eq!(Settings::load_str("").unwrap(), Settings::default());
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::TempDir::new().unwrap();
        let settings = Settings::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_validation() {
        let err = Settings::load_str("[database]\nmax_connections = 0\n").unwrap_err();
        assert!(matches!(err, SettingsError::Validation(_)));

        let err = Settings::load_str("[security]\niterations = 0\n").unwrap_err();
        assert!(matches!(err, SettingsError::Validation(_)));

        let err = Settings::load_str("[database]\nmax_connections = \"many\"\n").unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }
}
