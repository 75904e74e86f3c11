//! Centralized configuration for api-server.
//!
//! All environment variables are loaded and validated at startup to fail fast
//! on misconfiguration rather than at invocation time.

use std::env;
use std::path::PathBuf;

/// World-state backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageProvider {
    /// In-memory world state (data lost on restart)
    Memory,
    /// SQLite file-based world state
    Sqlite,
}

impl StorageProvider {
    fn from_str(s: &str) -> Result<Self, ConfigError> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            _ => Err(ConfigError {
                field: "STORAGE_PROVIDER",
                message: format!("Unknown provider '{}': expected 'memory' or 'sqlite'", s),
            }),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn from_str(s: &str) -> Result<Self, ConfigError> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError {
                field: "LOG_FORMAT",
                message: format!("Unknown format '{}': expected 'pretty' or 'json'", s),
            }),
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
#[error("Configuration error for {field}: {message}")]
pub struct ConfigError {
    pub field: &'static str,
    pub message: String,
}

/// Host configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 3001)
    pub port: u16,
    /// World-state backend
    pub storage_provider: StorageProvider,
    /// SQLite database path (when using sqlite storage)
    pub db_path: PathBuf,
    /// Log format
    pub log_format: LogFormat,
    /// Run `InitLedger` once before serving
    pub init_ledger: bool,
}

impl Config {
    /// Load and validate configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self, ConfigError> {
        // Port
        let port = match lookup("PORT") {
            Some(s) => s.parse().map_err(|e| ConfigError {
                field: "PORT",
                message: format!("Invalid port '{}': {}", s, e),
            })?,
            None => 3001,
        };

        // Storage provider
        let storage_provider =
            StorageProvider::from_str(&lookup("STORAGE_PROVIDER").unwrap_or_else(|| "sqlite".into()))?;

        // DB path (for sqlite)
        let db_path = lookup("DB_PATH")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data/world_state.db"));

        // Log format
        let log_format =
            LogFormat::from_str(&lookup("LOG_FORMAT").unwrap_or_else(|| "pretty".into()))?;

        // Seed on start
        let init_ledger = lookup("INIT_LEDGER")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            port,
            storage_provider,
            db_path,
            log_format,
            init_ledger,
        })
    }

    /// Log warnings about non-durable configuration.
    pub fn warn_if_ephemeral(&self) {
        if self.storage_provider == StorageProvider::Memory {
            tracing::warn!(
                "STORAGE_PROVIDER=memory: world state is kept in memory and lost on restart."
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn storage_provider_parsing() {
        assert_eq!(StorageProvider::from_str("memory").unwrap(), StorageProvider::Memory);
        assert_eq!(StorageProvider::from_str("sqlite").unwrap(), StorageProvider::Sqlite);
        assert_eq!(StorageProvider::from_str("SQLITE").unwrap(), StorageProvider::Sqlite);
        assert!(StorageProvider::from_str("anything").is_err());
        assert!(StorageProvider::from_str("").is_err());
    }

    #[test]
    fn log_format_parsing() {
        assert_eq!(LogFormat::from_str("pretty").unwrap(), LogFormat::Pretty);
        assert_eq!(LogFormat::from_str("json").unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::from_str("JSON").unwrap(), LogFormat::Json);
        assert!(LogFormat::from_str("anything").is_err());
    }

    #[test]
    fn misspelled_storage_provider_fails_fast() {
        let err = load(&[("STORAGE_PROVIDER", "sqlit")]).unwrap_err();
        assert_eq!(err.field, "STORAGE_PROVIDER");
        assert!(err.message.contains("sqlit"));
    }

    #[test]
    fn unknown_log_format_fails_fast() {
        let err = load(&[("LOG_FORMAT", "yaml")]).unwrap_err();
        assert_eq!(err.field, "LOG_FORMAT");
    }

    #[test]
    fn defaults() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg.port, 3001);
        assert_eq!(cfg.storage_provider, StorageProvider::Sqlite);
        assert_eq!(cfg.db_path, PathBuf::from("./data/world_state.db"));
        assert_eq!(cfg.log_format, LogFormat::Pretty);
        assert!(!cfg.init_ledger);
    }

    #[test]
    fn overrides() {
        let cfg = load(&[
            ("PORT", "8080"),
            ("STORAGE_PROVIDER", "memory"),
            ("DB_PATH", "/tmp/ws.db"),
            ("LOG_FORMAT", "json"),
            ("INIT_LEDGER", "TRUE"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.storage_provider, StorageProvider::Memory);
        assert_eq!(cfg.db_path, PathBuf::from("/tmp/ws.db"));
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert!(cfg.init_ledger);
    }

    #[test]
    fn bad_port_fails_fast() {
        let err = load(&[("PORT", "not-a-port")]).unwrap_err();
        assert_eq!(err.field, "PORT");
    }
}
