//! Migration engine configuration
//!
//! Connection parameters and timeouts are loaded once at process start from
//! `config/floodgate.toml` (optional) and `FLOODGATE__`-prefixed environment
//! variables, then passed by reference into the engine. Core logic never
//! reads the ambient environment itself.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct MigrateConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_dbname")]
    pub dbname: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
    /// Upper bound on any single statement, in seconds
    #[serde(default = "default_statement_timeout_seconds")]
    pub statement_timeout_seconds: u64,
    /// Upper bound on lock acquisition, in seconds
    #[serde(default = "default_lock_timeout_seconds")]
    pub lock_timeout_seconds: u64,
    /// Upper bound on sitting idle inside an open transaction, in seconds
    #[serde(default = "default_idle_in_transaction_timeout_seconds")]
    pub idle_in_transaction_timeout_seconds: u64,
    /// Opt-in session-level performance tuning for the batch (reduced
    /// durability while it runs). Off by default.
    #[serde(default)]
    pub session_tuning: bool,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            dbname: default_dbname(),
            user: default_user(),
            password: String::new(),
            statement_timeout_seconds: default_statement_timeout_seconds(),
            lock_timeout_seconds: default_lock_timeout_seconds(),
            idle_in_transaction_timeout_seconds: default_idle_in_transaction_timeout_seconds(),
            session_tuning: false,
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_dbname() -> String {
    "floodgate_dev".to_string()
}

fn default_user() -> String {
    "postgres".to_string()
}

fn default_statement_timeout_seconds() -> u64 {
    300
}

fn default_lock_timeout_seconds() -> u64 {
    60
}

fn default_idle_in_transaction_timeout_seconds() -> u64 {
    300
}

impl MigrateConfig {
    /// Load configuration from `config/floodgate.toml`, falling back to
    /// `FLOODGATE__`-prefixed environment variables.
    ///
    /// Example: `FLOODGATE__DATABASE__HOST=db.internal` sets `host`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if neither source can be loaded or the
    /// `database` section fails to deserialize.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name("config/floodgate.toml").required(false))
            .add_source(Environment::with_prefix("FLOODGATE").separator("__"));

        let settings = match builder.build() {
            Ok(cfg) => cfg,
            Err(err) => {
                if std::path::Path::new("config/floodgate.toml").exists() {
                    log::warn!("Failed to load config file, falling back to env: {err}");
                }
                Config::builder()
                    .add_source(Environment::with_prefix("FLOODGATE").separator("__"))
                    .build()
                    .map_err(|env_err| {
                        ConfigError::Message(format!(
                            "Failed to load configuration from file ({err}) and env ({env_err})"
                        ))
                    })?
            }
        };

        match settings.get::<MigrateConfig>("database") {
            Ok(cfg) => Ok(cfg),
            // No `database` section anywhere: every field has a default, so
            // an empty environment still yields a usable local config.
            Err(ConfigError::NotFound(_)) => Ok(Self::default()),
            Err(e) => Err(ConfigError::Message(format!(
                "Database configuration could not be loaded: {e}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_bounded_and_local() {
        let cfg = MigrateConfig::default();
        assert_eq!(cfg.host, "localhost");
        assert_eq!(cfg.port, 5432);
        assert!(cfg.statement_timeout_seconds > 0);
        assert!(cfg.lock_timeout_seconds > 0);
        assert!(cfg.idle_in_transaction_timeout_seconds > 0);
        assert!(!cfg.session_tuning);
    }
}
