//! Configuration module for gamikit-server.
//!
//! Handles loading configuration from profiles, TOML files, CLI arguments
//! and environment variables.

pub mod file;
pub mod profiles;

use crate::config::file::{FileConfig, StorageAdapter};
use crate::config::profiles::Profile;
use gamikit_core::{RuleConfigError, RuleEngine};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("invalid rule table: {0}")]
    RuleError(#[from] RuleConfigError),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Loaded configuration result containing all parts.
pub struct LoadedConfig {
    pub profile: Profile,
    pub file: FileConfig,
    pub rules: RuleEngine,
    /// Present only for the Postgres adapter.
    pub database_url: Option<String>,
}

impl LoadedConfig {
    /// The effective configuration as TOML, with credentials in the
    /// database URL masked. Used for startup logging.
    pub fn describe(&self) -> Result<String, ConfigError> {
        let mut summary = toml::to_string(&self.file)?;
        if let Some(url) = &self.database_url {
            summary.push_str(&format!("database_url = \"{}\"\n", redact_database_url(url)));
        }
        Ok(summary)
    }
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
    profile: Profile,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(
        config_path: impl AsRef<Path>,
        profile: Profile,
        listen_override: Option<SocketAddr>,
    ) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            profile,
            listen_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Start from the profile defaults
    /// 2. Layer the TOML file on top, if it exists
    /// 3. Apply CLI overrides
    /// 4. Validate the configuration and build the rule table
    /// 5. Read `DATABASE_URL` when the Postgres adapter is selected
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let content = match std::fs::read_to_string(&self.config_path) {
            Ok(content) => Some(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        self.load_from(content.as_deref())
    }

    fn load_from(&self, content: Option<&str>) -> Result<LoadedConfig, ConfigError> {
        let mut merged = toml::Value::try_from(self.profile.defaults())?;
        if let Some(content) = content {
            let overlay: toml::Value = toml::from_str(content)?;
            merge_toml(&mut merged, overlay);
        }
        let mut file_config: FileConfig = merged.try_into()?;

        // Apply CLI overrides
        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        self.validate(&file_config)?;

        let thresholds = file_config.thresholds()?;
        let rules = if thresholds.is_empty() {
            RuleEngine::default_ladder()
        } else {
            RuleEngine::new(thresholds)?
        };

        let database_url = match file_config.storage.adapter {
            StorageAdapter::Postgres => Some(get_database_url()?),
            StorageAdapter::Memory => None,
        };

        Ok(LoadedConfig {
            profile: self.profile,
            file: file_config,
            rules,
            database_url,
        })
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    fn validate(&self, config: &FileConfig) -> Result<(), ConfigError> {
        if let Some(prefix) = &config.server.path_prefix
            && !prefix.is_empty()
            && !prefix.starts_with('/')
        {
            return Err(ConfigError::ValidationError(format!(
                "server.path_prefix must start with '/', got {prefix:?}"
            )));
        }
        if let Some(origin) = config.server.cors_origin()
            && origin != "*"
            && axum::http::HeaderValue::from_str(origin).is_err()
        {
            return Err(ConfigError::ValidationError(format!(
                "server.cors_origin is not a valid header value: {origin:?}"
            )));
        }
        if config.leaderboard.metric.is_empty() || config.leaderboard.board.is_empty() {
            return Err(ConfigError::ValidationError(
                "leaderboard.metric and leaderboard.board must not be empty".to_string(),
            ));
        }
        if config.dispatch.max_in_flight == 0 {
            return Err(ConfigError::ValidationError(
                "dispatch.max_in_flight must be at least 1".to_string(),
            ));
        }
        if config.storage.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "storage.max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Recursively overlay `overlay` onto `base`. Tables merge key by key;
/// every other value (arrays included) replaces the base value.
fn merge_toml(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_toml(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Mask the password of a connection URL. Unparseable input is masked
/// entirely.
pub fn redact_database_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) => {
            if parsed.password().is_some() && parsed.set_password(Some("********")).is_err() {
                return "********".to_string();
            }
            parsed.to_string()
        }
        Err(_) => "********".to_string(),
    }
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::file::LogFormat;
    use gamikit_core::events::DispatchMode;

    fn loader(profile: Profile) -> ConfigLoader {
        ConfigLoader::new("does-not-exist.toml", profile, None)
    }

    #[test]
    fn test_missing_file_uses_profile_defaults() {
        let loaded = loader(Profile::Development).load().unwrap();
        assert_eq!(loaded.file.logging.format, LogFormat::Text);
        assert_eq!(loaded.file.storage.adapter, StorageAdapter::Memory);
        assert!(loaded.database_url.is_none());
        // Default ladder when no rules are configured.
        assert!(!loaded.rules.thresholds("xp").is_empty());
    }

    #[test]
    fn test_file_overrides_single_keys() {
        let loaded = loader(Profile::Development)
            .load_from(Some(
                r#"
[dispatch]
mode = "async"

[[rules]]
metric = "coins"
boundary = 10
badge = "saver"
"#,
            ))
            .unwrap();

        assert_eq!(loaded.file.dispatch.mode, DispatchMode::Async);
        // Untouched keys keep the profile value.
        assert_eq!(loaded.file.logging.level, "debug");
        assert_eq!(loaded.rules.thresholds("coins").len(), 1);
        assert!(loaded.rules.thresholds("xp").is_empty());
    }

    #[test]
    fn test_listen_override_wins() {
        let listen: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        let loaded = ConfigLoader::new("does-not-exist.toml", Profile::Testing, Some(listen))
            .load()
            .unwrap();
        assert_eq!(loaded.file.server.listen, listen);
    }

    #[test]
    fn test_invalid_rule_table_is_rejected() {
        let err = loader(Profile::Development)
            .load_from(Some(
                r#"
[[rules]]
metric = "xp"
boundary = 200
level = 3

[[rules]]
metric = "xp"
boundary = 100
level = 2
"#,
            ))
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::RuleError(_)));
    }

    #[test]
    fn test_relative_path_prefix_is_rejected() {
        let err = loader(Profile::Development)
            .load_from(Some("[server]\npath_prefix = \"api\"\n"))
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_cors_origin_can_be_disabled_or_rejected() {
        let loaded = loader(Profile::Development)
            .load_from(Some("[server]\ncors_origin = \"\"\n"))
            .unwrap();
        assert_eq!(loaded.file.server.cors_origin(), None);

        let err = loader(Profile::Development)
            .load_from(Some("[server]\ncors_origin = \"https://bad\\norigin\"\n"))
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_database_url_is_redacted() {
        assert_eq!(
            redact_database_url("postgres://gamikit:hunter2@db:5432/gamikit"),
            "postgres://gamikit:********@db:5432/gamikit"
        );
        assert_eq!(
            redact_database_url("postgres://db:5432/gamikit"),
            "postgres://db:5432/gamikit"
        );
        assert_eq!(redact_database_url("not a url"), "********");
    }
}
