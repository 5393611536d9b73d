//! Named configuration profiles.
//!
//! A profile supplies a complete [`FileConfig`]; the TOML file (if any) is
//! layered on top of it key by key.

use clap::ValueEnum;
use gamikit_core::events::{DispatchMode, OverflowPolicy, DEFAULT_MAX_IN_FLIGHT};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use super::file::{
    DispatchConfig, FileConfig, LeaderboardConfig, LogFormat, LoggingConfig, ServerConfig,
    StorageAdapter, StorageConfig,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Local development: in-memory storage, verbose text logs.
    #[default]
    #[value(alias = "dev")]
    Development,
    /// Automated tests: in-memory storage, random port, quiet JSON logs.
    #[value(alias = "test")]
    Testing,
    /// Production: PostgreSQL, asynchronous dispatch, JSON logs.
    #[value(alias = "prod")]
    Production,
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Profile::Development => write!(f, "development"),
            Profile::Testing => write!(f, "testing"),
            Profile::Production => write!(f, "production"),
        }
    }
}

impl Profile {
    pub fn defaults(self) -> FileConfig {
        let base = FileConfig {
            server: ServerConfig {
                listen: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8080),
                path_prefix: None,
                cors_origin: Some("*".to_string()),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Json,
            },
            storage: StorageConfig {
                adapter: StorageAdapter::Memory,
                max_connections: 10,
            },
            dispatch: DispatchConfig {
                mode: DispatchMode::Sync,
                max_in_flight: DEFAULT_MAX_IN_FLIGHT,
                overflow: OverflowPolicy::Block,
            },
            leaderboard: LeaderboardConfig {
                metric: gamikit_sdk::objects::DEFAULT_METRIC.to_string(),
                board: "global".to_string(),
            },
            rules: Vec::new(),
        };

        match self {
            Profile::Development => FileConfig {
                server: ServerConfig {
                    listen: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080),
                    ..base.server
                },
                logging: LoggingConfig {
                    level: "debug".to_string(),
                    format: LogFormat::Text,
                },
                ..base
            },
            Profile::Testing => FileConfig {
                server: ServerConfig {
                    listen: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
                    ..base.server
                },
                logging: LoggingConfig {
                    level: "warn".to_string(),
                    format: LogFormat::Json,
                },
                ..base
            },
            Profile::Production => FileConfig {
                server: ServerConfig {
                    cors_origin: None,
                    ..base.server
                },
                storage: StorageConfig {
                    adapter: StorageAdapter::Postgres,
                    max_connections: 20,
                },
                dispatch: DispatchConfig {
                    mode: DispatchMode::Async,
                    ..base.dispatch
                },
                ..base
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_aliases() {
        assert_eq!(Profile::from_str("dev", true).unwrap(), Profile::Development);
        assert_eq!(Profile::from_str("prod", true).unwrap(), Profile::Production);
        assert_eq!(Profile::from_str("testing", true).unwrap(), Profile::Testing);
        assert!(Profile::from_str("staging", true).is_err());
    }

    #[test]
    fn test_production_uses_postgres_and_async() {
        let config = Profile::Production.defaults();
        assert_eq!(config.storage.adapter, StorageAdapter::Postgres);
        assert_eq!(config.dispatch.mode, DispatchMode::Async);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.server.cors_origin(), None);
    }

    #[test]
    fn test_development_allows_any_origin() {
        assert_eq!(Profile::Development.defaults().server.cors_origin(), Some("*"));
    }

    #[test]
    fn test_testing_binds_random_port() {
        assert_eq!(Profile::Testing.defaults().server.listen.port(), 0);
    }
}
