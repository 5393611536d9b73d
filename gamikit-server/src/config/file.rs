//! TOML file configuration structures.
//!
//! These structs directly map to the `gamikit.toml` file format. Every
//! section is optional in the file; missing keys come from the selected
//! profile (see [`super::profiles`]).

use gamikit_core::events::{DispatchMode, OverflowPolicy};
use gamikit_core::Threshold;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use super::ConfigError;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub dispatch: DispatchConfig,
    pub leaderboard: LeaderboardConfig,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    pub listen: SocketAddr,
    /// Mount every route under this prefix (e.g., "/api").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_prefix: Option<String>,
    /// Allowed CORS origin, `"*"` for any. Empty or absent disables CORS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cors_origin: Option<String>,
}

impl ServerConfig {
    pub fn cors_origin(&self) -> Option<&str> {
        self.cors_origin.as_deref().filter(|origin| !origin.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Logging configuration section. `RUST_LOG` takes precedence over `level`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageAdapter {
    Memory,
    Postgres,
}

/// Storage configuration section. The Postgres URL is read from
/// `DATABASE_URL`, never from the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub adapter: StorageAdapter,
    pub max_connections: u32,
}

/// Event dispatch configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    pub mode: DispatchMode,
    pub max_in_flight: u32,
    pub overflow: OverflowPolicy,
}

/// Leaderboard configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardConfig {
    /// Metric whose `PointsAdded` events feed the board.
    pub metric: String,
    /// Board name, the storage key for the Postgres adapter.
    pub board: String,
}

/// One `[[rules]]` entry. Exactly one of `level`, `badge` or
/// `achievement` must be set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub metric: String,
    pub boundary: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub achievement: Option<String>,
}

impl RuleConfig {
    pub fn to_threshold(&self) -> Result<Threshold, ConfigError> {
        let metric = self.metric.as_str();
        match (&self.level, &self.badge, &self.achievement) {
            (Some(level), None, None) => Ok(Threshold::level(metric, self.boundary, *level)),
            (None, Some(badge), None) => Ok(Threshold::badge(metric, self.boundary, badge.as_str())),
            (None, None, Some(id)) => Ok(Threshold::achievement(metric, self.boundary, id.as_str())),
            _ => Err(ConfigError::ValidationError(format!(
                "rule on {} at {} must set exactly one of level, badge or achievement",
                self.metric, self.boundary
            ))),
        }
    }
}

impl FileConfig {
    /// Build the threshold table. An empty `[[rules]]` list yields an empty
    /// vector; the caller decides on the fallback ladder.
    pub fn thresholds(&self) -> Result<Vec<Threshold>, ConfigError> {
        self.rules.iter().map(RuleConfig::to_threshold).collect()
    }
}
