//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use codex::{MatchConfig, TransportConfig, entities::SERVER_NAME};
use std::{net::SocketAddr, time::Duration};

/// Default stream transport address
pub const DEFAULT_STREAM_BIND: &str = "0.0.0.0:5033";

/// Default remote-object transport address
pub const DEFAULT_REMOTE_BIND: &str = "0.0.0.0:1099";

/// Shortest liveness window the transports can work with.
pub const MIN_LIVENESS_WINDOW: Duration = Duration::from_millis(100);

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Stream transport bind address
    pub stream_bind: SocketAddr,
    /// Remote-object transport bind address
    pub remote_bind: SocketAddr,
    /// Name the remote object is bound under
    pub object_name: String,
    /// Prometheus exporter address, if metrics are enabled
    pub metrics_bind: Option<SocketAddr>,
    /// Liveness settings shared by both transports
    pub transport: TransportConfig,
    /// Rules of the match the coordinator runs
    pub match_config: MatchConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `stream_override` - Optional stream bind address (from CLI args)
    /// * `remote_override` - Optional remote bind address (from CLI args)
    /// * `metrics_override` - Optional metrics bind address (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if a variable is set but can't be parsed
    pub fn from_env(
        stream_override: Option<SocketAddr>,
        remote_override: Option<SocketAddr>,
        metrics_override: Option<SocketAddr>,
    ) -> Result<Self, ConfigError> {
        let stream_bind = match stream_override {
            Some(addr) => addr,
            None => parse_addr("STREAM_BIND", DEFAULT_STREAM_BIND)?,
        };
        let remote_bind = match remote_override {
            Some(addr) => addr,
            None => parse_addr("REMOTE_BIND", DEFAULT_REMOTE_BIND)?,
        };
        let metrics_bind = match metrics_override {
            Some(addr) => Some(addr),
            None => match std::env::var("METRICS_BIND") {
                Ok(raw) => Some(raw.parse().map_err(|_| ConfigError::Invalid {
                    var: "METRICS_BIND".to_string(),
                    reason: format!("{raw} is not a socket address"),
                })?),
                Err(_) => None,
            },
        };

        let object_name = std::env::var("REMOTE_OBJECT_NAME").unwrap_or_else(|_| SERVER_NAME.to_string());
        if object_name.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                var: "REMOTE_OBJECT_NAME".to_string(),
                hint: format!("Leave it unset to use {SERVER_NAME}"),
            });
        }

        let transport = TransportConfig::new(Duration::from_millis(parse_env_or(
            "LIVENESS_WINDOW_MS",
            TransportConfig::default().liveness_window.as_millis() as u64,
        )));

        let defaults = MatchConfig::default();
        let match_config = MatchConfig {
            winning_threshold: parse_env_or("WINNING_THRESHOLD", defaults.winning_threshold),
            min_players: parse_env_or("MIN_PLAYERS", defaults.min_players),
            max_players: parse_env_or("MAX_PLAYERS", defaults.max_players),
        };

        Ok(ServerConfig {
            stream_bind,
            remote_bind,
            object_name,
            metrics_bind,
            transport,
            match_config,
        })
    }

    /// Validate configuration after loading
    ///
    /// # Errors
    ///
    /// Returns the first setting that is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transport.liveness_window < MIN_LIVENESS_WINDOW {
            return Err(ConfigError::Invalid {
                var: "LIVENESS_WINDOW_MS".to_string(),
                reason: format!("Must be at least {}", MIN_LIVENESS_WINDOW.as_millis()),
            });
        }

        if self.object_name.contains('/') {
            return Err(ConfigError::Invalid {
                var: "REMOTE_OBJECT_NAME".to_string(),
                reason: "Must be a single path segment".to_string(),
            });
        }

        if self.stream_bind == self.remote_bind {
            return Err(ConfigError::Invalid {
                var: "REMOTE_BIND".to_string(),
                reason: format!("Must differ from the stream address ({})", self.stream_bind),
            });
        }

        self.match_config.validate().map_err(|reason| ConfigError::Invalid {
            var: "WINNING_THRESHOLD/MIN_PLAYERS/MAX_PLAYERS".to_string(),
            reason,
        })
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

fn parse_addr(key: &str, default: &str) -> Result<SocketAddr, ConfigError> {
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse().map_err(|_| ConfigError::Invalid {
        var: key.to_string(),
        reason: format!("{raw} is not a socket address"),
    })
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
