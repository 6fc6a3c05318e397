//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::game::MatchRules;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines instead of human-readable text
    pub log_json: bool,
    /// Directory served for browser clients
    pub static_dir: PathBuf,
    /// Allowed client origins for CORS, comma-separated or `*`
    pub client_origin: String,
    /// Gameplay tunables
    pub rules: MatchRules,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup, so tests need not touch the process environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
        };

        let defaults = MatchRules::default();
        let min_players = parse_or(&lookup, "MIN_PLAYERS", defaults.min_players)?;
        if min_players == 0 {
            return Err(ConfigError::Invalid("MIN_PLAYERS"));
        }
        let match_duration_secs =
            parse_or(&lookup, "MATCH_DURATION_SECS", defaults.match_duration_secs)?;
        if match_duration_secs == 0 {
            return Err(ConfigError::Invalid("MATCH_DURATION_SECS"));
        }

        let log_json = match lookup("LOG_FORMAT").as_deref().map(str::trim) {
            None | Some("text") | Some("pretty") => false,
            Some("json") => true,
            Some(_) => return Err(ConfigError::Invalid("LOG_FORMAT")),
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress(server_addr.clone()))?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_json,
            static_dir: lookup("STATIC_DIR")
                .unwrap_or_else(|| "public".to_string())
                .into(),
            client_origin: lookup("CLIENT_ORIGIN").unwrap_or_else(|| "*".to_string()),
            rules: MatchRules {
                min_players,
                match_duration_secs,
                ..defaults
            },
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server address: {0}")]
    InvalidAddress(String),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
