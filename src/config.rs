use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Application configuration loaded from environment variables.
///
/// Forum credentials and the channel list are not part of this: they live
/// in the `login` and `config` records of the data directory.
#[derive(Debug, Clone)]
pub struct Config {
    // Storage
    pub data_dir: PathBuf,

    // Scheduling
    pub check_interval: Duration,
    pub staleness_window: Duration,
    pub check_timeout: Duration,

    // Extraction
    pub probe_timeout: Duration,
    pub locate_poll: Duration,
    pub landing_query_prefix: String,
    pub chrome_path: Option<String>,

    // Discord
    pub discord_bot_token: String,
    pub discord_api_base: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Storage
            data_dir: PathBuf::from(env_or_default("DATA_DIR", "./cache")),

            // Scheduling
            check_interval: Duration::from_secs(parse_env_u64("CHECK_INTERVAL_SECS", 300)?),
            staleness_window: Duration::from_secs(parse_env_u64("STALENESS_SECS", 3600)?),
            check_timeout: Duration::from_secs(parse_env_u64("CHECK_TIMEOUT_SECS", 300)?),

            // Extraction
            probe_timeout: Duration::from_millis(parse_env_u64("PROBE_TIMEOUT_MS", 200)?),
            locate_poll: Duration::from_millis(parse_env_u64("LOCATE_POLL_MS", 100)?),
            landing_query_prefix: env_or_default("LANDING_QUERY_PREFIX", "?/forum/13-suggestions"),
            chrome_path: optional_env("CHROME_PATH"),

            // Discord
            discord_bot_token: required_env("DISCORD_BOT_TOKEN")?,
            discord_api_base: env_or_default("DISCORD_API_BASE", "https://discord.com/api/v10"),
        })
    }

    /// Configuration with defaults suitable for tests (no environment access).
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            data_dir: PathBuf::from("./cache"),
            check_interval: Duration::from_secs(300),
            staleness_window: Duration::from_secs(3600),
            check_timeout: Duration::from_secs(30),
            probe_timeout: Duration::from_millis(200),
            locate_poll: Duration::from_millis(5),
            landing_query_prefix: "?/forum/13-suggestions".to_string(),
            chrome_path: None,
            discord_bot_token: "test-token".to_string(),
            discord_api_base: "http://127.0.0.1:9".to_string(),
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("CHECK_INTERVAL_SECS", self.check_interval),
            ("STALENESS_SECS", self.staleness_window),
            ("CHECK_TIMEOUT_SECS", self.check_timeout),
            ("PROBE_TIMEOUT_MS", self.probe_timeout),
            ("LOCATE_POLL_MS", self.locate_poll),
        ] {
            if value.is_zero() {
                return Err(ConfigError::InvalidValue {
                    name: name.to_string(),
                    message: "must be greater than zero".to_string(),
                });
            }
        }
        if self.discord_bot_token.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "DISCORD_BOT_TOKEN".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        if let Err(e) = url::Url::parse(&self.discord_api_base) {
            return Err(ConfigError::InvalidValue {
                name: "DISCORD_API_BASE".to_string(),
                message: e.to_string(),
            });
        }
        Ok(())
    }
}

fn required_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}
