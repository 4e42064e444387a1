//! YAML configuration for gateway binaries
//!
//! The bot token never lives in YAML; it is read from `DISCORD_TOKEN` after
//! `.env` is loaded.

use cordgate::{ExponentialBackoff, FixedDelay, Intents, NeverReconnect, ReconnectionStrategy, ShardInfo};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

pub const TOKEN_ENV_VAR: &str = "DISCORD_TOKEN";

/// Upper bound for the gap between two shard connects
pub const MAX_CONNECT_STAGGER_SECS: f64 = 60.0;

/// Upper bound for any reconnect delay
pub const MAX_RECONNECT_DELAY_SECS: f64 = 86_400.0;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarMissing(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Top-level client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub gateway: GatewaySettings,
    #[serde(default)]
    pub rest: RestSettings,

    /// Bot token from .env (not in YAML)
    #[serde(skip)]
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySettings {
    /// Intent names, e.g. `guild_messages`
    #[serde(default = "default_intents")]
    pub intents: Vec<String>,
    /// Total shards; the server recommendation is used when absent
    #[serde(default)]
    pub shard_count: Option<u32>,
    /// `[start, end)` slice of shards run by this process, all when absent
    #[serde(default)]
    pub shard_range: Option<[u32; 2]>,
    #[serde(default = "default_connect_stagger")]
    pub connect_stagger_secs: f64,
    #[serde(default)]
    pub reconnect: ReconnectSettings,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            intents: default_intents(),
            shard_count: None,
            shard_range: None,
            connect_stagger_secs: default_connect_stagger(),
            reconnect: ReconnectSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconnectKind {
    Fixed,
    Exponential,
    Never,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectSettings {
    pub strategy: ReconnectKind,
    pub delay_secs: f64,
    /// Cap for `exponential`
    #[serde(default = "default_max_delay")]
    pub max_delay_secs: f64,
    #[serde(default)]
    pub max_attempts: Option<usize>,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            strategy: ReconnectKind::Fixed,
            delay_secs: 10.0,
            max_delay_secs: default_max_delay(),
            max_attempts: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestSettings {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Reject calls against a spent bucket instead of queuing them
    #[serde(default)]
    pub fail_fast: bool,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for RestSettings {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            fail_fast: false,
            timeout_secs: default_timeout(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_intents() -> Vec<String> {
    vec!["guilds".to_string(), "guild_messages".to_string()]
}

fn default_connect_stagger() -> f64 {
    5.0
}

fn default_max_delay() -> f64 {
    300.0
}

fn default_api_base() -> String {
    cordrest::DEFAULT_API_BASE.to_string()
}

fn default_timeout() -> u64 {
    30
}

impl ClientConfig {
    /// Load configuration from YAML file and .env
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        let mut config = Self::parse(&yaml_content)?;

        // Don't fail if .env doesn't exist
        dotenv::dotenv().ok();

        config.token = std::env::var(TOKEN_ENV_VAR)
            .map_err(|_| ConfigError::EnvVarMissing(TOKEN_ENV_VAR.to_string()))?;
        if config.token.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!("{} is empty", TOKEN_ENV_VAR)));
        }

        Ok(config)
    }

    /// Parse and validate YAML without touching the environment
    pub fn parse(yaml: &str) -> Result<Self> {
        let config: ClientConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "log_level must be one of: {}",
                valid_levels.join(", ")
            )));
        }

        self.intents()?;

        if self.gateway.shard_count == Some(0) {
            return Err(ConfigError::ValidationError(
                "shard_count must be greater than 0".to_string(),
            ));
        }
        if let (Some([start, end]), Some(total)) = (self.gateway.shard_range, self.gateway.shard_count) {
            ShardInfo::new(start..end, total)
                .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        }

        let stagger = self.gateway.connect_stagger_secs;
        if !(0.0..=MAX_CONNECT_STAGGER_SECS).contains(&stagger) {
            return Err(ConfigError::ValidationError(format!(
                "connect_stagger_secs must be between 0 and {}",
                MAX_CONNECT_STAGGER_SECS
            )));
        }

        let reconnect = &self.gateway.reconnect;
        if reconnect.strategy != ReconnectKind::Never {
            if !reconnect.delay_secs.is_finite() || reconnect.delay_secs <= 0.0 {
                return Err(ConfigError::ValidationError(
                    "reconnect.delay_secs must be greater than 0".to_string(),
                ));
            }
            if !reconnect.max_delay_secs.is_finite() || reconnect.max_delay_secs < reconnect.delay_secs {
                return Err(ConfigError::ValidationError(
                    "reconnect.max_delay_secs must be at least delay_secs".to_string(),
                ));
            }
            if reconnect.max_delay_secs > MAX_RECONNECT_DELAY_SECS {
                return Err(ConfigError::ValidationError(format!(
                    "reconnect delays must not exceed {} seconds",
                    MAX_RECONNECT_DELAY_SECS
                )));
            }
        }

        if self.rest.api_base.is_empty() {
            return Err(ConfigError::ValidationError(
                "rest.api_base cannot be empty".to_string(),
            ));
        }
        if self.rest.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "rest.timeout_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn intents(&self) -> Result<Intents> {
        Intents::from_names(self.gateway.intents.iter().map(String::as_str)).ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "unknown intent in {:?}",
                self.gateway.intents
            ))
        })
    }

    /// Shards this process runs, given the server's recommended total
    pub fn shard_info(&self, recommended: u32) -> Result<ShardInfo> {
        let total = self.gateway.shard_count.unwrap_or(recommended).max(1);
        let range = match self.gateway.shard_range {
            Some([start, end]) => start..end,
            None => 0..total,
        };
        ShardInfo::new(range, total).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    pub fn connect_stagger(&self) -> Duration {
        Duration::from_secs_f64(self.gateway.connect_stagger_secs)
    }

    pub fn reconnect_strategy(&self) -> Arc<dyn ReconnectionStrategy> {
        let settings = &self.gateway.reconnect;
        let delay = Duration::from_secs_f64(settings.delay_secs);
        match settings.strategy {
            ReconnectKind::Fixed => Arc::new(FixedDelay::new(delay, settings.max_attempts)),
            ReconnectKind::Exponential => Arc::new(ExponentialBackoff::new(
                delay,
                Duration::from_secs_f64(settings.max_delay_secs),
                settings.max_attempts,
            )),
            ReconnectKind::Never => Arc::new(NeverReconnect),
        }
    }

    /// Log configuration summary
    pub fn log(&self) {
        info!("Configuration loaded:");
        info!("  Log level: {}", self.log_level);
        info!("  Intents: {}", self.gateway.intents.join(", "));
        match self.gateway.shard_count {
            Some(count) => info!("  Shard count: {}", count),
            None => info!("  Shard count: server recommendation"),
        }
        if let Some([start, end]) = self.gateway.shard_range {
            info!("  Shard range: {}..{}", start, end);
        }
        info!("  Connect stagger: {} seconds", self.gateway.connect_stagger_secs);
        info!("  Reconnect: {:?}", self.gateway.reconnect);
        info!("  REST API: {}", self.rest.api_base);
        info!("  REST fail fast: {}", self.rest.fail_fast);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config = ClientConfig::parse("{}").unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.intents().unwrap(), Intents::GUILDS | Intents::GUILD_MESSAGES);
        assert_eq!(config.connect_stagger(), Duration::from_secs(5));
        assert_eq!(config.rest.api_base, cordrest::DEFAULT_API_BASE);
        assert!(config.token.is_empty());
    }

    #[test]
    fn test_shard_info_uses_recommendation() {
        let config = ClientConfig::parse("{}").unwrap();
        let info = config.shard_info(3).unwrap();
        assert_eq!(info.range(), 0..3);
        assert_eq!(info.total(), 3);
    }

    #[test]
    fn test_shard_range_overrides() {
        let config = ClientConfig::parse("gateway:\n  shard_count: 8\n  shard_range: [4, 8]\n").unwrap();
        let info = config.shard_info(2).unwrap();
        assert_eq!(info.range(), 4..8);
        assert_eq!(info.total(), 8);
    }

    #[test]
    fn test_oversized_durations_rejected() {
        assert!(matches!(
            ClientConfig::parse("gateway:\n  connect_stagger_secs: 1.0e300\n"),
            Err(ConfigError::ValidationError(_))
        ));
        assert!(matches!(
            ClientConfig::parse("gateway:\n  connect_stagger_secs: .nan\n"),
            Err(ConfigError::ValidationError(_))
        ));
        assert!(matches!(
            ClientConfig::parse(
                "gateway:\n  reconnect:\n    strategy: fixed\n    delay_secs: 1.0e300\n    max_delay_secs: 1.0e300\n"
            ),
            Err(ConfigError::ValidationError(_))
        ));

        let config = ClientConfig::parse("gateway:\n  connect_stagger_secs: 60\n").unwrap();
        assert_eq!(config.connect_stagger(), Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            ClientConfig::parse("log_level: loud"),
            Err(ConfigError::ValidationError(_))
        ));
        assert!(matches!(
            ClientConfig::parse("gateway:\n  intents: [guilds, telepathy]\n"),
            Err(ConfigError::ValidationError(_))
        ));
        assert!(matches!(
            ClientConfig::parse("gateway:\n  shard_count: 2\n  shard_range: [1, 3]\n"),
            Err(ConfigError::ValidationError(_))
        ));
        assert!(matches!(
            ClientConfig::parse("gateway:\n  reconnect:\n    strategy: fixed\n    delay_secs: 0\n"),
            Err(ConfigError::ValidationError(_))
        ));
    }
}
