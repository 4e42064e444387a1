use crate::protocol::{IdentifyProperties, Intents, Token};
use crate::traits::{FixedDelay, GatewayError, ReconnectionStrategy, Result};
use std::fmt;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

/// Default gateway endpoint when none is discovered over REST
pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg";

/// Gateway protocol version requested in the connect URL
pub const DEFAULT_API_VERSION: u8 = 10;

/// Delay between consecutive shards' connects
pub const DEFAULT_CONNECT_STAGGER: Duration = Duration::from_secs(5);

/// Which shards this process runs out of how many in total
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardInfo {
    range: Range<u32>,
    total: u32,
}

impl ShardInfo {
    /// `range` must be non-empty and end at or before `total`
    pub fn new(range: Range<u32>, total: u32) -> Result<Self> {
        if range.is_empty() || range.end > total {
            return Err(GatewayError::InvalidShardRange {
                start: range.start,
                end: range.end,
                total,
            });
        }
        Ok(Self { range, total })
    }

    /// All `total` shards in this process
    pub fn all(total: u32) -> Result<Self> {
        Self::new(0..total, total)
    }

    pub fn single() -> Self {
        Self { range: 0..1, total: 1 }
    }

    pub fn range(&self) -> Range<u32> {
        self.range.clone()
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    /// Shards owned by this process
    pub fn count(&self) -> usize {
        self.range.len()
    }
}

impl Default for ShardInfo {
    fn default() -> Self {
        Self::single()
    }
}

/// Everything a session needs to identify and stay connected
///
/// Built by [`crate::core::builder::GatewayBuilder`].
#[derive(Clone)]
pub struct GatewayConfig {
    pub token: Token,
    pub intents: Intents,
    /// Base gateway URL without query string
    pub gateway_url: String,
    pub api_version: u8,
    pub large_threshold: u32,
    pub properties: IdentifyProperties,
    pub shards: ShardInfo,
    pub connect_stagger: Duration,
    pub reconnect_strategy: Arc<dyn ReconnectionStrategy>,
}

impl GatewayConfig {
    pub fn new(token: Token) -> Self {
        Self {
            token,
            intents: Intents::default(),
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            api_version: DEFAULT_API_VERSION,
            large_threshold: 250,
            properties: IdentifyProperties::default(),
            shards: ShardInfo::default(),
            connect_stagger: DEFAULT_CONNECT_STAGGER,
            reconnect_strategy: Arc::new(FixedDelay::default()),
        }
    }

    /// Full socket URL for `base` with version and encoding parameters
    pub fn connect_url(&self, base: &str) -> String {
        format!(
            "{}/?v={}&encoding=json",
            base.trim_end_matches('/'),
            self.api_version
        )
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("token", &self.token)
            .field("intents", &self.intents)
            .field("gateway_url", &self.gateway_url)
            .field("api_version", &self.api_version)
            .field("large_threshold", &self.large_threshold)
            .field("shards", &self.shards)
            .field("connect_stagger", &self.connect_stagger)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_range_validation() {
        assert!(ShardInfo::new(0..2, 2).is_ok());
        assert!(ShardInfo::new(2..4, 8).is_ok());
        assert!(matches!(
            ShardInfo::new(0..3, 2),
            Err(GatewayError::InvalidShardRange { start: 0, end: 3, total: 2 })
        ));
        assert!(ShardInfo::new(1..1, 2).is_err());
        assert!(ShardInfo::all(0).is_err());
    }

    #[test]
    fn test_shard_count_is_range_length() {
        let info = ShardInfo::new(2..5, 10).unwrap();
        assert_eq!(info.count(), 3);
        assert_eq!(info.total(), 10);
    }

    #[test]
    fn test_connect_url() {
        let config = GatewayConfig::new(Token::bot("t"));
        assert_eq!(
            config.connect_url("wss://gateway.discord.gg/"),
            "wss://gateway.discord.gg/?v=10&encoding=json"
        );
    }
}
