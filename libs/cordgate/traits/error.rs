use thiserror::Error;

/// Main error type for the gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Connection closed unexpectedly
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// The addressed shard has no open transport
    #[error("Shard {0} is not connected")]
    NotConnected(u32),

    /// Shard index outside the coordinator's shard set
    #[error("Shard {shard} is out of range (coordinator owns {count} shards)")]
    ShardOutOfRange { shard: u32, count: usize },

    /// Shard range does not fit inside the total shard count
    #[error("Invalid shard range {start}..{end} for {total} total shards")]
    InvalidShardRange { start: u32, end: u32, total: u32 },

    /// Envelope could not be decoded into a known message
    #[error("Decode error: {0}")]
    Decode(String),

    /// Outbound command could not be encoded
    #[error("Encode error: {0}")]
    Encode(String),

    /// Channel send error
    #[error("Channel send error: {0}")]
    ChannelSend(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic error
    #[error("Error: {0}")]
    Other(String),
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Decode(err.to_string())
    }
}

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;
