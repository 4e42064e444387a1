use crate::protocol::DispatchEvent;
use std::time::Duration;

/// Notifications a session sends to whoever owns it
///
/// Called on the session's own thread; implementations must not block.
pub trait ShardDelegate: Send + Sync {
    fn shard_connected(&self, shard: u32);

    fn shard_disconnected(&self, shard: u32);

    fn shard_dispatch(&self, shard: u32, event: DispatchEvent);

    fn shard_hello(&self, shard: u32, heartbeat_interval: Duration);
}

/// Notifications the coordinator sends to the embedding application
///
/// Every method has an empty default so embedders only implement what they
/// care about.
#[allow(unused_variables)]
pub trait GatewayDelegate: Send + Sync {
    fn on_shard_connected(&self, shard: u32) {}

    fn on_shard_disconnected(&self, shard: u32) {}

    fn on_dispatch(&self, event: DispatchEvent, shard: u32) {}

    fn on_hello(&self, shard: u32) {}

    /// Every shard in the current connect cycle reported connected
    fn on_fully_connected(&self) {}

    /// Every shard closed, or the coordinator was closed before they all connected
    fn on_fully_disconnected(&self, reason: &str) {}
}
