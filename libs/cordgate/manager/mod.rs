//! # Cordgate Manager
//!
//! Multi-shard coordination: staggered connects, barrier-style
//! "fully connected"/"fully disconnected" signaling and send routing.

pub mod coordinator;

pub use coordinator::{ShardCoordinator, TransportFactory};
