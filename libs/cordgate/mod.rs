//! # Cordgate
//!
//! Client side of a chat platform's real-time gateway.
//!
//! ## Features
//!
//! - **Per-shard session**: handshake, heartbeat, resume and reconnect on one serial thread
//! - **Shard coordinator**: staggered connects and exactly-once "fully connected" signaling
//! - **Typed wire frames**: every inbound and outbound frame is a closed enum
//! - **Pluggable seams**: transport, scheduler and reconnection strategy are traits

pub mod core;
pub mod manager;
pub mod protocol;
pub mod traits;

// Re-export all traits
pub use traits::*;

pub use self::core::{
    builder, ChannelDelegate, EventReceiver, GatewayBuilder, GatewayConfig, GatewayEvent,
    GatewaySession, ManualScheduler, SessionInput, SessionState, ShardHandle, ShardInfo,
    ShardMetrics, TokioScheduler, TungsteniteTransport,
};
pub use manager::{ShardCoordinator, TransportFactory};
pub use protocol::{
    CloseCode, CloseReason, DispatchEvent, GatewayCommand, GatewayMessage, Intents, OpCode,
    Token,
};
