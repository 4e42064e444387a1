//! # Cordgate Core
//!
//! Session state machine, configuration, timers and the default socket
//! transport.
//!
//! ## Example
//!
//! ```rust,ignore
//! use cordgate::{ChannelDelegate, GatewayEvent, Intents, ShardInfo, Token};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> cordgate::Result<()> {
//!     let (delegate, events) = ChannelDelegate::new();
//!     let coordinator = cordgate::builder()
//!         .token(Token::bot(std::env::var("DISCORD_TOKEN").unwrap_or_default()))
//!         .delegate(Arc::new(delegate))
//!         .intents(Intents::GUILDS | Intents::GUILD_MESSAGES)
//!         .shards(ShardInfo::all(2)?)
//!         .build()?;
//!
//!     coordinator.connect();
//!
//!     while let Some(event) = events.recv_event() {
//!         if let GatewayEvent::Dispatch { shard, event } = event {
//!             println!("shard {}: {}", shard, event.name);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod config;
pub mod connection_state;
pub mod events;
pub mod scheduler;
pub mod session;
pub mod websocket;

pub use builder::{states, GatewayBuilder};
pub use config::{GatewayConfig, ShardInfo};
pub use connection_state::{AtomicMetrics, AtomicSessionState, SessionState, ShardMetrics};
pub use events::{ChannelDelegate, EventReceiver, GatewayEvent};
pub use scheduler::{ManualScheduler, TokioScheduler};
pub use session::{GatewaySession, SessionInput, ShardHandle};
pub use websocket::TungsteniteTransport;

/// Start building a [`crate::manager::ShardCoordinator`]
pub fn builder() -> GatewayBuilder<builder::states::NoToken, builder::states::NoDelegate> {
    GatewayBuilder::new()
}
