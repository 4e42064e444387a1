//! # Cordgate Traits
//!
//! Capability seams the gateway core is written against:
//!
//! - **GatewayTransport**: open/send/close a gateway socket
//! - **Scheduler**: one-shot and repeating timers
//! - **ShardDelegate / GatewayDelegate**: upward notifications
//! - **ReconnectionStrategy**: spacing of resume attempts

pub mod delegate;
pub mod error;
pub mod reconnect;
pub mod scheduler;
pub mod transport;

pub use delegate::{GatewayDelegate, ShardDelegate};
pub use error::{GatewayError, Result};
pub use reconnect::{ExponentialBackoff, FixedDelay, NeverReconnect, ReconnectionStrategy};
pub use scheduler::{OnceTask, RepeatTask, Scheduler, TimerHandle};
pub use transport::{GatewayTransport, TransportEvent, TransportSink};
