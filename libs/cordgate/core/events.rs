use crate::protocol::DispatchEvent;
use crate::traits::GatewayDelegate;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// Coordinator notifications as plain values
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    ShardConnected(u32),
    ShardDisconnected(u32),
    Hello(u32),
    Dispatch { shard: u32, event: DispatchEvent },
    FullyConnected,
    FullyDisconnected(String),
}

/// [`GatewayDelegate`] that forwards every notification into a channel
///
/// Useful when the embedder wants to consume events from its own loop
/// instead of implementing the delegate trait.
#[derive(Debug, Clone)]
pub struct ChannelDelegate {
    events: Sender<GatewayEvent>,
}

impl ChannelDelegate {
    pub fn new() -> (Self, EventReceiver) {
        let (events, rx) = unbounded();
        (Self { events }, EventReceiver { rx })
    }

    fn emit(&self, event: GatewayEvent) {
        // Receiver dropped means nobody is listening anymore
        let _ = self.events.send(event);
    }
}

impl GatewayDelegate for ChannelDelegate {
    fn on_shard_connected(&self, shard: u32) {
        self.emit(GatewayEvent::ShardConnected(shard));
    }

    fn on_shard_disconnected(&self, shard: u32) {
        self.emit(GatewayEvent::ShardDisconnected(shard));
    }

    fn on_dispatch(&self, event: DispatchEvent, shard: u32) {
        self.emit(GatewayEvent::Dispatch { shard, event });
    }

    fn on_hello(&self, shard: u32) {
        self.emit(GatewayEvent::Hello(shard));
    }

    fn on_fully_connected(&self) {
        self.emit(GatewayEvent::FullyConnected);
    }

    fn on_fully_disconnected(&self, reason: &str) {
        self.emit(GatewayEvent::FullyDisconnected(reason.to_string()));
    }
}

/// Receiving half of a [`ChannelDelegate`]
#[derive(Debug, Clone)]
pub struct EventReceiver {
    rx: Receiver<GatewayEvent>,
}

impl EventReceiver {
    /// Receive an event (blocking)
    pub fn recv_event(&self) -> Option<GatewayEvent> {
        self.rx.recv().ok()
    }

    /// Try to receive an event (non-blocking)
    pub fn try_recv_event(&self) -> Option<GatewayEvent> {
        self.rx.try_recv().ok()
    }

    /// Wait up to `timeout`; `None` on timeout or when all senders are gone
    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<GatewayEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}
