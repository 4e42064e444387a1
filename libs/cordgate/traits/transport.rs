use crate::core::session::SessionInput;
use crate::protocol::CloseReason;
use crate::traits::Result;
use crossbeam_channel::Sender;

/// Something a transport reports back to its session
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Opened,
    Text(String),
    Closed(CloseReason),
}

/// Callback surface handed to a transport on every `open`
///
/// Events are tagged with the socket id they were opened under, so a
/// session can tell a late event from an old socket apart from the live one.
#[derive(Debug, Clone)]
pub struct TransportSink {
    socket: u64,
    mailbox: Sender<SessionInput>,
}

impl TransportSink {
    pub(crate) fn new(socket: u64, mailbox: Sender<SessionInput>) -> Self {
        Self { socket, mailbox }
    }

    pub fn socket(&self) -> u64 {
        self.socket
    }

    pub fn opened(&self) {
        self.emit(TransportEvent::Opened);
    }

    pub fn text(&self, text: impl Into<String>) {
        self.emit(TransportEvent::Text(text.into()));
    }

    /// Must be called exactly once per `open`, whatever the outcome
    pub fn closed(&self, reason: CloseReason) {
        self.emit(TransportEvent::Closed(reason));
    }

    fn emit(&self, event: TransportEvent) {
        // The session may already be gone; nothing left to notify.
        let _ = self.mailbox.send(SessionInput::Transport {
            socket: self.socket,
            event,
        });
    }
}

/// Gateway socket capability consumed by a session
///
/// One transport instance serves one shard. Opening a new socket replaces
/// the previous one.
pub trait GatewayTransport: Send {
    /// Start opening `url`. Outcome is reported through `sink`.
    fn open(&mut self, url: &str, sink: TransportSink) -> Result<()>;

    /// Queue a text frame on the open socket
    fn send(&mut self, text: String) -> Result<()>;

    /// Close the socket with a WebSocket close code
    fn close(&mut self, code: u16);
}
