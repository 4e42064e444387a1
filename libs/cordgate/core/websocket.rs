//! tokio-tungstenite backed [`GatewayTransport`]
//!
//! Each `open` spawns one socket task on the runtime. The task owns the
//! stream, forwards text frames to the session through its
//! [`TransportSink`], and writes whatever the session queues on an
//! unbounded channel. It always reports exactly one close before exiting.

use crate::protocol::CloseReason;
use crate::traits::{GatewayError, GatewayTransport, Result, TransportSink};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, warn};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
enum Outbound {
    Text(String),
    Close(u16),
}

pub struct TungsteniteTransport {
    runtime: Handle,
    connect_timeout: Duration,
    outbound: Option<UnboundedSender<Outbound>>,
}

impl TungsteniteTransport {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            outbound: None,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl GatewayTransport for TungsteniteTransport {
    fn open(&mut self, url: &str, sink: TransportSink) -> Result<()> {
        if let Some(previous) = self.outbound.take() {
            let _ = previous.send(Outbound::Close(1000));
        }

        let (tx, rx) = unbounded_channel();
        self.outbound = Some(tx);

        let url = url.to_string();
        let timeout = self.connect_timeout;
        self.runtime.spawn(async move {
            run_socket(url, timeout, rx, sink).await;
        });
        Ok(())
    }

    fn send(&mut self, text: String) -> Result<()> {
        let outbound = self
            .outbound
            .as_ref()
            .ok_or_else(|| GatewayError::ConnectionClosed("no open socket".into()))?;
        outbound
            .send(Outbound::Text(text))
            .map_err(|_| GatewayError::ConnectionClosed("socket task ended".into()))
    }

    fn close(&mut self, code: u16) {
        if let Some(outbound) = self.outbound.take() {
            let _ = outbound.send(Outbound::Close(code));
        }
    }
}

async fn run_socket(
    url: String,
    timeout: Duration,
    mut outbound: UnboundedReceiver<Outbound>,
    sink: TransportSink,
) {
    let connect = tokio::time::timeout(timeout, connect_async(url.as_str()));
    tokio::pin!(connect);

    let ws_stream = loop {
        tokio::select! {
            result = &mut connect => match result {
                Ok(Ok((stream, _))) => break stream,
                Ok(Err(e)) => {
                    error!("Failed to connect to {}: {}", url, e);
                    sink.closed(CloseReason::transport_error(e.to_string()));
                    return;
                }
                Err(_) => {
                    error!("Connecting to {} timed out after {:?}", url, timeout);
                    sink.closed(CloseReason::transport_error("connect timed out"));
                    return;
                }
            },
            command = outbound.recv() => match command {
                Some(Outbound::Text(_)) => debug!("Dropping frame queued before socket opened"),
                Some(Outbound::Close(code)) => {
                    sink.closed(CloseReason::new(Some(code), "closed before open"));
                    return;
                }
                None => {
                    sink.closed(CloseReason::new(Some(1000), "closed before open"));
                    return;
                }
            },
        }
    };

    debug!("Socket {} open to {}", sink.socket(), url);
    sink.opened();

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => sink.text(text),
                Some(Ok(Message::Close(frame))) => {
                    let reason = match frame {
                        Some(frame) => CloseReason::new(Some(u16::from(frame.code)), frame.reason.to_string()),
                        None => CloseReason::new(None, "closed without frame"),
                    };
                    debug!("Server closed socket {}: {}", sink.socket(), reason);
                    sink.closed(reason);
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket error: {}", e);
                    sink.closed(CloseReason::transport_error(e.to_string()));
                    return;
                }
                None => {
                    warn!("WebSocket stream closed");
                    sink.closed(CloseReason::transport_error("stream ended"));
                    return;
                }
            },
            command = outbound.recv() => match command {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = write.send(Message::Text(text)).await {
                        warn!("Failed to write frame: {}", e);
                        sink.closed(CloseReason::transport_error(e.to_string()));
                        return;
                    }
                }
                Some(Outbound::Close(code)) => {
                    let frame = CloseFrame {
                        code: WsCloseCode::from(code),
                        reason: "".into(),
                    };
                    let _ = write.send(Message::Close(Some(frame))).await;
                    sink.closed(CloseReason::new(Some(code), "closed by client"));
                    return;
                }
                None => {
                    let _ = write.close().await;
                    sink.closed(CloseReason::new(Some(1000), "transport dropped"));
                    return;
                }
            },
        }
    }
}
