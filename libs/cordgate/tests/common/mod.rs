//! Common test utilities for cordgate integration tests
//!
//! A scripted in-memory transport, a recording delegate and a harness that
//! drives one session synchronously on the test thread.

#![allow(dead_code, unused_macros)]

use cordgate::core::config::GatewayConfig;
use cordgate::protocol::{CloseReason, DispatchEvent, Token};
use cordgate::traits::{
    GatewayDelegate, GatewayError, GatewayTransport, Result, ShardDelegate, TransportSink,
};
use cordgate::{GatewaySession, ManualScheduler, SessionInput};
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

#[derive(Default)]
struct MockState {
    opens: Vec<String>,
    sent: Vec<String>,
    closes: Vec<u16>,
    sink: Option<TransportSink>,
    fail_open: bool,
    /// Answer open/identify/resume like a healthy server would
    auto_handshake: bool,
    shard: u32,
}

/// Test-side view of a [`MockTransport`]
#[derive(Clone, Default)]
pub struct MockHandle(Arc<Mutex<MockState>>);

impl MockHandle {
    pub fn auto(shard: u32) -> Self {
        let handle = MockHandle::default();
        {
            let mut state = handle.0.lock();
            state.auto_handshake = true;
            state.shard = shard;
        }
        handle
    }

    pub fn transport(&self) -> Box<dyn GatewayTransport> {
        Box::new(MockTransport(self.clone()))
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.0.lock().fail_open = fail;
    }

    pub fn opens(&self) -> Vec<String> {
        self.0.lock().opens.clone()
    }

    pub fn closes(&self) -> Vec<u16> {
        self.0.lock().closes.clone()
    }

    pub fn sent(&self) -> Vec<Value> {
        self.0
            .lock()
            .sent
            .iter()
            .map(|text| serde_json::from_str(text).unwrap())
            .collect()
    }

    pub fn sent_ops(&self) -> Vec<u64> {
        self.sent().iter().map(|frame| frame["op"].as_u64().unwrap()).collect()
    }

    pub fn last_sent(&self) -> Option<Value> {
        self.sent().pop()
    }

    fn sink(&self) -> TransportSink {
        self.0.lock().sink.clone().expect("no socket opened")
    }

    pub fn open_ok(&self) {
        self.sink().opened();
    }

    pub fn server_text(&self, frame: Value) {
        self.sink().text(frame.to_string());
    }

    pub fn server_raw(&self, text: &str) {
        self.sink().text(text);
    }

    pub fn hello(&self, interval_ms: u64) {
        self.server_text(json!({"op": 10, "d": {"heartbeat_interval": interval_ms}}));
    }

    pub fn ready(&self, session_id: &str, seq: u64) {
        self.server_text(json!({
            "op": 0, "s": seq, "t": "READY",
            "d": {"session_id": session_id, "resume_gateway_url": "wss://resume.example"}
        }));
    }

    pub fn dispatch(&self, name: &str, seq: u64) {
        self.server_text(json!({"op": 0, "s": seq, "t": name, "d": {}}));
    }

    /// Server closes the socket with `code`
    pub fn server_close(&self, code: u16) {
        if let Some(sink) = self.0.lock().sink.take() {
            sink.closed(CloseReason::new(Some(code), "server closed"));
        }
    }

    /// Socket dies without a close frame
    pub fn drop_connection(&self) {
        if let Some(sink) = self.0.lock().sink.take() {
            sink.closed(CloseReason::transport_error("connection reset"));
        }
    }
}

pub struct MockTransport(MockHandle);

impl GatewayTransport for MockTransport {
    fn open(&mut self, url: &str, sink: TransportSink) -> Result<()> {
        let mut state = self.0 .0.lock();
        state.opens.push(url.to_string());
        if state.fail_open {
            return Err(GatewayError::WebSocket("connection refused".into()));
        }
        if state.auto_handshake {
            sink.opened();
            sink.text(json!({"op": 10, "d": {"heartbeat_interval": 45000}}).to_string());
        }
        state.sink = Some(sink);
        Ok(())
    }

    fn send(&mut self, text: String) -> Result<()> {
        let mut state = self.0 .0.lock();
        let sink = state
            .sink
            .clone()
            .ok_or_else(|| GatewayError::ConnectionClosed("no socket".into()))?;

        if state.auto_handshake {
            let frame: Value = serde_json::from_str(&text).unwrap();
            match frame["op"].as_u64() {
                Some(2) => sink.text(
                    json!({"op": 0, "s": 1, "t": "READY",
                           "d": {"session_id": format!("session-{}", state.shard)}})
                    .to_string(),
                ),
                Some(6) => sink.text(json!({"op": 0, "s": 2, "t": "RESUMED", "d": {}}).to_string()),
                _ => {}
            }
        }

        state.sent.push(text);
        Ok(())
    }

    fn close(&mut self, code: u16) {
        let mut state = self.0 .0.lock();
        state.closes.push(code);
        if let Some(sink) = state.sink.take() {
            sink.closed(CloseReason::new(Some(code), "closed by client"));
        }
    }
}

/// What a delegate was told, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Connected(u32),
    Disconnected(u32),
    Hello(u32),
    Dispatch(u32, String, Option<u64>),
}

#[derive(Default)]
pub struct RecordingDelegate {
    events: Mutex<Vec<Recorded>>,
}

impl RecordingDelegate {
    pub fn events(&self) -> Vec<Recorded> {
        self.events.lock().clone()
    }

    pub fn count(&self, wanted: &Recorded) -> usize {
        self.events.lock().iter().filter(|e| *e == wanted).count()
    }

    pub fn dispatch_names(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Recorded::Dispatch(_, name, _) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }
}

impl ShardDelegate for RecordingDelegate {
    fn shard_connected(&self, shard: u32) {
        self.events.lock().push(Recorded::Connected(shard));
    }

    fn shard_disconnected(&self, shard: u32) {
        self.events.lock().push(Recorded::Disconnected(shard));
    }

    fn shard_dispatch(&self, shard: u32, event: DispatchEvent) {
        self.events
            .lock()
            .push(Recorded::Dispatch(shard, event.name, event.seq));
    }

    fn shard_hello(&self, shard: u32, _heartbeat_interval: Duration) {
        self.events.lock().push(Recorded::Hello(shard));
    }
}

impl GatewayDelegate for RecordingDelegate {}

/// One session driven on the test thread against a virtual clock
pub struct SessionHarness {
    pub session: GatewaySession,
    pub inbox: Receiver<SessionInput>,
    pub transport: MockHandle,
    pub scheduler: Arc<ManualScheduler>,
    pub delegate: Arc<RecordingDelegate>,
}

impl SessionHarness {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(configure: impl FnOnce(&mut GatewayConfig)) -> Self {
        let mut config = GatewayConfig::new(Token::bot("test-token"));
        configure(&mut config);

        let transport = MockHandle::default();
        let scheduler = Arc::new(ManualScheduler::new());
        let delegate = Arc::new(RecordingDelegate::default());
        let (session, inbox) = GatewaySession::new(
            0,
            1,
            Arc::new(config),
            transport.transport(),
            scheduler.clone(),
            delegate.clone(),
        );

        Self {
            session,
            inbox,
            transport,
            scheduler,
            delegate,
        }
    }

    /// Handle everything queued in the mailbox
    pub fn pump(&mut self) {
        while let Ok(input) = self.inbox.try_recv() {
            self.session.process(input);
        }
    }

    pub fn input(&mut self, input: SessionInput) {
        self.session.process(input);
        self.pump();
    }

    pub fn advance(&mut self, by: Duration) {
        self.scheduler.advance(by);
        self.pump();
    }

    /// Idle -> Connected with a fresh session
    pub fn connect_ready(&mut self, session_id: &str, interval_ms: u64) {
        self.input(SessionInput::Connect);
        self.transport.open_ok();
        self.transport.hello(interval_ms);
        self.pump();
        self.transport.ready(session_id, 1);
        self.pump();
    }
}

/// Transports handed out by a coordinator, by shard index
#[derive(Clone, Default)]
pub struct MockRegistry {
    handles: Arc<Mutex<HashMap<u32, MockHandle>>>,
    auto: bool,
}

impl MockRegistry {
    pub fn auto() -> Self {
        Self {
            handles: Arc::default(),
            auto: true,
        }
    }

    pub fn manual() -> Self {
        Self::default()
    }

    pub fn factory(&self) -> impl Fn(u32) -> Box<dyn GatewayTransport> + Send + Sync + 'static {
        let registry = self.clone();
        move |shard| {
            let handle = if registry.auto {
                MockHandle::auto(shard)
            } else {
                MockHandle::default()
            };
            registry.handles.lock().insert(shard, handle.clone());
            handle.transport()
        }
    }

    pub fn get(&self, shard: u32) -> MockHandle {
        self.handles.lock().get(&shard).cloned().expect("unknown shard")
    }
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
