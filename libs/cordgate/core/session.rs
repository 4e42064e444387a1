//! Per-shard gateway session
//!
//! A [`GatewaySession`] owns one shard's connection lifecycle:
//!
//! ```text
//! Idle -> Connecting -> AwaitingHello -> Identifying | Resuming -> Connected -> Closing -> Idle
//! ```
//!
//! All inputs (transport events, timer ticks, caller commands) arrive as
//! [`SessionInput`] on one crossbeam mailbox and are handled by a single
//! thread, so session state never needs a lock. Timers only post ticks into
//! the mailbox; stale ticks are recognised by the generation or epoch they
//! carry.

use crate::core::config::GatewayConfig;
use crate::core::connection_state::{AtomicMetrics, AtomicSessionState, SessionState, ShardMetrics};
use crate::protocol::{
    CloseCode, CloseReason, DispatchEvent, GatewayCommand, GatewayMessage, IdentifyPayload,
    ResumePayload,
};
use crate::traits::{
    GatewayError, GatewayTransport, Result, Scheduler, ShardDelegate, TimerHandle,
    TransportEvent, TransportSink,
};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Acks we may be owed before the connection is considered dead
const MAX_MISSED_ACKS: u32 = 2;

/// Normal closure, tells the server the session is over
const CLOSE_NORMAL: u16 = 1000;

/// Everything a session reacts to
#[derive(Debug)]
pub enum SessionInput {
    Connect,
    Disconnect,
    Send(GatewayCommand),
    Transport { socket: u64, event: TransportEvent },
    HeartbeatTick { generation: u64 },
    ResumeTick { epoch: u64 },
    Shutdown,
}

pub struct GatewaySession {
    shard: u32,
    total_shards: u32,
    config: Arc<GatewayConfig>,
    transport: Box<dyn GatewayTransport>,
    scheduler: Arc<dyn Scheduler>,
    delegate: Arc<dyn ShardDelegate>,
    mailbox: Sender<SessionInput>,
    state: Arc<AtomicSessionState>,
    metrics: Arc<AtomicMetrics>,

    session_id: Option<String>,
    resume_url: Option<String>,
    last_sequence: Option<u64>,
    heartbeat_interval: Duration,
    missed_acks: u32,
    generation: u64,
    socket: u64,
    heartbeat_timer: Option<TimerHandle>,

    /// Set by an explicit disconnect; suppresses automatic resume
    closed: bool,
    /// A resume loop is active
    resuming: bool,
    resume_epoch: u64,
    resume_attempt: usize,
    resume_exhausted: bool,
    resume_timer: Option<TimerHandle>,
}

impl GatewaySession {
    pub fn new(
        shard: u32,
        total_shards: u32,
        config: Arc<GatewayConfig>,
        transport: Box<dyn GatewayTransport>,
        scheduler: Arc<dyn Scheduler>,
        delegate: Arc<dyn ShardDelegate>,
    ) -> (Self, Receiver<SessionInput>) {
        let (mailbox, inbox) = unbounded();

        let session = Self {
            shard,
            total_shards,
            config,
            transport,
            scheduler,
            delegate,
            mailbox,
            state: Arc::new(AtomicSessionState::default()),
            metrics: Arc::new(AtomicMetrics::new()),
            session_id: None,
            resume_url: None,
            last_sequence: None,
            heartbeat_interval: Duration::ZERO,
            missed_acks: 0,
            generation: 0,
            socket: 0,
            heartbeat_timer: None,
            closed: false,
            resuming: false,
            resume_epoch: 0,
            resume_attempt: 0,
            resume_exhausted: false,
            resume_timer: None,
        };

        (session, inbox)
    }

    pub fn shard(&self) -> u32 {
        self.shard
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn last_sequence(&self) -> Option<u64> {
        self.last_sequence
    }

    pub fn missed_heartbeat_acks(&self) -> u32 {
        self.missed_acks
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    pub fn is_resuming(&self) -> bool {
        self.resuming
    }

    /// Caller-facing handle sharing this session's mailbox and state
    pub fn handle(&self) -> ShardHandle {
        ShardHandle {
            shard: self.shard,
            mailbox: self.mailbox.clone(),
            state: Arc::clone(&self.state),
            metrics: Arc::clone(&self.metrics),
        }
    }

    /// Run the session on a dedicated thread until [`SessionInput::Shutdown`]
    pub fn spawn(self, inbox: Receiver<SessionInput>) -> Result<(ShardHandle, JoinHandle<()>)> {
        let handle = self.handle();
        let name = format!("shard-{}", self.shard);

        let thread = std::thread::Builder::new()
            .name(name)
            .spawn(move || self.run(inbox))
            .map_err(|e| GatewayError::Other(format!("failed to spawn shard thread: {}", e)))?;

        Ok((handle, thread))
    }

    fn run(mut self, inbox: Receiver<SessionInput>) {
        debug!("[shard {}] session thread started", self.shard);
        while let Ok(input) = inbox.recv() {
            if !self.process(input) {
                break;
            }
        }
        debug!("[shard {}] session thread exiting", self.shard);
    }

    /// Handle one input. Returns `false` once the session has shut down.
    pub fn process(&mut self, input: SessionInput) -> bool {
        match input {
            SessionInput::Connect => self.connect(),
            SessionInput::Disconnect => self.disconnect(),
            SessionInput::Send(command) => {
                if !self.state.get().is_open() {
                    warn!(
                        "[shard {}] dropping {} sent while {:?}",
                        self.shard,
                        command.opcode(),
                        self.state.get()
                    );
                } else if let Err(e) = self.write(&command) {
                    warn!("[shard {}] send failed: {}", self.shard, e);
                }
            }
            SessionInput::Transport { socket, event } => self.on_transport_event(socket, event),
            SessionInput::HeartbeatTick { generation } => self.heartbeat(generation),
            SessionInput::ResumeTick { epoch } => self.resume_tick(epoch),
            SessionInput::Shutdown => {
                self.shutdown();
                return false;
            }
        }
        true
    }

    fn connect(&mut self) {
        self.closed = false;
        self.open_transport();
    }

    fn open_transport(&mut self) {
        let state = self.state.get();
        if state != SessionState::Idle {
            debug!("[shard {}] connect ignored while {:?}", self.shard, state);
            return;
        }

        self.socket += 1;
        self.state.set(SessionState::Connecting);

        let base = self
            .resume_url
            .clone()
            .filter(|_| self.session_id.is_some())
            .unwrap_or_else(|| self.config.gateway_url.clone());
        let url = self.config.connect_url(&base);
        info!("[shard {}] connecting to {}", self.shard, url);

        let sink = TransportSink::new(self.socket, self.mailbox.clone());
        if let Err(e) = self.transport.open(&url, sink) {
            warn!("[shard {}] failed to open transport: {}", self.shard, e);
            self.on_transport_close(CloseReason::transport_error(e.to_string()));
        }
    }

    fn disconnect(&mut self) {
        let was_resuming = self.resuming;
        self.closed = true;
        self.stop_resume();
        self.cancel_heartbeat();

        match self.state.get() {
            SessionState::Idle => {
                if was_resuming {
                    info!("[shard {}] disconnected while resuming", self.shard);
                    self.delegate.shard_disconnected(self.shard);
                } else {
                    debug!("[shard {}] disconnect while idle", self.shard);
                }
            }
            SessionState::Closing => {
                debug!("[shard {}] close already in progress", self.shard);
            }
            state => {
                info!("[shard {}] disconnecting from {:?}", self.shard, state);
                self.transport.close(CLOSE_NORMAL);
                self.state.set(SessionState::Closing);
            }
        }
    }

    fn shutdown(&mut self) {
        self.closed = true;
        self.stop_resume();
        self.cancel_heartbeat();
        if self.state.get() != SessionState::Idle {
            self.transport.close(CLOSE_NORMAL);
            self.state.set(SessionState::Idle);
        }
    }

    fn on_transport_event(&mut self, socket: u64, event: TransportEvent) {
        if socket != self.socket {
            debug!(
                "[shard {}] ignoring {:?} from stale socket {} (current {})",
                self.shard, event, socket, self.socket
            );
            return;
        }

        match event {
            TransportEvent::Opened => {
                if self.state.get() == SessionState::Connecting {
                    debug!("[shard {}] transport open, awaiting hello", self.shard);
                    self.state.set(SessionState::AwaitingHello);
                }
            }
            TransportEvent::Text(text) => {
                self.metrics.increment_received();
                if !self.state.get().is_open() {
                    debug!("[shard {}] frame ignored while {:?}", self.shard, self.state.get());
                    return;
                }
                match GatewayMessage::decode(&text) {
                    Ok(message) => self.on_message(message),
                    Err(e) => warn!("[shard {}] dropping undecodable frame: {}", self.shard, e),
                }
            }
            TransportEvent::Closed(reason) => self.on_transport_close(reason),
        }
    }

    fn on_message(&mut self, message: GatewayMessage) {
        match message {
            GatewayMessage::Hello { heartbeat_interval } => {
                self.on_hello(Duration::from_millis(heartbeat_interval))
            }
            GatewayMessage::Dispatch(event) => self.on_dispatch(event),
            GatewayMessage::HeartbeatRequest => {
                debug!("[shard {}] server requested heartbeat", self.shard);
                self.send_heartbeat();
            }
            GatewayMessage::HeartbeatAck => {
                self.missed_acks = 0;
            }
            GatewayMessage::InvalidSession { resumable } => {
                warn!(
                    "[shard {}] invalid session (resumable: {})",
                    self.shard, resumable
                );
                if !resumable {
                    self.clear_session();
                }
                self.stop_resume();
                self.start_handshake();
            }
            GatewayMessage::Reconnect => {
                info!("[shard {}] server requested reconnect", self.shard);
                self.force_close(CloseCode::UnknownError.as_u16());
            }
        }
    }

    fn on_hello(&mut self, interval: Duration) {
        debug!("[shard {}] hello, heartbeat every {:?}", self.shard, interval);
        self.heartbeat_interval = interval;
        self.missed_acks = 0;
        self.generation += 1;
        self.start_heartbeat();
        self.delegate.shard_hello(self.shard, interval);
        self.start_handshake();
    }

    fn start_handshake(&mut self) {
        let command = match &self.session_id {
            Some(session_id) => {
                info!(
                    "[shard {}] resuming session {} at seq {:?}",
                    self.shard, session_id, self.last_sequence
                );
                self.state.set(SessionState::Resuming);
                GatewayCommand::Resume(ResumePayload {
                    token: self.config.token.clone(),
                    session_id: session_id.clone(),
                    seq: self.last_sequence.unwrap_or(0),
                })
            }
            None => {
                info!("[shard {}] identifying", self.shard);
                self.state.set(SessionState::Identifying);
                GatewayCommand::Identify(IdentifyPayload {
                    token: self.config.token.clone(),
                    intents: self.config.intents,
                    properties: self.config.properties.clone(),
                    compress: false,
                    large_threshold: self.config.large_threshold,
                    shard: [self.shard, self.total_shards],
                })
            }
        };

        if let Err(e) = self.write(&command) {
            warn!("[shard {}] handshake send failed: {}", self.shard, e);
        }
    }

    fn on_dispatch(&mut self, event: DispatchEvent) {
        let state = self.state.get();

        if event.is_ready() && state == SessionState::Identifying {
            match event.ready_info() {
                Ok(ready) => {
                    info!("[shard {}] ready, session {}", self.shard, ready.session_id);
                    self.session_id = Some(ready.session_id);
                    self.resume_url = ready.resume_gateway_url;
                    // A new session restarts the sequence counter
                    self.last_sequence = event.seq;
                    self.state.set(SessionState::Connected);
                    self.stop_resume();
                    self.delegate.shard_connected(self.shard);
                }
                Err(e) => warn!("[shard {}] malformed READY: {}", self.shard, e),
            }
        } else if event.is_resumed() && state == SessionState::Resuming {
            info!("[shard {}] resumed", self.shard);
            self.missed_acks = 0;
            self.state.set(SessionState::Connected);
            self.stop_resume();
            self.bump_sequence(event.seq);
        } else {
            self.bump_sequence(event.seq);
        }

        self.delegate.shard_dispatch(self.shard, event);
    }

    fn bump_sequence(&mut self, seq: Option<u64>) {
        if let Some(seq) = seq {
            self.last_sequence = Some(self.last_sequence.map_or(seq, |last| last.max(seq)));
        }
    }

    fn start_heartbeat(&mut self) {
        self.cancel_heartbeat();
        if self.heartbeat_interval.is_zero() {
            warn!("[shard {}] zero heartbeat interval, not scheduling", self.shard);
            return;
        }

        let generation = self.generation;
        let mailbox = self.mailbox.clone();
        let timer = self.scheduler.every(
            self.heartbeat_interval,
            Box::new(move || {
                let _ = mailbox.send(SessionInput::HeartbeatTick { generation });
            }),
        );
        self.heartbeat_timer = Some(timer);
    }

    fn cancel_heartbeat(&mut self) {
        if let Some(timer) = self.heartbeat_timer.take() {
            timer.cancel();
        }
    }

    fn heartbeat(&mut self, generation: u64) {
        if generation != self.generation {
            debug!(
                "[shard {}] stale heartbeat from generation {} (current {})",
                self.shard, generation, self.generation
            );
            return;
        }
        if !self.state.get().is_open() {
            return;
        }

        if self.missed_acks >= MAX_MISSED_ACKS {
            warn!(
                "[shard {}] {} heartbeats unacknowledged, dropping connection",
                self.shard, self.missed_acks
            );
            self.missed_acks = 0;
            self.force_close(CloseCode::UnknownError.as_u16());
            return;
        }

        self.missed_acks += 1;
        self.send_heartbeat();
    }

    fn send_heartbeat(&mut self) {
        if let Err(e) = self.write(&GatewayCommand::Heartbeat(self.last_sequence)) {
            warn!("[shard {}] heartbeat send failed: {}", self.shard, e);
        }
    }

    fn write(&mut self, command: &GatewayCommand) -> Result<()> {
        let text = command.encode()?;
        self.transport.send(text)?;
        self.metrics.increment_sent();
        Ok(())
    }

    /// Drop the socket without ending the session; recovery follows the close
    fn force_close(&mut self, code: u16) {
        self.cancel_heartbeat();
        match self.state.get() {
            SessionState::Idle | SessionState::Closing => {}
            _ => {
                self.transport.close(code);
                self.state.set(SessionState::Closing);
            }
        }
    }

    fn clear_session(&mut self) {
        self.session_id = None;
        self.resume_url = None;
    }

    fn on_transport_close(&mut self, reason: CloseReason) {
        self.cancel_heartbeat();
        self.state.set(SessionState::Idle);

        if reason.invalidates_session() {
            info!("[shard {}] session invalidated by close: {}", self.shard, reason);
            self.clear_session();
        }
        if reason.is_fatal() {
            error!("[shard {}] gateway refused connection: {}", self.shard, reason);
        }

        if self.closed {
            info!("[shard {}] disconnected: {}", self.shard, reason);
            self.delegate.shard_disconnected(self.shard);
            return;
        }

        warn!("[shard {}] connection lost: {}", self.shard, reason);
        if self.resuming && self.resume_exhausted {
            self.give_up();
            return;
        }
        self.start_resume();
    }

    fn start_resume(&mut self) {
        if self.resuming || self.closed {
            return;
        }

        self.resuming = true;
        self.resume_exhausted = false;
        self.resume_epoch += 1;
        self.resume_attempt = 0;
        self.metrics.increment_reconnects();

        self.open_transport();
        if self.resuming && !self.closed {
            self.schedule_resume_tick();
        }
    }

    fn schedule_resume_tick(&mut self) {
        match self.config.reconnect_strategy.next_delay(self.resume_attempt) {
            Some(delay) => {
                let epoch = self.resume_epoch;
                let mailbox = self.mailbox.clone();
                debug!("[shard {}] next resume check in {:?}", self.shard, delay);
                let timer = self.scheduler.after(
                    delay,
                    Box::new(move || {
                        let _ = mailbox.send(SessionInput::ResumeTick { epoch });
                    }),
                );
                self.resume_timer = Some(timer);
            }
            None if self.state.get() == SessionState::Idle => self.give_up(),
            None => self.resume_exhausted = true,
        }
    }

    fn resume_tick(&mut self, epoch: u64) {
        if epoch != self.resume_epoch || !self.resuming || self.closed {
            return;
        }

        self.resume_attempt += 1;
        match self.state.get() {
            SessionState::Connected => {
                self.stop_resume();
                return;
            }
            SessionState::Idle => {
                info!(
                    "[shard {}] resume attempt {}",
                    self.shard, self.resume_attempt
                );
                self.metrics.increment_reconnects();
                self.open_transport();
            }
            state => debug!("[shard {}] previous attempt still {:?}", self.shard, state),
        }

        if self.resuming && !self.closed {
            self.schedule_resume_tick();
        }
    }

    fn stop_resume(&mut self) {
        self.resuming = false;
        self.resume_exhausted = false;
        if let Some(timer) = self.resume_timer.take() {
            timer.cancel();
        }
    }

    fn give_up(&mut self) {
        error!(
            "[shard {}] reconnection strategy exhausted, giving up",
            self.shard
        );
        self.stop_resume();
        self.closed = true;
        self.delegate.shard_disconnected(self.shard);
    }
}

/// Thread-safe handle to a running session
#[derive(Debug, Clone)]
pub struct ShardHandle {
    shard: u32,
    mailbox: Sender<SessionInput>,
    state: Arc<AtomicSessionState>,
    metrics: Arc<AtomicMetrics>,
}

impl ShardHandle {
    pub fn shard(&self) -> u32 {
        self.shard
    }

    pub fn connect(&self) -> Result<()> {
        self.post(SessionInput::Connect)
    }

    pub fn disconnect(&self) -> Result<()> {
        self.post(SessionInput::Disconnect)
    }

    /// Queue a command; fails immediately if the socket is not open
    pub fn send(&self, command: GatewayCommand) -> Result<()> {
        if !self.state.get().is_open() {
            return Err(GatewayError::NotConnected(self.shard));
        }
        self.post(SessionInput::Send(command))
    }

    pub fn shutdown(&self) -> Result<()> {
        self.post(SessionInput::Shutdown)
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub fn metrics(&self) -> ShardMetrics {
        self.metrics.snapshot(self.state.get())
    }

    fn post(&self, input: SessionInput) -> Result<()> {
        self.mailbox
            .send(input)
            .map_err(|e| GatewayError::ChannelSend(e.to_string()))
    }
}
