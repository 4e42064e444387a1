use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Lifecycle of one shard's gateway session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SessionState {
    Idle = 0,
    Connecting = 1,
    AwaitingHello = 2,
    Identifying = 3,
    Resuming = 4,
    Connected = 5,
    Closing = 6,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => SessionState::Connecting,
            2 => SessionState::AwaitingHello,
            3 => SessionState::Identifying,
            4 => SessionState::Resuming,
            5 => SessionState::Connected,
            6 => SessionState::Closing,
            _ => SessionState::Idle,
        }
    }

    /// The socket is up and accepts frames
    #[inline]
    pub fn is_open(self) -> bool {
        matches!(
            self,
            SessionState::AwaitingHello
                | SessionState::Identifying
                | SessionState::Resuming
                | SessionState::Connected
        )
    }
}

/// Session state readable from any thread, written only by the session
#[derive(Debug)]
pub struct AtomicSessionState(AtomicU8);

impl AtomicSessionState {
    pub fn new(state: SessionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    #[inline]
    pub fn get(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set(&self, state: SessionState) {
        self.0.store(state as u8, Ordering::Release);
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.get() == SessionState::Connected
    }
}

impl Default for AtomicSessionState {
    fn default() -> Self {
        Self::new(SessionState::Idle)
    }
}

/// Per-shard counters
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    frames_sent: AtomicU64,
    frames_received: AtomicU64,
    reconnects: AtomicU64,
}

/// Point-in-time copy of [`AtomicMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardMetrics {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub reconnects: u64,
    pub state: SessionState,
}

impl AtomicMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn increment_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_reconnects(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, state: SessionState) -> ShardMetrics {
        ShardMetrics {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            state,
        }
    }
}
