//! Common test utilities for cordrest integration tests

#![allow(dead_code, unused_macros)]

use async_trait::async_trait;
use cordrest::{BucketKey, Callback, Method, RestError, RestRequest, RestResponse, RestTransport, Result};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// One request as the transport saw it
#[derive(Debug, Clone)]
pub struct Call {
    pub request: RestRequest,
    pub at: Instant,
}

enum Step {
    Respond(RestResponse),
    Fail(String),
}

#[derive(Default)]
struct ScriptState {
    steps: VecDeque<Step>,
    calls: Vec<Call>,
}

/// Answers requests from a script, then with bare 200s once it runs out
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    state: Arc<Mutex<ScriptState>>,
    latency: Duration,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            state: Arc::default(),
            latency,
        }
    }

    pub fn respond(&self, status: u16, headers: &[(&str, &str)]) {
        self.state
            .lock()
            .steps
            .push_back(Step::Respond(response(status, headers)));
    }

    pub fn respond_json(&self, status: u16, body: Value) {
        let mut response = response(status, &[("content-type", "application/json")]);
        response.body = body.to_string().into_bytes();
        self.state.lock().steps.push_back(Step::Respond(response));
    }

    pub fn fail(&self, message: &str) {
        self.state
            .lock()
            .steps
            .push_back(Step::Fail(message.to_string()));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.request.url).collect()
    }
}

#[async_trait]
impl RestTransport for ScriptedTransport {
    async fn perform(&self, request: &RestRequest) -> Result<RestResponse> {
        let step = {
            let mut state = self.state.lock();
            state.calls.push(Call {
                request: request.clone(),
                at: Instant::now(),
            });
            state.steps.pop_front()
        };

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match step {
            Some(Step::Respond(response)) => Ok(response),
            Some(Step::Fail(message)) => Err(RestError::Transport(message)),
            None => Ok(response(200, &[])),
        }
    }
}

pub fn response(status: u16, headers: &[(&str, &str)]) -> RestResponse {
    RestResponse {
        status,
        headers: headers
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect(),
        body: Vec::new(),
    }
}

pub fn get(path: &str) -> RestRequest {
    RestRequest::new(Method::GET, format!("https://api.test{}", path))
}

pub fn channel_key(channel: u64) -> BucketKey {
    BucketKey::from_path(&Method::GET, &format!("/channels/{}/messages", channel))
}

/// Callback that reports `(tag, outcome)` on a channel
pub fn tagged(tx: &UnboundedSender<(usize, Result<RestResponse>)>, tag: usize) -> Callback {
    let tx = tx.clone();
    Box::new(move |result| {
        let _ = tx.send((tag, result));
    })
}

pub fn ignore() -> Callback {
    Box::new(|_| {})
}
