//! REST rate limiter
//!
//! Every REST call goes through [`RateLimiter::execute`]. Each
//! [`BucketKey`] has a budget (`limit`/`remaining`/reset time). Calls that
//! find the budget spent wait in the bucket's FIFO queue and are replayed
//! when the bucket resets.
//!
//! All accounting happens under one mutex; HTTP exchanges and callbacks run
//! outside it, on spawned tokio tasks. Must be used from within a tokio
//! runtime.

use crate::bucket::{Bucket, BucketSnapshot, RateLimitHeaders, DEFAULT_RESET_WINDOW};
use crate::error::{RestError, Result};
use crate::route::BucketKey;
use crate::transport::{RestRequest, RestResponse, RestTransport};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Receives the outcome of an executed call, exactly once
pub type Callback = Box<dyn FnOnce(Result<RestResponse>) + Send>;

struct Pending {
    request: RestRequest,
    callback: Callback,
}

enum Admission {
    Send(Pending),
    Reject(Callback),
    Queued,
}

struct Inner<T> {
    transport: T,
    buckets: Mutex<HashMap<BucketKey, Bucket<Pending>>>,
    fail_fast: bool,
}

// TODO: honor the global rate limit (429 with `x-ratelimit-global`) by pausing every bucket
pub struct RateLimiter<T: RestTransport> {
    inner: Arc<Inner<T>>,
}

impl<T: RestTransport> Clone for RateLimiter<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: RestTransport> RateLimiter<T> {
    pub fn new(transport: T) -> Self {
        Self::with_fail_fast(transport, false)
    }

    /// With `fail_fast`, calls against a spent bucket are answered with
    /// [`RestError::RateLimited`] instead of being queued
    pub fn with_fail_fast(transport: T, fail_fast: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                buckets: Mutex::new(HashMap::new()),
                fail_fast,
            }),
        }
    }

    pub fn is_fail_fast(&self) -> bool {
        self.inner.fail_fast
    }

    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    /// Send `request` now if `key` has budget, otherwise queue it
    pub fn execute(&self, request: RestRequest, key: BucketKey, callback: Callback) {
        let admission = {
            let mut buckets = self.inner.buckets.lock();
            let now = Instant::now();
            let bucket = buckets.entry(key).or_insert_with(|| Bucket::new(now));

            if !bucket.at_limit() {
                bucket.remaining -= 1.0;
                debug!(
                    "Bucket {}: sending {} {}, {} remaining",
                    key, request.method, request.url, bucket.remaining
                );
                Admission::Send(Pending { request, callback })
            } else if self.inner.fail_fast {
                Admission::Reject(callback)
            } else {
                bucket.queue.push_back(Pending { request, callback });
                debug!(
                    "Bucket {} at limit, {} request(s) queued",
                    key,
                    bucket.queue.len()
                );
                ensure_reset(&self.inner, key, bucket);
                Admission::Queued
            }
        };

        match admission {
            Admission::Send(pending) => dispatch(&self.inner, key, pending),
            Admission::Reject(callback) => {
                debug!("Bucket {} at limit, failing fast", key);
                callback(Err(RestError::RateLimited));
            }
            Admission::Queued => {}
        }
    }

    /// [`RateLimiter::execute`] as a future
    pub async fn request(&self, request: RestRequest, key: BucketKey) -> Result<RestResponse> {
        let (tx, rx) = oneshot::channel();
        self.execute(
            request,
            key,
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        );
        rx.await
            .map_err(|_| RestError::Transport("request dropped before completion".into()))?
    }

    pub fn bucket_snapshot(&self, key: &BucketKey) -> Option<BucketSnapshot> {
        let now = Instant::now();
        self.inner
            .buckets
            .lock()
            .get(key)
            .map(|bucket| bucket.snapshot(now))
    }

    pub fn queued_len(&self, key: &BucketKey) -> usize {
        self.inner
            .buckets
            .lock()
            .get(key)
            .map_or(0, |bucket| bucket.queue.len())
    }

    pub fn bucket_count(&self) -> usize {
        self.inner.buckets.lock().len()
    }
}

fn dispatch<T: RestTransport>(inner: &Arc<Inner<T>>, key: BucketKey, pending: Pending) {
    let inner = Arc::clone(inner);
    tokio::spawn(async move {
        let result = inner.transport.perform(&pending.request).await;
        on_response(&inner, key, pending, result);
    });
}

fn on_response<T: RestTransport>(
    inner: &Arc<Inner<T>>,
    key: BucketKey,
    pending: Pending,
    result: Result<RestResponse>,
) {
    let now = Instant::now();
    let completed = {
        let mut buckets = inner.buckets.lock();
        let bucket = buckets.entry(key).or_insert_with(|| Bucket::new(now));

        let completed = match result {
            Ok(response) if response.is_rate_limited() => {
                let retry_after = RateLimitHeaders::retry_after(&response);
                if let Some(retry_after) = retry_after {
                    bucket.reset_at = now + retry_after;
                    bucket.remaining = 0.0;
                }
                warn!(
                    "Bucket {}: 429 on {}, requeued (retry after {:?})",
                    key, pending.request.url, retry_after
                );
                bucket.queue.push_back(pending);
                None
            }
            Ok(response) => {
                if let Some(headers) = RateLimitHeaders::parse(&response) {
                    bucket.update(&headers, now);
                    debug!(
                        "Bucket {}: limit {}, remaining {}, reset in {:?}",
                        key, headers.limit, headers.remaining, headers.reset_after
                    );
                }
                Some((pending.callback, Ok(response)))
            }
            Err(e) => {
                warn!("Bucket {}: {} failed: {}", key, pending.request.url, e);
                Some((pending.callback, Err(e)))
            }
        };

        ensure_reset(inner, key, bucket);
        completed
    };

    if let Some((callback, result)) = completed {
        callback(result);
    }
}

/// Keep exactly one reset timer per bucket, firing no later than `reset_at`
fn ensure_reset<T: RestTransport>(
    inner: &Arc<Inner<T>>,
    key: BucketKey,
    bucket: &mut Bucket<Pending>,
) {
    if let Some(deadline) = bucket.reset_deadline {
        // A later reset_at is picked up when the live timer wakes
        if deadline <= bucket.reset_at {
            return;
        }
    }

    let deadline = bucket.reset_at;
    bucket.reset_deadline = Some(deadline);
    tokio::spawn(run_reset(Arc::clone(inner), key, deadline));
}

async fn run_reset<T: RestTransport>(inner: Arc<Inner<T>>, key: BucketKey, mut deadline: Instant) {
    loop {
        tokio::time::sleep_until(deadline).await;

        let admitted = {
            let mut buckets = inner.buckets.lock();
            let Some(bucket) = buckets.get_mut(&key) else {
                return;
            };
            if bucket.reset_deadline != Some(deadline) {
                // Superseded by an earlier timer
                return;
            }
            if bucket.reset_at > deadline {
                deadline = bucket.reset_at;
                bucket.reset_deadline = Some(deadline);
                continue;
            }

            bucket.reset_deadline = None;
            let admitted = bucket.refill();
            debug!(
                "Bucket {} reset: replaying {}, {} still queued",
                key,
                admitted.len(),
                bucket.queue.len()
            );

            if admitted.is_empty() && !bucket.queue.is_empty() {
                bucket.reset_at = Instant::now() + DEFAULT_RESET_WINDOW;
                ensure_reset(&inner, key, bucket);
            }
            admitted
        };

        for pending in admitted {
            dispatch(&inner, key, pending);
        }
        return;
    }
}
