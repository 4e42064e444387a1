//! Per-route budget accounting

use crate::transport::RestResponse;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Window assumed for a bucket the server has not described yet
pub const DEFAULT_RESET_WINDOW: Duration = Duration::from_secs(3);

/// Budget hints carried by a response
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitHeaders {
    pub limit: f64,
    pub remaining: f64,
    /// Time from now until the window resets
    pub reset_after: Duration,
}

impl RateLimitHeaders {
    /// Read `x-ratelimit-limit`, `x-ratelimit-remaining` and a reset hint
    ///
    /// `x-ratelimit-reset-after` (seconds) is preferred over the epoch based
    /// `x-ratelimit-reset`. Returns `None` unless all three are present and
    /// numeric.
    pub fn parse(response: &RestResponse) -> Option<Self> {
        let limit = number(response.header("x-ratelimit-limit")?)?;
        let remaining = number(response.header("x-ratelimit-remaining")?)?;

        let reset_after = match response.header("x-ratelimit-reset-after") {
            Some(after) => seconds(number(after)?),
            None => {
                let reset_at = number(response.header("x-ratelimit-reset")?)?;
                let now = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
                seconds(reset_at - now)
            }
        };

        Some(Self {
            limit,
            remaining,
            reset_after,
        })
    }

    /// `retry-after` on a 429, in seconds
    pub fn retry_after(response: &RestResponse) -> Option<Duration> {
        response.header("retry-after").and_then(number).map(seconds)
    }
}

fn number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn seconds(value: f64) -> Duration {
    Duration::from_secs_f64(value.max(0.0))
}

/// Point-in-time view of a bucket
#[derive(Debug, Clone, PartialEq)]
pub struct BucketSnapshot {
    pub limit: f64,
    pub remaining: f64,
    pub reset_in: Duration,
    pub queued: usize,
    pub reset_scheduled: bool,
}

/// Budget for one [`crate::BucketKey`] plus the requests waiting on it
pub(crate) struct Bucket<P> {
    pub limit: f64,
    pub remaining: f64,
    pub reset_at: Instant,
    pub queue: VecDeque<P>,
    /// Deadline of the one live reset timer, if any
    pub reset_deadline: Option<Instant>,
}

impl<P> Bucket<P> {
    /// Unknown routes start at one request per few seconds
    pub fn new(now: Instant) -> Self {
        Self {
            limit: 1.0,
            remaining: 1.0,
            reset_at: now + DEFAULT_RESET_WINDOW,
            queue: VecDeque::new(),
            reset_deadline: None,
        }
    }

    pub fn at_limit(&self) -> bool {
        self.remaining <= 0.0
    }

    pub fn update(&mut self, headers: &RateLimitHeaders, now: Instant) {
        self.limit = headers.limit;
        self.remaining = headers.remaining;
        self.reset_at = now + headers.reset_after;
    }

    /// Refill the budget and take as many queued entries as it allows
    ///
    /// Each taken entry is charged against the refilled budget. Whatever
    /// does not fit stays queued in order.
    pub fn refill(&mut self) -> Vec<P> {
        self.remaining = self.limit;
        let admit = (self.remaining.floor().max(0.0) as usize).min(self.queue.len());
        self.remaining -= admit as f64;
        self.queue.drain(..admit).collect()
    }

    pub fn snapshot(&self, now: Instant) -> BucketSnapshot {
        BucketSnapshot {
            limit: self.limit,
            remaining: self.remaining,
            reset_in: self.reset_at.saturating_duration_since(now),
            queued: self.queue.len(),
            reset_scheduled: self.reset_deadline.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn response(headers: &[(&str, &str)]) -> RestResponse {
        RestResponse {
            status: 200,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
            body: Vec::new(),
        }
    }

    #[test]
    fn test_parse_reset_after() {
        let headers = RateLimitHeaders::parse(&response(&[
            ("x-ratelimit-limit", "5"),
            ("x-ratelimit-remaining", "4"),
            ("x-ratelimit-reset-after", "2.5"),
        ]))
        .unwrap();

        assert_eq!(headers.limit, 5.0);
        assert_eq!(headers.remaining, 4.0);
        assert_eq!(headers.reset_after, Duration::from_millis(2500));
    }

    #[test]
    fn test_parse_epoch_reset() {
        let in_ten = chrono::Utc::now().timestamp() + 10;
        let headers = RateLimitHeaders::parse(&response(&[
            ("x-ratelimit-limit", "5"),
            ("x-ratelimit-remaining", "0"),
            ("x-ratelimit-reset", &in_ten.to_string()),
        ]))
        .unwrap();

        assert!(headers.reset_after <= Duration::from_secs(10));
        assert!(headers.reset_after >= Duration::from_secs(8));
    }

    #[test]
    fn test_past_epoch_reset_is_zero() {
        let headers = RateLimitHeaders::parse(&response(&[
            ("x-ratelimit-limit", "1"),
            ("x-ratelimit-remaining", "0"),
            ("x-ratelimit-reset", "1000"),
        ]))
        .unwrap();
        assert_eq!(headers.reset_after, Duration::ZERO);
    }

    #[test]
    fn test_incomplete_headers_ignored() {
        assert!(RateLimitHeaders::parse(&response(&[
            ("x-ratelimit-limit", "5"),
            ("x-ratelimit-reset-after", "1"),
        ]))
        .is_none());
        assert!(RateLimitHeaders::parse(&response(&[
            ("x-ratelimit-limit", "five"),
            ("x-ratelimit-remaining", "4"),
            ("x-ratelimit-reset-after", "1"),
        ]))
        .is_none());
    }

    #[test]
    fn test_retry_after() {
        assert_eq!(
            RateLimitHeaders::retry_after(&response(&[("retry-after", "1.5")])),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(RateLimitHeaders::retry_after(&response(&[])), None);
    }

    #[test]
    fn test_refill_takes_floor_of_fractional_budget() {
        let mut bucket: Bucket<u32> = Bucket::new(Instant::now());
        bucket.limit = 2.5;
        bucket.remaining = 0.0;
        bucket.queue.extend([1, 2, 3, 4]);

        let admitted = bucket.refill();
        assert_eq!(admitted, vec![1, 2]);
        assert_eq!(bucket.queue.len(), 2);
        assert_eq!(bucket.remaining, 0.5);
        // A partial budget still admits one more request
        assert!(!bucket.at_limit());
    }

    #[test]
    fn test_refill_with_short_queue() {
        let mut bucket: Bucket<u32> = Bucket::new(Instant::now());
        bucket.limit = 5.0;
        bucket.remaining = 0.0;
        bucket.queue.push_back(1);

        assert_eq!(bucket.refill(), vec![1]);
        assert_eq!(bucket.remaining, 4.0);
    }

    #[test]
    fn test_new_bucket_is_conservative() {
        let now = Instant::now();
        let bucket: Bucket<u32> = Bucket::new(now);
        let snapshot = bucket.snapshot(now);
        assert_eq!(snapshot.limit, 1.0);
        assert_eq!(snapshot.remaining, 1.0);
        assert_eq!(snapshot.reset_in, DEFAULT_RESET_WINDOW);
        assert!(!snapshot.reset_scheduled);
    }
}
