//! # Cordrest
//!
//! REST side of the chat platform client.
//!
//! ## Features
//!
//! - **Route buckets**: request paths reduced to rate-limit keys (route shape + major id)
//! - **Rate limiter**: per-bucket budget accounting with FIFO queuing and scheduled replay
//! - **Pluggable transport**: `RestTransport` trait with a reqwest implementation
//! - **REST client**: authenticated JSON requests routed through the limiter

pub mod bucket;
pub mod client;
pub mod error;
pub mod limiter;
pub mod route;
pub mod transport;

pub use bucket::{BucketSnapshot, RateLimitHeaders};
pub use client::{GatewayBotInfo, RestClient, SessionStartLimit, DEFAULT_API_BASE};
pub use error::{RestError, Result};
pub use limiter::{Callback, RateLimiter};
pub use route::{BucketKey, RouteParts};
pub use transport::{Method, ReqwestTransport, RestRequest, RestResponse, RestTransport};
