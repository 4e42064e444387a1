use crate::error::{RestError, Result};
use crate::limiter::RateLimiter;
use crate::route::BucketKey;
use crate::transport::{Method, ReqwestTransport, RestRequest, RestTransport};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v9";

const USER_AGENT: &str = concat!("cordrest (", env!("CARGO_PKG_VERSION"), ")");

/// Response of `GET /gateway/bot`
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GatewayBotInfo {
    pub url: String,
    pub shards: u32,
    pub session_start_limit: SessionStartLimit,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SessionStartLimit {
    pub total: u32,
    pub remaining: u32,
    /// Milliseconds until `remaining` refills
    pub reset_after: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: u32,
}

fn default_max_concurrency() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct GatewayUrl {
    url: String,
}

/// Authenticated JSON client, every call admitted through a [`RateLimiter`]
pub struct RestClient<T: RestTransport = ReqwestTransport> {
    base_url: String,
    authorization: String,
    limiter: RateLimiter<T>,
}

impl RestClient<ReqwestTransport> {
    /// `authorization` is the full header value, e.g. `Bot <token>`
    pub fn new(authorization: impl Into<String>) -> Self {
        Self::with_limiter(authorization, RateLimiter::new(ReqwestTransport::new()))
    }
}

impl<T: RestTransport> RestClient<T> {
    pub fn with_limiter(authorization: impl Into<String>, limiter: RateLimiter<T>) -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
            authorization: authorization.into(),
            limiter,
        }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn limiter(&self) -> &RateLimiter<T> {
        &self.limiter
    }

    /// Call `path` (relative to the API base) and decode the JSON reply
    ///
    /// An empty body decodes as `Value::Null`.
    pub async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let key = BucketKey::from_path(&method, path);
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {} (bucket {})", method, url, key);

        let mut request = RestRequest::new(method, url)
            .header("Authorization", self.authorization.as_str())
            .header("User-Agent", USER_AGENT);
        if let Some(body) = body {
            request = request.json_body(body)?;
        }

        let response = self.limiter.request(request, key).await?;
        if !response.is_success() {
            return Err(RestError::Api {
                status: response.status,
                body: response.text(),
            });
        }

        if response.body.is_empty() {
            return Ok(Value::Null);
        }
        response.json()
    }

    pub async fn get_gateway_bot(&self) -> Result<GatewayBotInfo> {
        let value = self.request(Method::GET, "/gateway/bot", None).await?;
        let info: GatewayBotInfo = serde_json::from_value(value)?;
        info!(
            "Gateway {} recommends {} shard(s), {} session start(s) left",
            info.url, info.shards, info.session_start_limit.remaining
        );
        Ok(info)
    }

    pub async fn get_gateway(&self) -> Result<String> {
        let value = self.request(Method::GET, "/gateway", None).await?;
        let gateway: GatewayUrl = serde_json::from_value(value)?;
        Ok(gateway.url)
    }
}
