pub mod states;

use crate::core::config::{GatewayConfig, ShardInfo, DEFAULT_API_VERSION, DEFAULT_CONNECT_STAGGER, DEFAULT_GATEWAY_URL};
use crate::core::scheduler::TokioScheduler;
use crate::core::websocket::TungsteniteTransport;
use crate::manager::{ShardCoordinator, TransportFactory};
use crate::protocol::{IdentifyProperties, Intents, Token};
use crate::traits::*;
use states::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Type-state builder for [`ShardCoordinator`]
///
/// A token and a delegate are required before `build()` exists. Transport
/// and scheduler default to tungstenite sockets and tokio timers on the
/// current runtime.
pub struct GatewayBuilder<T, D>
where
    T: TokenState,
    D: DelegateState,
{
    _state: TypeState<T, D>,
    token: Option<Token>,
    delegate: Option<Arc<dyn GatewayDelegate>>,
    intents: Intents,
    gateway_url: String,
    api_version: u8,
    large_threshold: u32,
    properties: IdentifyProperties,
    shards: ShardInfo,
    connect_stagger: Duration,
    reconnect_strategy: Option<Arc<dyn ReconnectionStrategy>>,
    transports: Option<TransportFactory>,
    scheduler: Option<Arc<dyn Scheduler>>,
}

impl GatewayBuilder<NoToken, NoDelegate> {
    pub fn new() -> Self {
        Self {
            _state: TypeState::new(),
            token: None,
            delegate: None,
            intents: Intents::default(),
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            api_version: DEFAULT_API_VERSION,
            large_threshold: 250,
            properties: IdentifyProperties::default(),
            shards: ShardInfo::default(),
            connect_stagger: DEFAULT_CONNECT_STAGGER,
            reconnect_strategy: None,
            transports: None,
            scheduler: None,
        }
    }
}

impl Default for GatewayBuilder<NoToken, NoDelegate> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TokenState, D: DelegateState> GatewayBuilder<T, D> {
    fn retype<T2: TokenState, D2: DelegateState>(self) -> GatewayBuilder<T2, D2> {
        GatewayBuilder {
            _state: TypeState::new(),
            token: self.token,
            delegate: self.delegate,
            intents: self.intents,
            gateway_url: self.gateway_url,
            api_version: self.api_version,
            large_threshold: self.large_threshold,
            properties: self.properties,
            shards: self.shards,
            connect_stagger: self.connect_stagger,
            reconnect_strategy: self.reconnect_strategy,
            transports: self.transports,
            scheduler: self.scheduler,
        }
    }

    pub fn intents(mut self, intents: Intents) -> Self {
        self.intents = intents;
        self
    }

    /// Base gateway URL, usually the one returned by `GET /gateway/bot`
    pub fn gateway_url(mut self, url: impl Into<String>) -> Self {
        self.gateway_url = url.into();
        self
    }

    pub fn api_version(mut self, version: u8) -> Self {
        self.api_version = version;
        self
    }

    pub fn large_threshold(mut self, threshold: u32) -> Self {
        self.large_threshold = threshold;
        self
    }

    pub fn properties(mut self, properties: IdentifyProperties) -> Self {
        self.properties = properties;
        self
    }

    pub fn shards(mut self, shards: ShardInfo) -> Self {
        self.shards = shards;
        self
    }

    pub fn connect_stagger(mut self, stagger: Duration) -> Self {
        self.connect_stagger = stagger;
        self
    }

    pub fn reconnect_strategy(mut self, strategy: impl ReconnectionStrategy + 'static) -> Self {
        self.reconnect_strategy = Some(Arc::new(strategy));
        self
    }

    /// Replace the socket implementation, one transport per shard
    pub fn transport_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(u32) -> Box<dyn GatewayTransport> + Send + Sync + 'static,
    {
        self.transports = Some(Arc::new(factory));
        self
    }

    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }
}

impl<D: DelegateState> GatewayBuilder<NoToken, D> {
    pub fn token(mut self, token: Token) -> GatewayBuilder<HasToken, D> {
        self.token = Some(token);
        self.retype()
    }
}

impl<T: TokenState> GatewayBuilder<T, NoDelegate> {
    pub fn delegate(mut self, delegate: Arc<dyn GatewayDelegate>) -> GatewayBuilder<T, HasDelegate> {
        self.delegate = Some(delegate);
        self.retype()
    }
}

// Build method - only available when all required fields are set
impl GatewayBuilder<HasToken, HasDelegate> {
    pub fn build(self) -> Result<ShardCoordinator> {
        let token = self
            .token
            .ok_or_else(|| GatewayError::Configuration("token must be set".into()))?;
        let delegate = self
            .delegate
            .ok_or_else(|| GatewayError::Configuration("delegate must be set".into()))?;
        if token.is_empty() {
            return Err(GatewayError::Configuration("token is empty".into()));
        }

        let scheduler: Arc<dyn Scheduler> = match self.scheduler {
            Some(scheduler) => scheduler,
            None => Arc::new(TokioScheduler::current()?),
        };

        let transports: TransportFactory = match self.transports {
            Some(factory) => factory,
            None => {
                let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
                    GatewayError::Configuration(format!("no tokio runtime: {}", e))
                })?;
                Arc::new(move |_shard| {
                    Box::new(TungsteniteTransport::new(runtime.clone())) as Box<dyn GatewayTransport>
                })
            }
        };

        let mut config = GatewayConfig::new(token);
        config.intents = self.intents;
        config.gateway_url = self.gateway_url;
        config.api_version = self.api_version;
        config.large_threshold = self.large_threshold;
        config.properties = self.properties;
        config.shards = self.shards;
        config.connect_stagger = self.connect_stagger;
        if let Some(strategy) = self.reconnect_strategy {
            config.reconnect_strategy = strategy;
        }

        debug!("Building coordinator: {:?}", config);
        ShardCoordinator::new(config, scheduler, transports, delegate)
    }
}
