use anyhow::{Context, Result};
use cord_client::bin_common::{init_tracing, load_config_from_env, parse_args, ClientConfig, ConfigType};
use cordgate::{ChannelDelegate, EventReceiver, GatewayEvent, Token};
use cordrest::{RateLimiter, ReqwestTransport, RestClient};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load config first (before logging is initialized)
    let config_path = match parse_args().into_iter().next() {
        Some(path) => load_config_from_env(ConfigType::Custom(path)),
        None => load_config_from_env(ConfigType::Gateway),
    };
    let config = ClientConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    init_tracing(&config.log_level);
    config.log();

    let token = Token::bot(&config.token);
    let transport = ReqwestTransport::with_timeout(Duration::from_secs(config.rest.timeout_secs))?;
    let rest = RestClient::with_limiter(
        token.as_str(),
        RateLimiter::with_fail_fast(transport, config.rest.fail_fast),
    )
    .base_url(config.rest.api_base.as_str());

    let gateway = rest.get_gateway_bot().await.context("fetching gateway info")?;
    let shards = config.shard_info(gateway.shards)?;

    let (delegate, events) = ChannelDelegate::new();
    let coordinator = cordgate::builder()
        .token(token)
        .delegate(Arc::new(delegate))
        .intents(config.intents()?)
        .gateway_url(gateway.url)
        .shards(shards)
        .connect_stagger(config.connect_stagger())
        .reconnect_strategy(config.reconnect_strategy())
        .build()?;

    print_banner("Gateway event logger", coordinator.shard_count());
    coordinator.connect();

    let stopping = Arc::new(AtomicBool::new(false));
    let logger = {
        let stopping = Arc::clone(&stopping);
        tokio::task::spawn_blocking(move || log_events(events, &stopping))
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested, closing {} shard(s)", coordinator.shard_count());
    stopping.store(true, Ordering::SeqCst);
    coordinator.disconnect();

    match tokio::time::timeout(Duration::from_secs(10), logger).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Event logger failed: {}", e),
        Err(_) => warn!("Shards did not report closed within 10s"),
    }

    for (shard, state) in coordinator.states() {
        if let Some(metrics) = coordinator.metrics(shard) {
            info!(
                "Shard {}: {:?}, {} frame(s) in, {} out, {} reconnect(s)",
                shard, state, metrics.frames_received, metrics.frames_sent, metrics.reconnects
            );
        }
    }

    print_shutdown("Gateway event logger");
    Ok(())
}

/// Log every event until all shards report closed after a shutdown request
fn log_events(events: EventReceiver, stopping: &AtomicBool) {
    while let Some(event) = events.recv_event() {
        match event {
            GatewayEvent::Hello(shard) => info!("[shard {}] hello", shard),
            GatewayEvent::ShardConnected(shard) => info!("[shard {}] connected", shard),
            GatewayEvent::ShardDisconnected(shard) => warn!("[shard {}] disconnected", shard),
            GatewayEvent::Dispatch { shard, event } => {
                info!("[shard {}] {} (seq {:?})", shard, event.name, event.seq)
            }
            GatewayEvent::FullyConnected => info!("All shards connected"),
            GatewayEvent::FullyDisconnected(reason) => {
                info!("All shards disconnected: {}", reason);
                if stopping.load(Ordering::SeqCst) {
                    return;
                }
            }
        }
    }
}

fn print_banner(name: &str, shards: usize) {
    info!("");
    info!("========================================");
    info!("Starting {}", name);
    info!("Shards: {}", shards);
    info!("Press Ctrl+C to stop");
    info!("========================================");
    info!("");
}

fn print_shutdown(name: &str) {
    info!("");
    info!("========================================");
    info!("{} stopped gracefully", name);
    info!("========================================");
}
