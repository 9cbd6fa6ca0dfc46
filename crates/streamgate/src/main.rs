//! streamgate: venue streaming gateway binary
//!
//! Connects to one venue, subscribes the default channel set for the
//! configured instruments and logs the canonical event stream.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use streamgate_lib::{
    event_channel, resolve_credentials, venue_profile, CanonicalEvent, EnvResolver,
    FixedRateLimiter, Gateway, GatewayConfig, OverflowPolicy, WebSocketTransport,
};
use streamgate_metadata::VenueConfig;

#[derive(Parser, Debug)]
#[command(name = "streamgate")]
#[command(about = "Streaming market data gateway for trading venues")]
struct Args {
    /// Path to venue configuration file
    #[arg(short, long, env = "STREAMGATE_CONFIG")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = VenueConfig::load(&args.config)?;
    info!(venue = %config.name, instruments = config.instruments.len(), "Loaded venue configuration");

    let profile = venue_profile(&config.name)
        .ok_or_else(|| format!("unsupported venue: {}", config.name))?;

    let (sink, mut events) = event_channel(config.events.buffer, OverflowPolicy::from(&config.events));
    let rate = config
        .rate_limit_per_second
        .or(profile.default_rate_limit_per_second);

    let mut gateway = Gateway::new(
        profile,
        GatewayConfig::from_venue(&config),
        Arc::new(WebSocketTransport::new()),
        sink,
    );

    if let Some(ref keys) = config.keys {
        let credentials = resolve_credentials(
            &EnvResolver::new(),
            &keys.source,
            &keys.key_field,
            &keys.secret_field,
        )
        .map_err(|e| {
            error!(error = %e, source = %keys.source, "Failed to resolve credentials");
            e
        })?;
        gateway = gateway.with_credentials(credentials);
        info!("Credentials loaded");
    }

    if let Some(rate) = rate {
        gateway = gateway.with_rate_limiter(Arc::new(FixedRateLimiter::per_second(rate)));
        info!(per_second = rate, "Outbound rate limit enabled");
    }

    let gateway = Arc::new(gateway);
    gateway.connect().await?;
    gateway.run()?;

    let result = gateway.subscribe_defaults().await?;
    if !result.all_succeeded() {
        warn!(failed = ?result.failed_channels, "Some subscriptions failed");
    }

    let exit = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break Ok(());
            }
            event = events.recv() => match event {
                Some(CanonicalEvent::Error(err)) if err.terminal => {
                    error!(exchange = %err.exchange, error = %err.message, "Connection lost - exiting to trigger restart");
                    break Err(err.message);
                }
                Some(CanonicalEvent::Error(err)) => {
                    warn!(exchange = %err.exchange, error = %err.message, "Gateway error");
                }
                Some(CanonicalEvent::Ticker(t)) => {
                    info!(instrument = %t.instrument, last = %t.last, bid = %t.bid, ask = %t.ask, "Ticker");
                }
                Some(CanonicalEvent::Trade(t)) => {
                    info!(instrument = %t.instrument, price = %t.price, amount = %t.amount, side = ?t.side, "Trade");
                }
                Some(CanonicalEvent::OrderbookUpdate(update)) => {
                    match gateway.orderbook(&update.instrument) {
                        Some(book) => debug!(
                            instrument = %update.instrument,
                            best_bid = ?book.best_bid().map(|l| l.price),
                            best_ask = ?book.best_ask().map(|l| l.price),
                            "Orderbook"
                        ),
                        None => debug!(instrument = %update.instrument, "Orderbook dropped"),
                    }
                }
                None => break Err("event stream closed".to_string()),
            }
        }
    };

    gateway.shutdown().await?;
    info!("Shutdown complete");
    exit.map_err(Into::into)
}
