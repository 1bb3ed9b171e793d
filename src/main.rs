//! Binance market data streamer
//!
//! # Architecture
//! - **core**: Symbol, market and stream kind types
//! - **hot_path**: Frame routing and handler dispatch
//! - **ws**: Connections, reconnects, keep-alive, subscription manager
//! - **rest**: Snapshot endpoints
//! - **infrastructure**: Cold path (logging, metrics, config)

use anyhow::Context;
use market_stream::infrastructure::{init_logging, Config, SubscriptionConfig};
use market_stream::{log_main, HandlerResult, MarketDataSource, RestClient, StreamKind, StreamMessage, SubscriptionManager, Symbol};
use std::sync::Arc;
use tracing::Level;

/// Main application state
pub struct StreamApp {
    config: Config,
    manager: SubscriptionManager,
    rest: Arc<RestClient>,
}

impl StreamApp {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let manager = SubscriptionManager::new(config.stream.clone()).context("creating subscription manager")?;
        let rest = Arc::new(RestClient::new(&config.rest));
        Ok(Self { config, manager, rest })
    }

    /// Subscribe everything configured, then stream until Ctrl-C
    pub async fn run(&self) -> anyhow::Result<()> {
        log_main!(Level::INFO, subscriptions = self.config.subscriptions.len(), "starting market stream");

        for sub in &self.config.subscriptions {
            if let Err(e) = self.start_subscription(sub).await {
                log_main!(Level::ERROR, symbol = %sub.symbol, "subscription skipped: {:#}", e);
            }
        }

        tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
        log_main!(Level::INFO, "shutdown requested");

        self.manager.close().await;

        let snapshot = self.manager.metrics().snapshot();
        log_main!(
            Level::INFO,
            frames = snapshot.frames_received,
            delivered = snapshot.messages_delivered,
            reconnects = snapshot.reconnects_scheduled,
            abandoned = snapshot.subscriptions_abandoned,
            "stopped"
        );
        Ok(())
    }

    async fn start_subscription(&self, sub: &SubscriptionConfig) -> anyhow::Result<()> {
        self.manager
            .subscribe(&sub.symbol, sub.market, &sub.streams)
            .await
            .with_context(|| format!("subscribe {} {}", sub.market, sub.symbol))?;

        for kind in handler_kinds(&sub.streams)? {
            self.manager
                .on_stream_data(&sub.symbol, kind, log_message)
                .await?;
        }

        // Initial snapshot; the stream keeps going without it
        let symbol = Symbol::parse(&sub.symbol)?;
        let market = sub.market;
        let rest = self.rest.clone();
        tokio::spawn(async move {
            match rest.fetch_ticker(&symbol, market).await {
                Ok(ticker) => log_main!(
                    Level::INFO,
                    symbol = %symbol,
                    last_price = ticker.get("lastPrice").and_then(|v| v.as_str()).unwrap_or("-"),
                    "ticker snapshot"
                ),
                Err(e) => log_main!(Level::WARN, symbol = %symbol, "ticker snapshot failed: {}", e),
            }
        });

        Ok(())
    }
}

/// Configured stream names as kinds, duplicates collapsed in first-seen order
fn handler_kinds(streams: &[String]) -> market_stream::Result<Vec<StreamKind>> {
    let mut kinds = Vec::with_capacity(streams.len());
    for raw in streams {
        let kind: StreamKind = raw.parse()?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    Ok(kinds)
}

fn log_message(msg: &StreamMessage) -> HandlerResult {
    log_main!(Level::DEBUG, symbol = %msg.symbol, kind = %msg.kind, stream = %msg.stream, "{}", msg.data);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Guards flush the file appenders on exit
    let _guards = init_logging().context("initializing logging")?;

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            log_main!(Level::WARN, "config not loaded ({}), using defaults", e);
            Config::default()
        }
    };

    let app = StreamApp::new(config)?;
    app.run().await
}
