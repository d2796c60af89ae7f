use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::info;

use pairstream::alert::AlertRegistry;
use pairstream::broadcast::{Broadcaster, OutboundMessage};
use pairstream::config::Config;
use pairstream::feed::ws::FeedClient;
use pairstream::publisher::{PairPublisher, PublisherSettings};
use pairstream::store::TickStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider (required by rustls 0.23+)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                config
                    .logging
                    .level
                    .parse()
                    .unwrap_or_else(|_| "info".parse().unwrap())
            }),
        )
        .init();

    info!(
        symbol_x = %config.pair.symbol_x,
        symbol_y = %config.pair.symbol_y,
        ws_url = %config.feed.ws_base_url,
        db_path = %config.store.path,
        "Starting pairstream"
    );

    let store = Arc::new(TickStore::open(&config.store.path).context("failed to open tick store")?);
    let alerts = Arc::new(Mutex::new(AlertRegistry::new()));
    let broadcaster = Arc::new(Broadcaster::new());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let ctrl_c_shutdown = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        let _ = ctrl_c_shutdown.send(true);
    });

    let mut tasks = Vec::new();

    // One ingestion task per tracked symbol
    for symbol in config.feed.tracked_symbols() {
        let client = FeedClient::new(
            &config.feed.ws_base_url,
            &symbol,
            Duration::from_secs(config.feed.ping_interval_secs),
            Duration::from_secs(config.feed.reconnect_delay_secs),
        );
        let feed_store = store.clone();
        let feed_shutdown = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move {
            client.ingest(feed_store, feed_shutdown).await;
        }));
    }

    // Internal subscriber: surfaces broadcast traffic in the logs so a
    // headless run is observable without any connected clients.
    let mut inbox = broadcaster.subscribe(64);
    let mut inbox_shutdown = shutdown_rx.clone();
    tasks.push(tokio::spawn(async move {
        loop {
            tokio::select! {
                msg = inbox.recv() => match msg {
                    Some(OutboundMessage::Alert(trigger)) => {
                        info!(
                            rule_id = trigger.rule.id,
                            current_value = trigger.current_value,
                            "Alert triggered: {}",
                            trigger.rule.message
                        );
                    }
                    Some(OutboundMessage::Analytics(payload)) => {
                        tracing::debug!(
                            data_points = payload.data_points,
                            hedge_ratio = payload.analytics.hedge_ratio,
                            "Analytics published"
                        );
                    }
                    None => break,
                },
                _ = inbox_shutdown.changed() => break,
            }
        }
    }));

    // Publisher loop for the tracked pair
    let settings = PublisherSettings {
        symbol_x: config.pair.symbol_x.to_ascii_uppercase(),
        symbol_y: config.pair.symbol_y.to_ascii_uppercase(),
        timeframe: config.pair.timeframe()?,
        window: config.pair.window,
        period: Duration::from_secs(config.publisher.period_secs),
        lookback: Duration::from_secs(config.publisher.lookback_secs),
    };
    let publisher = PairPublisher::new(store.clone(), alerts.clone(), broadcaster.clone(), settings);
    let publisher_shutdown = shutdown_rx.clone();
    tasks.push(tokio::spawn(async move {
        publisher.run(publisher_shutdown).await;
    }));

    let mut main_shutdown = shutdown_rx;
    let _ = main_shutdown.changed().await;

    for task in tasks {
        let _ = task.await;
    }
    info!("Shutdown complete");
    Ok(())
}
