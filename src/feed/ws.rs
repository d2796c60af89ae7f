use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite;

use super::types::TradeEvent;
use crate::error::PairstreamError;
use crate::store::TickStore;

type Result<T> = std::result::Result<T, PairstreamError>;

/// Per-symbol live feed ingestion.
///
/// Runs CONNECTING -> STREAMING -> BACKOFF -> CONNECTING forever with a
/// fixed reconnect delay; cancellation through the watch channel is the only
/// exit. Malformed or non-trade frames never interrupt the stream.
pub struct FeedClient {
    url: String,
    symbol: String,
    ping_interval: Duration,
    reconnect_delay: Duration,
}

impl FeedClient {
    pub fn new(
        ws_base_url: &str,
        symbol: &str,
        ping_interval: Duration,
        reconnect_delay: Duration,
    ) -> Self {
        Self {
            url: format!("{}/{}@trade", ws_base_url, symbol.to_ascii_lowercase()),
            symbol: symbol.to_ascii_uppercase(),
            ping_interval,
            reconnect_delay,
        }
    }

    /// Ingest until cancelled, appending each normalized tick to the store.
    pub async fn ingest(&self, store: Arc<TickStore>, mut shutdown: watch::Receiver<bool>) {
        loop {
            match self.stream_once(&store, &mut shutdown).await {
                Ok(()) => {
                    tracing::info!(symbol = %self.symbol, "Feed ingestion stopped");
                    break;
                }
                Err(e) => {
                    tracing::warn!(symbol = %self.symbol, error = %e, "Feed connection lost, reconnecting");
                    tokio::select! {
                        _ = tokio::time::sleep(self.reconnect_delay) => {}
                        _ = shutdown.changed() => {
                            tracing::info!(symbol = %self.symbol, "Shutdown during reconnect backoff");
                            break;
                        }
                    }
                }
            }
        }
    }

    /// One CONNECTING + STREAMING episode. `Ok(())` means cancellation;
    /// any connection or persistence failure returns `Err` for backoff.
    async fn stream_once(
        &self,
        store: &TickStore,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        tracing::info!(symbol = %self.symbol, url = %self.url, "Connecting to trade feed");
        let (ws_stream, _resp) = tokio::select! {
            res = tokio_tungstenite::connect_async(&self.url) => {
                res.map_err(|e| PairstreamError::WebSocket(format!("connect failed: {}", e)))?
            }
            _ = shutdown.changed() => return Ok(()),
        };
        tracing::info!(symbol = %self.symbol, "Trade feed connected");

        let (mut write, mut read) = ws_stream.split();
        let mut keepalive = tokio::time::interval(self.ping_interval);
        // The first interval tick completes immediately; spend it here so
        // keepalives start one full period after connect.
        keepalive.tick().await;

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(tungstenite::Message::Text(text))) => {
                            self.handle_frame(&text, store)?;
                        }
                        Some(Ok(tungstenite::Message::Ping(_))) => {
                            // tokio-tungstenite answers pings automatically
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            return Err(PairstreamError::WebSocket(format!("read error: {}", e)));
                        }
                        None => {
                            return Err(PairstreamError::WebSocket("stream ended".to_string()));
                        }
                    }
                }
                _ = keepalive.tick() => {
                    write
                        .send(tungstenite::Message::Ping(Vec::new()))
                        .await
                        .map_err(|e| PairstreamError::WebSocket(format!("ping failed: {}", e)))?;
                }
                _ = shutdown.changed() => {
                    return Ok(());
                }
            }
        }
    }

    /// Decode one frame. Unparseable and non-trade frames are dropped;
    /// a store failure propagates so the episode restarts.
    fn handle_frame(&self, text: &str, store: &TickStore) -> Result<()> {
        match serde_json::from_str::<TradeEvent>(text) {
            Ok(event) if event.is_trade() => {
                let tick = event.into_tick(&self.symbol, Utc::now());
                store.insert_tick(&tick)?;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(symbol = %self.symbol, error = %e, "Failed to parse feed message");
            }
        }
        Ok(())
    }
}
