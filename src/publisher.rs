use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use crate::alert::AlertRegistry;
use crate::broadcast::{Broadcaster, OutboundMessage};
use crate::error::PairstreamError;
use crate::model::bar::Timeframe;
use crate::ops::{analyze, PairQuery};
use crate::store::TickStore;

/// Tuning for one tracked pair's publish loop.
#[derive(Debug, Clone)]
pub struct PublisherSettings {
    pub symbol_x: String,
    pub symbol_y: String,
    pub timeframe: Timeframe,
    pub window: usize,
    pub period: Duration,
    pub lookback: Duration,
}

/// Periodic analytics publisher for one instrument pair.
///
/// Each firing runs query -> aggregate -> align -> compute -> evaluate ->
/// broadcast strictly in sequence. A failed cycle is logged and swallowed;
/// the loop only exits on cancellation.
pub struct PairPublisher {
    store: Arc<TickStore>,
    alerts: Arc<Mutex<AlertRegistry>>,
    broadcaster: Arc<Broadcaster>,
    settings: PublisherSettings,
}

impl PairPublisher {
    pub fn new(
        store: Arc<TickStore>,
        alerts: Arc<Mutex<AlertRegistry>>,
        broadcaster: Arc<Broadcaster>,
        settings: PublisherSettings,
    ) -> Self {
        Self {
            store,
            alerts,
            broadcaster,
            settings,
        }
    }

    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.settings.period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.run_cycle() {
                        Ok(true) => {}
                        Ok(false) => {
                            tracing::debug!(
                                symbol_x = %self.settings.symbol_x,
                                symbol_y = %self.settings.symbol_y,
                                "No overlapping data this cycle"
                            );
                        }
                        Err(e) => {
                            tracing::warn!(
                                symbol_x = %self.settings.symbol_x,
                                symbol_y = %self.settings.symbol_y,
                                error = %e,
                                "Analytics cycle failed"
                            );
                        }
                    }
                }
                _ = shutdown.changed() => {
                    tracing::info!(
                        symbol_x = %self.settings.symbol_x,
                        symbol_y = %self.settings.symbol_y,
                        "Publisher stopped"
                    );
                    break;
                }
            }
        }
    }

    /// One publish cycle over the trailing lookback window. Returns whether
    /// anything was broadcast (`false` when alignment came up empty).
    pub fn run_cycle(&self) -> Result<bool, PairstreamError> {
        let now = Utc::now();
        let from = now
            - chrono::Duration::from_std(self.settings.lookback)
                .unwrap_or_else(|_| chrono::Duration::hours(3));
        let query = PairQuery {
            symbol_x: self.settings.symbol_x.clone(),
            symbol_y: self.settings.symbol_y.clone(),
            timeframe: self.settings.timeframe,
            range: Some((from, now)),
        };

        let Some(payload) = analyze(&self.store, &query, self.settings.window)? else {
            return Ok(false);
        };

        let triggers = self
            .alerts
            .lock()
            .expect("alert registry mutex poisoned")
            .evaluate(&payload.analytics, &payload.symbol_x, &payload.symbol_y);

        self.broadcaster
            .broadcast(&OutboundMessage::Analytics(payload));
        for trigger in triggers {
            self.broadcaster.broadcast(&OutboundMessage::Alert(trigger));
        }
        Ok(true)
    }
}
