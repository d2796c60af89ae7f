use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use pairstream::alert::{AlertRegistry, AlertSpec, Operator};
use pairstream::broadcast::{Broadcaster, OutboundMessage};
use pairstream::model::bar::Timeframe;
use pairstream::model::tick::Tick;
use pairstream::publisher::{PairPublisher, PublisherSettings};
use pairstream::store::TickStore;
use tokio::sync::watch;

fn settings() -> PublisherSettings {
    PublisherSettings {
        symbol_x: "BTCUSDT".to_string(),
        symbol_y: "ETHUSDT".to_string(),
        timeframe: Timeframe::S1,
        window: 2,
        period: Duration::from_millis(10),
        lookback: Duration::from_secs(3 * 60 * 60),
    }
}

fn publisher_over(
    store: Arc<TickStore>,
    alerts: Arc<Mutex<AlertRegistry>>,
) -> (PairPublisher, Arc<Broadcaster>) {
    let broadcaster = Arc::new(Broadcaster::new());
    let publisher = PairPublisher::new(store, alerts, broadcaster.clone(), settings());
    (publisher, broadcaster)
}

#[tokio::test]
async fn cycle_publishes_analytics_end_to_end() {
    let store = Arc::new(TickStore::open_in_memory().unwrap());
    // Two 1s buckets per symbol inside the lookback window.
    let t0 = Utc::now() - chrono::Duration::seconds(10);
    let t1 = t0 + chrono::Duration::seconds(1);
    store
        .insert_ticks(&[
            Tick::new("BTCUSDT", t0, 100.0, 1.0),
            Tick::new("ETHUSDT", t0, 105.0, 1.0),
            Tick::new("BTCUSDT", t1, 102.0, 1.0),
            Tick::new("ETHUSDT", t1, 106.0, 1.0),
        ])
        .unwrap();

    let alerts = Arc::new(Mutex::new(AlertRegistry::new()));
    let (publisher, broadcaster) = publisher_over(store, alerts);
    let mut inbox = broadcaster.subscribe(8);

    assert!(publisher.run_cycle().unwrap());

    let Some(OutboundMessage::Analytics(payload)) = inbox.recv().await else {
        panic!("expected an analytics message");
    };
    assert_eq!(payload.symbol_x, "BTCUSDT");
    assert_eq!(payload.symbol_y, "ETHUSDT");
    assert_eq!(payload.data_points, 2);
    assert!(payload.analytics.hedge_ratio.is_finite());
    for point in &payload.analytics.spread {
        assert!(point.spread.is_finite());
        assert!(point.z_score.is_finite());
    }
}

#[tokio::test]
async fn cycle_broadcasts_triggered_alerts_after_analytics() {
    let store = Arc::new(TickStore::open_in_memory().unwrap());
    let t0 = Utc::now() - chrono::Duration::seconds(5);
    store
        .insert_ticks(&[
            Tick::new("BTCUSDT", t0, 100.0, 1.0),
            Tick::new("ETHUSDT", t0, 105.0, 1.0),
        ])
        .unwrap();

    let alerts = Arc::new(Mutex::new(AlertRegistry::new()));
    alerts.lock().unwrap().add(AlertSpec {
        symbol_x: "BTCUSDT".to_string(),
        symbol_y: "ETHUSDT".to_string(),
        metric: "zscore".to_string(),
        operator: Operator::Gte,
        threshold: -1e9,
        message: Some("always fires".to_string()),
    });

    let (publisher, broadcaster) = publisher_over(store, alerts);
    let mut inbox = broadcaster.subscribe(8);

    assert!(publisher.run_cycle().unwrap());

    assert!(matches!(
        inbox.recv().await,
        Some(OutboundMessage::Analytics(_))
    ));
    let Some(OutboundMessage::Alert(trigger)) = inbox.recv().await else {
        panic!("expected an alert message");
    };
    assert_eq!(trigger.rule.message, "always fires");
    assert!(trigger.current_value.is_finite());
}

#[tokio::test]
async fn cycle_without_data_publishes_nothing() {
    let store = Arc::new(TickStore::open_in_memory().unwrap());
    let alerts = Arc::new(Mutex::new(AlertRegistry::new()));
    let (publisher, broadcaster) = publisher_over(store, alerts);
    let _inbox = broadcaster.subscribe(8);

    assert!(!publisher.run_cycle().unwrap());
    assert_eq!(broadcaster.subscriber_count(), 1);
}

#[tokio::test]
async fn cycle_ignores_ticks_outside_lookback() {
    let store = Arc::new(TickStore::open_in_memory().unwrap());
    let stale = Utc::now() - chrono::Duration::hours(4);
    store
        .insert_ticks(&[
            Tick::new("BTCUSDT", stale, 100.0, 1.0),
            Tick::new("ETHUSDT", stale, 105.0, 1.0),
        ])
        .unwrap();

    let alerts = Arc::new(Mutex::new(AlertRegistry::new()));
    let (publisher, _broadcaster) = publisher_over(store, alerts);
    assert!(!publisher.run_cycle().unwrap());
}

#[tokio::test]
async fn loop_stops_on_shutdown_signal() {
    let store = Arc::new(TickStore::open_in_memory().unwrap());
    let alerts = Arc::new(Mutex::new(AlertRegistry::new()));
    let (publisher, _broadcaster) = publisher_over(store, alerts);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move { publisher.run(shutdown_rx).await });

    tokio::time::sleep(Duration::from_millis(30)).await;
    shutdown_tx.send(true).unwrap();

    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("publisher did not stop on shutdown")
        .unwrap();
}
