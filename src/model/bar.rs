use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use super::tick::Tick;

/// Fixed resampling granularity for tick-to-bar aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1s")]
    S1,
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
}

impl Timeframe {
    /// Truncate a timestamp to the start of its bucket.
    ///
    /// Returns `None` for instants that cannot be truncated (leap-second
    /// representations outside chrono's settable range); callers drop such
    /// ticks as feed noise.
    pub fn bucket_start(&self, ts: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let ts = ts.with_nanosecond(0)?;
        match self {
            Timeframe::S1 => Some(ts),
            Timeframe::M1 => ts.with_second(0),
            Timeframe::M5 => ts.with_second(0)?.with_minute(ts.minute() - ts.minute() % 5),
        }
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1s" => Ok(Timeframe::S1),
            "1m" => Ok(Timeframe::M1),
            "5m" => Ok(Timeframe::M5),
            other => Err(format!(
                "unsupported timeframe '{}', expected one of 1s/1m/5m",
                other
            )),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Timeframe::S1 => "1s",
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
        };
        f.write_str(s)
    }
}

/// One OHLCV bucket. Derived from ticks per query, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub count: u64,
}

impl Bar {
    fn new(time: DateTime<Utc>, price: f64, size: f64) -> Self {
        Self {
            time,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: size,
            count: 1,
        }
    }

    /// Fold one more tick into the bucket. Close always tracks the latest
    /// tick in encounter order.
    fn update(&mut self, price: f64, size: f64) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
        self.volume += size;
        self.count += 1;
    }
}

/// Group ticks into fixed-width buckets and reduce each to OHLCV statistics.
///
/// Buckets come out sorted ascending by start time with no duplicate keys.
/// Ticks whose timestamp cannot be bucketed are dropped silently. Empty input
/// yields an empty vector.
pub fn aggregate_ticks(ticks: &[Tick], timeframe: Timeframe) -> Vec<Bar> {
    let mut buckets: BTreeMap<DateTime<Utc>, Bar> = BTreeMap::new();
    for tick in ticks {
        let Some(key) = timeframe.bucket_start(tick.ts) else {
            continue;
        };
        match buckets.get_mut(&key) {
            Some(bar) => bar.update(tick.price, tick.size),
            None => {
                buckets.insert(key, Bar::new(key, tick.price, tick.size));
            }
        }
    }
    buckets.into_values().collect()
}
