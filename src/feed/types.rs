use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use crate::model::tick::Tick;

/// Deserialize string-encoded numbers to f64.
pub fn string_to_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse::<f64>().map_err(serde::de::Error::custom)
}

pub fn string_or_number_to_f64_default<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(deserializer)?;
    match v {
        serde_json::Value::Null => Ok(0.0),
        serde_json::Value::String(s) => s.parse::<f64>().map_err(serde::de::Error::custom),
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom("invalid number")),
        _ => Err(serde::de::Error::custom("invalid numeric value")),
    }
}

/// Millisecond timestamps that may be absent or malformed; both read as
/// `None` so normalization falls back instead of rejecting the event.
fn lenient_ms<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let v = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(v.and_then(|v| v.as_i64()))
}

/// Raw trade stream event (symbol@trade).
#[derive(Debug, Deserialize)]
pub struct TradeEvent {
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "E", default, deserialize_with = "lenient_ms")]
    pub event_time: Option<i64>,
    #[serde(rename = "s")]
    pub symbol: Option<String>,
    #[serde(rename = "T", default, deserialize_with = "lenient_ms")]
    pub trade_time: Option<i64>,
    #[serde(rename = "p", deserialize_with = "string_to_f64")]
    pub price: f64,
    #[serde(rename = "q", default, deserialize_with = "string_or_number_to_f64_default")]
    pub qty: f64,
}

impl TradeEvent {
    pub fn is_trade(&self) -> bool {
        self.event_type == "trade"
    }

    /// Normalize into a tick: symbol uppercased (subscription symbol when the
    /// event carries none), timestamp from the exchange trade time, falling
    /// back to event time, falling back to `now`.
    pub fn into_tick(self, fallback_symbol: &str, now: DateTime<Utc>) -> Tick {
        let ts = self
            .trade_time
            .or(self.event_time)
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or(now);
        let symbol = self.symbol.as_deref().unwrap_or(fallback_symbol);
        Tick::new(symbol, ts, self.price, self.qty)
    }
}
