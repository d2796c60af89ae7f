use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single normalized trade. Immutable once ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: String,
    pub ts: DateTime<Utc>,
    pub price: f64,
    pub size: f64,
}

impl Tick {
    /// Build a tick with the symbol normalized to its canonical uppercase form.
    pub fn new(symbol: &str, ts: DateTime<Utc>, price: f64, size: f64) -> Self {
        Self {
            symbol: symbol.to_ascii_uppercase(),
            ts,
            price,
            size,
        }
    }
}
