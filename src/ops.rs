//! Request-driven entry points: the invocation contract shared by the
//! out-of-process request layer and the periodic publisher.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analytics::engine::{compute_analytics, hedge_ratio, AnalyticsResult};
use crate::analytics::stationarity::{adf_test, AdfReport};
use crate::analytics::{align_series, AlignedSeries};
use crate::error::PairstreamError;
use crate::model::bar::{aggregate_ticks, Timeframe};
use crate::store::TickStore;

type Result<T> = std::result::Result<T, PairstreamError>;

/// Parameters common to every pair operation.
#[derive(Debug, Clone)]
pub struct PairQuery {
    pub symbol_x: String,
    pub symbol_y: String,
    pub timeframe: Timeframe,
    pub range: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceData {
    pub times: Vec<DateTime<Utc>>,
    pub x_prices: Vec<f64>,
    pub y_prices: Vec<f64>,
}

/// The analytics payload shape broadcast by the publisher and returned by
/// the on-demand analyze operation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsPayload {
    pub symbol_x: String,
    pub symbol_y: String,
    pub timeframe: Timeframe,
    pub window: usize,
    pub data_points: usize,
    pub analytics: AnalyticsResult,
    pub price_data: PriceData,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdfPairReport {
    pub symbol_x: String,
    pub symbol_y: String,
    pub hedge_ratio: f64,
    pub samples: usize,
    pub adf_result: AdfReport,
}

/// Query, aggregate and inner-join both legs of a pair.
fn load_aligned(store: &TickStore, query: &PairQuery) -> Result<AlignedSeries> {
    let ticks_x = store.query_ticks(&query.symbol_x, query.range)?;
    let ticks_y = store.query_ticks(&query.symbol_y, query.range)?;
    let bars_x = aggregate_ticks(&ticks_x, query.timeframe);
    let bars_y = aggregate_ticks(&ticks_y, query.timeframe);
    Ok(align_series(&bars_x, &bars_y))
}

/// Full relative-value analysis for a pair.
///
/// `None` is the defined negative outcome for insufficient data: either leg
/// empty, or no overlapping buckets.
pub fn analyze(store: &TickStore, query: &PairQuery, window: usize) -> Result<Option<AnalyticsPayload>> {
    let aligned = load_aligned(store, query)?;
    if aligned.is_empty() {
        return Ok(None);
    }

    let analytics = compute_analytics(&aligned, window);
    let payload = AnalyticsPayload {
        symbol_x: query.symbol_x.to_ascii_uppercase(),
        symbol_y: query.symbol_y.to_ascii_uppercase(),
        timeframe: query.timeframe,
        window,
        data_points: aligned.len(),
        price_data: PriceData {
            times: aligned.times(),
            x_prices: aligned.x_closes(),
            y_prices: aligned.y_closes(),
        },
        analytics,
    };
    Ok(Some(payload))
}

/// Stationarity check of the pair's hedged spread.
pub fn stationarity(store: &TickStore, query: &PairQuery) -> Result<Option<AdfPairReport>> {
    let aligned = load_aligned(store, query)?;
    if aligned.is_empty() {
        return Ok(None);
    }

    let x_prices = aligned.x_closes();
    let y_prices = aligned.y_closes();
    let fit = hedge_ratio(&x_prices, &y_prices);
    let spread: Vec<f64> = y_prices
        .iter()
        .zip(&x_prices)
        .map(|(y, x)| y - fit.slope * x)
        .collect();

    Ok(Some(AdfPairReport {
        symbol_x: query.symbol_x.to_ascii_uppercase(),
        symbol_y: query.symbol_y.to_ascii_uppercase(),
        hedge_ratio: fit.slope,
        samples: spread.len(),
        adf_result: adf_test(&spread),
    }))
}

/// Aligned close prices as delimited text. The spread column is the raw
/// close difference, not the hedged spread. An empty alignment yields just
/// the header line.
pub fn export_csv(store: &TickStore, query: &PairQuery) -> Result<String> {
    let aligned = load_aligned(store, query)?;

    let mut out = String::from("Time,X_Close,Y_Close,Spread\n");
    for (bar_x, bar_y) in aligned.x().iter().zip(aligned.y()) {
        let spread = bar_y.close - bar_x.close;
        out.push_str(&format!(
            "{},{},{},{}\n",
            bar_x.time.to_rfc3339(),
            bar_x.close,
            bar_y.close,
            spread
        ));
    }
    Ok(out)
}
