use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::model::bar::Bar;

pub mod engine;
pub mod stationarity;

/// Denominator floor for the closed-form regression/correlation formulas.
pub const EPSILON: f64 = 1e-12;

/// A pair of equal-length bar series, index-aligned by bucket timestamp.
///
/// Only constructed through [`align_series`], which enforces
/// `x.len() == y.len()` and `x[i].time == y[i].time`.
#[derive(Debug, Clone)]
pub struct AlignedSeries {
    x: Vec<Bar>,
    y: Vec<Bar>,
}

impl AlignedSeries {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn x(&self) -> &[Bar] {
        &self.x
    }

    pub fn y(&self) -> &[Bar] {
        &self.y
    }

    pub fn times(&self) -> Vec<DateTime<Utc>> {
        self.x.iter().map(|b| b.time).collect()
    }

    pub fn x_closes(&self) -> Vec<f64> {
        self.x.iter().map(|b| b.close).collect()
    }

    pub fn y_closes(&self) -> Vec<f64> {
        self.y.iter().map(|b| b.close).collect()
    }
}

/// Inner-join two bar series on exact bucket time.
///
/// Buckets present in only one series are dropped. Both inputs come out of
/// the aggregator sorted ascending, so the aligned result is ascending too.
pub fn align_series(x: &[Bar], y: &[Bar]) -> AlignedSeries {
    let x_index: HashMap<DateTime<Utc>, usize> =
        x.iter().enumerate().map(|(i, b)| (b.time, i)).collect();

    let mut aligned_x = Vec::new();
    let mut aligned_y = Vec::new();
    for bar_y in y {
        if let Some(&i) = x_index.get(&bar_y.time) {
            aligned_x.push(x[i].clone());
            aligned_y.push(bar_y.clone());
        }
    }
    AlignedSeries {
        x: aligned_x,
        y: aligned_y,
    }
}
