//! Histogram bucket boundary computation.
//!
//! Boundaries are the lower bounds of each bucket. Index 0 is always the
//! underflow bucket starting at 0; index 1 starts at `low` and the last
//! bucket starts at (or next to) `high`. The results depend only on the
//! histogram definition, so callers compute them once and reuse them for
//! every ping.

use serde::{Deserialize, Serialize};

/// Value range and bucket count of a linear or exponential histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketRange {
    pub low: i64,
    pub high: i64,
    pub n_buckets: usize,
}

impl BucketRange {
    pub fn new(low: i64, high: i64, n_buckets: usize) -> Self {
        Self {
            low,
            high,
            n_buckets,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.n_buckets < 3 {
            return Err(format!("n_buckets must be at least 3, got {}", self.n_buckets));
        }
        if self.high <= self.low {
            return Err(format!(
                "high ({}) must be greater than low ({})",
                self.high, self.low
            ));
        }
        Ok(())
    }

    pub fn linear(&self) -> Vec<i64> {
        linear_buckets(self.low, self.high, self.n_buckets)
    }

    pub fn exponential(&self) -> Vec<i64> {
        exponential_buckets(self.low, self.high, self.n_buckets)
    }
}

/// Evenly spaced boundaries: `[0, low, ..., high]`, `count` entries.
pub fn linear_buckets(low: i64, high: i64, count: usize) -> Vec<i64> {
    let mut buckets = vec![0i64; count];
    if count < 3 {
        if count == 2 {
            buckets[1] = low;
        }
        return buckets;
    }

    let n = count as f64;
    let (low_f, high_f) = (low as f64, high as f64);
    for (i, bucket) in buckets.iter_mut().enumerate().skip(1) {
        let i = i as f64;
        let linear = (low_f * (n - 1.0 - i) + high_f * (i - 1.0)) / (n - 2.0);
        *bucket = (linear + 0.5).floor() as i64;
    }
    buckets
}

/// Log-spaced boundaries: `[0, low, ..., high]`, `count` entries.
///
/// Each step spreads the remaining log range evenly over the remaining
/// buckets; when rounding would repeat a boundary the next integer is used,
/// so the result is strictly increasing after index 0. A `low` below 1 is
/// treated as 1 since the log scale has no zero.
pub fn exponential_buckets(low: i64, high: i64, count: usize) -> Vec<i64> {
    let mut buckets = vec![0i64; count];
    if count < 2 {
        return buckets;
    }

    let mut current = low.max(1);
    buckets[1] = current;
    let log_max = (high.max(current) as f64).ln();
    for (i, bucket) in buckets.iter_mut().enumerate().skip(2) {
        let log_current = (current as f64).ln();
        let log_ratio = (log_max - log_current) / (count - i) as f64;
        let next = (log_current + log_ratio).exp() + 0.5;
        let next = next.floor() as i64;
        current = if next > current { next } else { current + 1 };
        *bucket = current;
    }
    buckets
}

/// Position of the bucket starting exactly at `value`.
pub fn bucket_index(boundaries: &[i64], value: i64) -> Option<usize> {
    boundaries.binary_search(&value).ok()
}
