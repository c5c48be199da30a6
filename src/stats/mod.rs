//! Gap statistics
//!
//! Reduces a gap sequence to descriptive statistics. All figures are computed
//! from the fully materialized sequence (`method = "exact"`).
//!
//! # Empty-data policy
//!
//! A bucket with no gaps is valid data, not a failure: [`GapStatistics::from_gaps`]
//! on an empty slice returns `count = 0` with every other figure `None`.
//!
//! # Percentiles
//!
//! `p90` is a nearest-rank approximation: the sorted gaps are indexed at
//! `floor(0.9 * count)`, clamped to the last element. It is not interpolated,
//! so it always equals one of the observed gaps.
//!
//! # Example
//!
//! ```
//! use hitpulse::stats::GapStatistics;
//!
//! let stats = GapStatistics::from_gaps(&[200, 300]);
//! assert_eq!(stats.count, 2);
//! assert_eq!(stats.mean, Some(250.0));
//! assert_eq!(stats.min, Some(200));
//! assert_eq!(stats.max, Some(300));
//!
//! let empty = GapStatistics::from_gaps(&[]);
//! assert_eq!(empty.count, 0);
//! assert!(empty.mean.is_none());
//! ```

pub mod density;

use serde::{Deserialize, Serialize};

/// How a statistics result was computed
///
/// Only `Exact` exists today. A sampled mode may be added later and must keep
/// the same output shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsMethod {
    #[default]
    Exact,
}

/// Descriptive statistics over a gap sequence
///
/// Every field is always serialized; absent values appear as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapStatistics {
    pub count: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    /// Population standard deviation (divides by `count`)
    pub std_dev: Option<f64>,
    pub min: Option<u64>,
    pub max: Option<u64>,
    /// Nearest-rank 90th percentile
    pub p90: Option<u64>,
    pub method: StatsMethod,
}

impl GapStatistics {
    /// Zero-count result
    pub fn empty() -> Self {
        Self {
            count: 0,
            mean: None,
            median: None,
            std_dev: None,
            min: None,
            max: None,
            p90: None,
            method: StatsMethod::Exact,
        }
    }

    /// Compute statistics over `gaps` (any order)
    pub fn from_gaps(gaps: &[u64]) -> Self {
        if gaps.is_empty() {
            return Self::empty();
        }

        let mut sorted = gaps.to_vec();
        sorted.sort_unstable();
        let count = sorted.len();
        let n = count as f64;

        let mean = sorted.iter().map(|&g| g as f64).sum::<f64>() / n;
        let variance = sorted
            .iter()
            .map(|&g| {
                let d = g as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n;

        let median = if count % 2 == 1 {
            sorted[count / 2] as f64
        } else {
            (sorted[count / 2 - 1] as f64 + sorted[count / 2] as f64) / 2.0
        };

        Self {
            count,
            mean: Some(mean),
            median: Some(median),
            std_dev: Some(variance.sqrt()),
            min: sorted.first().copied(),
            max: sorted.last().copied(),
            p90: nearest_rank(&sorted, 9, 10),
            method: StatsMethod::Exact,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl Default for GapStatistics {
    fn default() -> Self {
        Self::empty()
    }
}

/// Nearest-rank percentile `numerator / denominator` over an ascending slice
///
/// Index is `floor(len * numerator / denominator)` clamped to `len - 1`;
/// integer arithmetic keeps the index exact.
pub fn nearest_rank(sorted: &[u64], numerator: usize, denominator: usize) -> Option<u64> {
    if sorted.is_empty() || denominator == 0 {
        return None;
    }
    let index = (sorted.len() * numerator / denominator).min(sorted.len() - 1);
    Some(sorted[index])
}

/// Normal-approximation confidence interval for the mean gap
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
    /// Critical value used (1.96 for ~95%)
    pub z: f64,
    pub sample_size: usize,
}

impl ConfidenceInterval {
    /// `mean ± z·σ/√n`, or `None` below `min_sample` gaps
    ///
    /// Small samples get an explicit `None` rather than a misleading number.
    /// `min_sample` is raised to 2 so a single gap never yields an interval.
    pub fn for_mean(stats: &GapStatistics, min_sample: usize, z: f64) -> Option<Self> {
        if stats.count < min_sample.max(2) {
            return None;
        }
        let mean = stats.mean?;
        let std_dev = stats.std_dev?;
        let half_width = z * std_dev / (stats.count as f64).sqrt();
        Some(Self {
            lower: (mean - half_width).max(0.0),
            upper: mean + half_width,
            z,
            sample_size: stats.count,
        })
    }
}
