//! Sequence-index density histogram
//!
//! Counts events per fixed-width window `[k * width, (k + 1) * width)` of the
//! sequence-index domain, regardless of result value. Not to be confused with
//! result buckets: a window is a span of nonces.
//!
//! The histogram is sparse. Windows with no events are never stored, so a
//! stream spanning millions of nonces costs memory proportional to the
//! occupied windows only.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sparse per-window event counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DensityHistogram {
    window_size: u64,
    counts: BTreeMap<u64, u64>,
}

impl DensityHistogram {
    /// Create an empty histogram
    ///
    /// A zero width is treated as 1; query entry points reject zero before
    /// getting here.
    pub fn new(window_size: u64) -> Self {
        Self {
            window_size: window_size.max(1),
            counts: BTreeMap::new(),
        }
    }

    /// Window index of a sequence index
    #[inline]
    pub fn window_of(&self, sequence_index: u64) -> u64 {
        sequence_index / self.window_size
    }

    /// Count one event
    #[inline]
    pub fn record(&mut self, sequence_index: u64) {
        let window = self.window_of(sequence_index);
        *self.counts.entry(window).or_insert(0) += 1;
    }

    /// Count every sequence index of an iterator
    pub fn record_all<I: IntoIterator<Item = u64>>(&mut self, sequence_indices: I) {
        for sequence_index in sequence_indices {
            self.record(sequence_index);
        }
    }

    pub fn window_size(&self) -> u64 {
        self.window_size
    }

    /// Occupied windows and their counts, ascending by window index
    pub fn into_counts(self) -> BTreeMap<u64, u64> {
        self.counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_boundaries() {
        let mut hist = DensityHistogram::new(1000);
        hist.record_all([0, 999, 1000, 1999, 2000]);
        let counts = hist.into_counts();
        assert_eq!(counts.get(&0), Some(&2));
        assert_eq!(counts.get(&1), Some(&2));
        assert_eq!(counts.get(&2), Some(&1));
        assert_eq!(counts.values().sum::<u64>(), 5);
    }

    #[test]
    fn test_histogram_is_sparse() {
        let mut hist = DensityHistogram::new(10);
        hist.record_all([5, 1_000_000]);
        let windows: Vec<u64> = hist.into_counts().into_keys().collect();
        assert_eq!(windows, vec![0, 100_000]);
    }

    #[test]
    fn test_zero_width_is_clamped() {
        let mut hist = DensityHistogram::new(0);
        hist.record(7);
        assert_eq!(hist.window_size(), 1);
        assert_eq!(hist.into_counts().get(&7), Some(&1));
    }
}
