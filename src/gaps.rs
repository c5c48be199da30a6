//! Gap sequencing
//!
//! Turns an ordered run of events into hits annotated with the distance (in
//! sequence index) to the previous hit of the same bucket partition. This is
//! the "lag within partition, ordered by sequence index" computation done as
//! one pass over a sorted slice.
//!
//! # Ordering
//!
//! Input order is never trusted. Events are sorted by `sequence_index`, ties
//! broken by `received_order`, before any gap is taken. Duplicate sequence
//! indices are kept and produce a zero gap.
//!
//! # Example
//!
//! ```
//! use hitpulse::gaps::sequence_partitioned;
//! use hitpulse::source::Event;
//! use chrono::Utc;
//!
//! let events: Vec<Event> = [600, 100, 300]
//!     .iter()
//!     .enumerate()
//!     .map(|(i, &seq)| Event {
//!         sequence_index: seq,
//!         result: 1000.0,
//!         received_order: i as u64,
//!         received_at: Utc::now(),
//!     })
//!     .collect();
//!
//! let hits = sequence_partitioned(events);
//! let gaps: Vec<Option<u64>> = hits.iter().map(|h| h.gap).collect();
//! assert_eq!(gaps, vec![None, Some(200), Some(300)]);
//! ```

use crate::bucket::{quantize, BucketKey};
use crate::source::Event;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An event selected by a query, with its gap to the previous same-bucket hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub sequence_index: u64,
    pub result: f64,
    /// Exact bucket partition this hit belongs to
    pub bucket: BucketKey,
    /// Distance to the previous hit in `bucket`; `None` for the first one
    pub gap: Option<u64>,
    pub received_order: u64,
    pub received_at: DateTime<Utc>,
}

impl Hit {
    fn from_event(event: Event, bucket: BucketKey, gap: Option<u64>) -> Self {
        Self {
            sequence_index: event.sequence_index,
            result: event.result,
            bucket,
            gap,
            received_order: event.received_order,
            received_at: event.received_at,
        }
    }
}

/// Sort events into analytic order: sequence index, then arrival order
pub fn sort_events(events: &mut [Event]) {
    events.sort_by_key(|e| (e.sequence_index, e.received_order));
}

/// Gaps computed within each exact bucket partition
///
/// Tolerance selection can admit events from neighbouring buckets; each
/// gap is still taken against the previous hit with the same [`BucketKey`].
/// Output stays in global sequence order.
pub fn sequence_partitioned(mut events: Vec<Event>) -> Vec<Hit> {
    sort_events(&mut events);

    let mut last_seen: HashMap<BucketKey, u64> = HashMap::new();
    events
        .into_iter()
        .map(|event| {
            let bucket = quantize(event.result);
            let gap = last_seen
                .insert(bucket, event.sequence_index)
                .map(|prev| event.sequence_index - prev);
            Hit::from_event(event, bucket, gap)
        })
        .collect()
}

/// Gap values of a hit list, skipping first-of-partition hits
pub fn gap_values(hits: &[Hit]) -> Vec<u64> {
    hits.iter().filter_map(|h| h.gap).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    fn event(sequence_index: u64, result: f64, received_order: u64) -> Event {
        Event {
            sequence_index,
            result,
            received_order,
            received_at: Utc::now(),
        }
    }

    fn gaps_of(hits: &[Hit]) -> Vec<Option<u64>> {
        hits.iter().map(|h| h.gap).collect()
    }

    #[test]
    fn test_first_hit_has_no_gap() {
        let hits = sequence_partitioned(vec![event(42, 5.0, 1)]);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].gap, None);
    }

    #[test]
    fn test_empty_input() {
        assert!(sequence_partitioned(Vec::new()).is_empty());
    }

    #[test]
    fn test_gaps_are_consecutive_differences() {
        let hits = sequence_partitioned(vec![
            event(100, 1000.0, 1),
            event(300, 1000.0, 2),
            event(600, 1000.0, 3),
        ]);
        assert_eq!(gaps_of(&hits), vec![None, Some(200), Some(300)]);
        assert_eq!(gap_values(&hits), vec![200, 300]);
    }

    #[test]
    fn test_gaps_independent_of_input_order() {
        let sequence: Vec<u64> = vec![3, 17, 18, 40, 41, 90, 250, 251, 1000];
        let expected: Vec<Option<u64>> = std::iter::once(None)
            .chain(sequence.windows(2).map(|w| Some(w[1] - w[0])))
            .collect();

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..25 {
            let mut events: Vec<Event> = sequence
                .iter()
                .enumerate()
                .map(|(i, &s)| event(s, 11200.0, i as u64))
                .collect();
            events.shuffle(&mut rng);

            assert_eq!(gaps_of(&sequence_partitioned(events)), expected);
        }
    }

    #[test]
    fn test_duplicate_indices_yield_zero_gap() {
        let hits = sequence_partitioned(vec![
            event(100, 2.0, 9),
            event(100, 2.0, 4),
            event(150, 2.0, 5),
        ]);
        assert_eq!(gaps_of(&hits), vec![None, Some(0), Some(50)]);
        // Ties broken by arrival order
        assert_eq!(hits[0].received_order, 4);
        assert_eq!(hits[1].received_order, 9);
    }

    #[test]
    fn test_partitioned_gaps_per_exact_bucket() {
        // 2.00 and 2.01 are different partitions even if a query selects both
        let hits = sequence_partitioned(vec![
            event(10, 2.0, 1),
            event(15, 2.01, 2),
            event(30, 2.0, 3),
            event(45, 2.01, 4),
        ]);
        assert_eq!(gaps_of(&hits), vec![None, None, Some(20), Some(30)]);
        assert_eq!(hits[1].bucket.to_string(), "2.01");
    }
}
