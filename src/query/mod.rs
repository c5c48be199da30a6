//! Query operations
//!
//! Entry points of the analytics core. Every operation validates its
//! arguments before touching the event source, reads a snapshot through
//! [`EventSource`], and returns a serializable result or a tagged
//! [`AnalyticsError`](crate::error::AnalyticsError).
//!
//! - [`single::query_hits`]: hits and gaps of one bucket
//! - [`batch::query_batch`]: up to `max_batch_buckets` buckets in one call
//! - [`range::query_range_stats`]: gap statistics per sequence window
//! - [`range::query_global_stats`]: whole-stream statistics and ETAs
//! - [`density::query_density`]: event counts per sequence window
//! - [`metrics::query_metrics`]: dashboard aggregate for one stream

pub mod batch;
pub mod density;
pub mod metrics;
pub mod range;
pub mod single;

use crate::bucket::Tolerance;
use crate::error::{AnalyticsError, QueryResult};
use crate::gaps::{self, Hit};
use crate::source::{Event, EventFilter, EventSource, SequenceRange, StreamId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use batch::{query_batch, BatchHitQuery, BatchHitResult};
pub use density::{query_density, DensityResult};
pub use metrics::{query_metrics, MetricsQuery, StreamMetrics};
pub use range::{
    query_global_stats, query_range_stats, GlobalStatsQuery, GlobalStatsResult,
    HitProbabilityModel, ProbabilityTable, RangeStatsQuery, RangeStatsResult,
};
pub use single::{query_hits, HitOrder, HitQuery, HitQueryResult};

/// Cooperative cancellation flag shared between a host and a running query
///
/// Cloning shares the flag. Once cancelled it stays cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fail with `Cancelled` if cancellation was requested
    pub fn check(&self) -> QueryResult<()> {
        if self.is_cancelled() {
            Err(AnalyticsError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Enforce `1 <= limit <= max_limit`
pub fn validate_limit(limit: usize, max_limit: usize) -> QueryResult<()> {
    if limit == 0 || limit > max_limit {
        return Err(AnalyticsError::invalid(format!(
            "limit must be between 1 and {max_limit}, got {limit}"
        )));
    }
    Ok(())
}

/// Hits of one target bucket inside `range`, ascending, gaps per exact partition
///
/// The filter is re-applied to whatever the source returns.
pub(crate) fn fetch_bucket_hits<S: EventSource + ?Sized>(
    source: &S,
    stream: &StreamId,
    target: f64,
    tolerance: Tolerance,
    range: SequenceRange,
) -> QueryResult<Vec<Hit>> {
    let filter = EventFilter::bucket(target, tolerance).within(range);
    let mut events = source.fetch_events(stream, &filter)?;
    events.retain(|e| filter.accepts(e));
    Ok(gaps::sequence_partitioned(events))
}

/// Hits of one bucket inside `range` plus the largest in-bucket index `<= after`
///
/// Both come from one read bounded only by `before`, so they describe the
/// same snapshot.
pub(crate) fn fetch_bucket_with_context<S: EventSource + ?Sized>(
    source: &S,
    stream: &StreamId,
    target: f64,
    tolerance: Tolerance,
    range: SequenceRange,
) -> QueryResult<(Vec<Hit>, Option<u64>)> {
    let read_range = SequenceRange {
        after: None,
        before: range.before,
    };
    let filter = EventFilter::bucket(target, tolerance).within(read_range);
    let mut events = source.fetch_events(stream, &filter)?;
    events.retain(|e| filter.accepts(e));

    let (in_range, earlier): (Vec<Event>, Vec<Event>) = events
        .into_iter()
        .partition(|e| range.contains(e.sequence_index));
    let prev_before_range = earlier.iter().map(|e| e.sequence_index).max();
    Ok((gaps::sequence_partitioned(in_range), prev_before_range))
}
