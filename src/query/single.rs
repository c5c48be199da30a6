//! Single-bucket hit query
//!
//! # Example
//!
//! ```
//! use hitpulse::config::QueryConfig;
//! use hitpulse::query::{query_hits, HitQuery};
//! use hitpulse::source::{MemoryEventLog, StreamId};
//!
//! let log = MemoryEventLog::new();
//! let stream = StreamId::new("hash", "client");
//! for seq in [100, 300, 600] {
//!     log.append(&stream, seq, 1000.0).unwrap();
//! }
//!
//! let config = QueryConfig::default();
//! let query = HitQuery::new(1000.0, &config).with_tolerance(0.01);
//! let result = query_hits(&log, &stream, &query, &config).unwrap();
//!
//! let gaps: Vec<Option<u64>> = result.hits.iter().map(|h| h.gap).collect();
//! assert_eq!(gaps, vec![None, Some(200), Some(300)]);
//! ```

use super::{fetch_bucket_with_context, validate_limit};
use crate::bucket::{validate_bucket_value, Tolerance};
use crate::config::QueryConfig;
use crate::error::QueryResult;
use crate::gaps::Hit;
use crate::source::{ensure_stream, EventSource, SequenceRange, StreamId};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Display order of returned hits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitOrder {
    /// Ascending sequence index
    #[default]
    SequenceAsc,
    /// Most recently received first
    RecentFirst,
}

/// Parameters of a single-bucket query
#[derive(Debug, Clone, PartialEq)]
pub struct HitQuery {
    pub bucket: f64,
    pub tolerance: f64,
    pub after: Option<u64>,
    pub before: Option<u64>,
    pub limit: usize,
    pub order: HitOrder,
    /// Report each hit's gap; when false every `gap` is null
    pub include_distance: bool,
}

impl HitQuery {
    /// Query for `bucket` with tolerance and limit taken from `config`
    pub fn new(bucket: f64, config: &QueryConfig) -> Self {
        Self {
            bucket,
            tolerance: config.default_tolerance,
            after: None,
            before: None,
            limit: config.default_limit,
            order: HitOrder::default(),
            include_distance: true,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Restrict to `after < sequence_index < before`
    pub fn with_range(mut self, after: Option<u64>, before: Option<u64>) -> Self {
        self.after = after;
        self.before = before;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_order(mut self, order: HitOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_distance(mut self, include_distance: bool) -> Self {
        self.include_distance = include_distance;
        self
    }

    /// Argument checks, in reporting order
    fn validate(&self, config: &QueryConfig) -> QueryResult<(Tolerance, SequenceRange)> {
        let tolerance = Tolerance::new(self.tolerance)?;
        validate_bucket_value(self.bucket)?;
        let range = SequenceRange::new(self.after, self.before)?;
        validate_limit(self.limit, config.max_limit)?;
        Ok((tolerance, range))
    }
}

/// Hits of one bucket with their gaps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitQueryResult {
    pub stream: StreamId,
    pub bucket: f64,
    pub tolerance: f64,
    pub after: Option<u64>,
    pub before: Option<u64>,
    pub order: HitOrder,
    pub limit: usize,
    /// Matching hits in range, before `limit` was applied
    pub total_in_range: usize,
    /// Largest in-bucket sequence index at or below `after`
    pub prev_sequence_before_range: Option<u64>,
    pub hits: Vec<Hit>,
}

/// Run a single-bucket query
///
/// Gaps are computed on the full in-range sequence before ordering and
/// `limit` are applied, so limiting never changes a returned hit's gap.
///
/// # Errors
///
/// - `InvalidArgument` for a bad tolerance, bucket, range, or limit (checked
///   in that order, before any data access)
/// - `NotFound` when the stream does not exist
/// - `DataAccess` when the source read fails
pub fn query_hits<S: EventSource + ?Sized>(
    source: &S,
    stream: &StreamId,
    query: &HitQuery,
    config: &QueryConfig,
) -> QueryResult<HitQueryResult> {
    let (tolerance, range) = query.validate(config)?;
    ensure_stream(source, stream)?;

    let (mut hits, prev_sequence_before_range) =
        fetch_bucket_with_context(source, stream, query.bucket, tolerance, range)?;
    let total_in_range = hits.len();

    if query.order == HitOrder::RecentFirst {
        hits.sort_by(|a, b| b.received_order.cmp(&a.received_order));
    }
    hits.truncate(query.limit);
    if !query.include_distance {
        hits.iter_mut().for_each(|hit| hit.gap = None);
    }

    debug!(
        stream = %stream,
        bucket = query.bucket,
        total = total_in_range,
        returned = hits.len(),
        "hit query"
    );

    Ok(HitQueryResult {
        stream: stream.clone(),
        bucket: query.bucket,
        tolerance: tolerance.get(),
        after: query.after,
        before: query.before,
        order: query.order,
        limit: query.limit,
        total_in_range,
        prev_sequence_before_range,
        hits,
    })
}
