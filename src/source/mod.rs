//! Event source abstraction
//!
//! The analytics core never owns storage. It reads per-stream events through
//! the [`EventSource`] trait, which a persistence layer implements. This module
//! also defines the data model shared by every query path.
//!
//! # Contract
//!
//! An implementation answers "give me all events for stream S, optionally
//! with result in `[target - tol, target + tol]`, optionally with sequence
//! index inside `(after, before)`, ordered by sequence index then arrival".
//! The core does not trust that ordering (or the filtering): it re-applies
//! both on the materialized slice before computing gaps.
//!
//! # Implementations
//!
//! - [`memory::MemoryEventLog`]: thread-safe in-memory log used by the CLI and tests
//! - [`jsonl`]: loader that fills a memory log from a JSON-lines file

pub mod jsonl;
pub mod memory;

use crate::bucket::{self, Tolerance};
use crate::error::{AnalyticsError, QueryResult, SourceError};
use crate::stats::density::DensityHistogram;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub use memory::MemoryEventLog;

/// Identity of a stream: the immutable (server-seed-hash, client-seed) pair
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StreamId {
    pub server_seed_hash: String,
    pub client_seed: String,
}

impl StreamId {
    pub fn new(server_seed_hash: impl Into<String>, client_seed: impl Into<String>) -> Self {
        Self {
            server_seed_hash: server_seed_hash.into(),
            client_seed: client_seed.into(),
        }
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.server_seed_hash, self.client_seed)
    }
}

/// One recorded outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Position in the stream (nonce), strictly positive, not necessarily unique
    pub sequence_index: u64,
    /// Continuous outcome value, non-negative
    pub result: f64,
    /// Monotonic arrival identifier (recency ordering and tie-breaks only)
    pub received_order: u64,
    /// Arrival time
    pub received_at: DateTime<Utc>,
}

/// Overview of one stream, as listed by `hitpulse streams`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSummary {
    pub stream: StreamId,
    pub total_events: usize,
    pub highest_result: Option<f64>,
    pub last_sequence_index: Option<u64>,
    pub last_received_at: Option<DateTime<Utc>>,
}

/// Open sequence-index interval `after < sequence_index < before`
///
/// Both bounds are optional and exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceRange {
    pub after: Option<u64>,
    pub before: Option<u64>,
}

impl SequenceRange {
    /// Unbounded range
    pub fn all() -> Self {
        Self::default()
    }

    /// Validate and build a range
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when both bounds are given and `before <= after`.
    pub fn new(after: Option<u64>, before: Option<u64>) -> QueryResult<Self> {
        if let (Some(a), Some(b)) = (after, before) {
            if b <= a {
                return Err(AnalyticsError::invalid(format!(
                    "before_nonce must be greater than after_nonce (after={a}, before={b})"
                )));
            }
        }
        Ok(Self { after, before })
    }

    /// Whether a sequence index lies strictly inside the range
    #[inline]
    pub fn contains(&self, sequence_index: u64) -> bool {
        self.after.map_or(true, |a| sequence_index > a)
            && self.before.map_or(true, |b| sequence_index < b)
    }
}

/// Result-value selection window `|result - target| <= tolerance`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResultWindow {
    pub target: f64,
    pub tolerance: Tolerance,
}

impl ResultWindow {
    #[inline]
    pub fn contains(&self, result: f64) -> bool {
        bucket::matches(result, self.target, self.tolerance)
    }
}

/// Filter passed to [`EventSource::fetch_events`]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EventFilter {
    pub result_window: Option<ResultWindow>,
    pub range: SequenceRange,
}

impl EventFilter {
    /// Every event of the stream
    pub fn all() -> Self {
        Self::default()
    }

    /// Events matching `target` within `tolerance`
    pub fn bucket(target: f64, tolerance: Tolerance) -> Self {
        Self {
            result_window: Some(ResultWindow { target, tolerance }),
            range: SequenceRange::all(),
        }
    }

    /// Restrict to a sequence-index range
    pub fn within(mut self, range: SequenceRange) -> Self {
        self.range = range;
        self
    }

    /// Whether an event passes this filter
    #[inline]
    pub fn accepts(&self, event: &Event) -> bool {
        self.range.contains(event.sequence_index)
            && self
                .result_window
                .map_or(true, |window| window.contains(event.result))
    }
}

/// Read capability the analytics core needs from the persistence layer
///
/// Implementations must be `Send + Sync`: batch queries read one source from
/// several rayon workers at once.
pub trait EventSource: Send + Sync {
    /// Whether the stream exists
    fn contains_stream(&self, stream: &StreamId) -> Result<bool, SourceError>;

    /// Events of `stream` accepted by `filter`, ordered by sequence index then
    /// arrival order
    ///
    /// Returns `SourceError::StreamNotFound` if the stream vanished since the
    /// caller last checked.
    fn fetch_events(&self, stream: &StreamId, filter: &EventFilter)
        -> Result<Vec<Event>, SourceError>;

    /// Sparse per-window event counts for the density histogram
    ///
    /// The default implementation counts a full fetch; stores with an
    /// aggregate query should override it.
    fn window_counts(
        &self,
        stream: &StreamId,
        window_size: u64,
    ) -> Result<BTreeMap<u64, u64>, SourceError> {
        let events = self.fetch_events(stream, &EventFilter::all())?;
        let mut histogram = DensityHistogram::new(window_size);
        histogram.record_all(events.iter().map(|e| e.sequence_index));
        Ok(histogram.into_counts())
    }
}

impl<T: EventSource + ?Sized> EventSource for &T {
    fn contains_stream(&self, stream: &StreamId) -> Result<bool, SourceError> {
        (**self).contains_stream(stream)
    }

    fn fetch_events(
        &self,
        stream: &StreamId,
        filter: &EventFilter,
    ) -> Result<Vec<Event>, SourceError> {
        (**self).fetch_events(stream, filter)
    }

    fn window_counts(
        &self,
        stream: &StreamId,
        window_size: u64,
    ) -> Result<BTreeMap<u64, u64>, SourceError> {
        (**self).window_counts(stream, window_size)
    }
}

/// Fail with `NotFound` unless the stream exists
pub fn ensure_stream<S: EventSource + ?Sized>(source: &S, stream: &StreamId) -> QueryResult<()> {
    if source.contains_stream(stream)? {
        Ok(())
    } else {
        Err(AnalyticsError::NotFound {
            stream: stream.clone(),
        })
    }
}
