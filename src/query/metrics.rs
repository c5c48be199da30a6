//! Stream metrics
//!
//! Dashboard aggregate for one stream: headline figures, per-bucket gap
//! summaries with ETAs, the density histogram, and the highest results.
//! Everything is computed from a single read of the stream, so the parts of
//! one response always describe the same snapshot.

use super::density::validate_window_size;
use super::range::{observed_eta, theoretical_eta, HitProbabilityModel};
use crate::bucket::{validate_bucket_count, validate_bucket_value, Tolerance};
use crate::config::QueryConfig;
use crate::error::{AnalyticsError, QueryResult};
use crate::gaps::{gap_values, sequence_partitioned};
use crate::source::{ensure_stream, Event, EventFilter, EventSource, StreamId};
use crate::stats::density::DensityHistogram;
use crate::stats::GapStatistics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Parameters of a metrics query
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsQuery {
    /// Buckets to summarize; may be empty
    pub targets: Vec<f64>,
    pub tolerance: f64,
    pub window_size: u64,
    pub top_peaks: usize,
}

impl MetricsQuery {
    pub fn new(targets: Vec<f64>, config: &QueryConfig) -> Self {
        Self {
            targets,
            tolerance: config.default_tolerance,
            window_size: config.default_window_size,
            top_peaks: config.default_top_peaks,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_window_size(mut self, window_size: u64) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn with_top_peaks(mut self, top_peaks: usize) -> Self {
        self.top_peaks = top_peaks;
        self
    }

    fn validate(&self, config: &QueryConfig) -> QueryResult<Tolerance> {
        let tolerance = Tolerance::new(self.tolerance)?;
        validate_window_size(self.window_size)?;
        if self.top_peaks == 0 || self.top_peaks > config.max_top_peaks {
            return Err(AnalyticsError::invalid(format!(
                "top_peaks must be between 1 and {}",
                config.max_top_peaks
            )));
        }
        if !self.targets.is_empty() {
            validate_bucket_count(self.targets.len(), config.max_batch_buckets)?;
        }
        for target in &self.targets {
            validate_bucket_value(*target)?;
        }
        Ok(tolerance)
    }
}

/// Gap summary of one target bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketMetrics {
    pub bucket: f64,
    pub count: usize,
    pub last_sequence_index: Option<u64>,
    pub stats: GapStatistics,
    pub eta_observed: Option<f64>,
    pub eta_theoretical: Option<f64>,
}

/// One of the highest results in the stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    pub result: f64,
    pub sequence_index: u64,
    pub received_order: u64,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMetrics {
    pub stream: StreamId,
    pub total_events: usize,
    pub highest_result: Option<f64>,
    /// Events per minute between the first and last arrival
    pub hit_rate_per_minute: f64,
    pub buckets: Vec<BucketMetrics>,
    pub window_size: u64,
    pub density: BTreeMap<u64, u64>,
    pub top_peaks: Vec<Peak>,
}

/// Compute stream metrics
///
/// `model` supplies theoretical ETAs; without it they are null.
pub fn query_metrics<S: EventSource + ?Sized>(
    source: &S,
    stream: &StreamId,
    query: &MetricsQuery,
    config: &QueryConfig,
    model: Option<&dyn HitProbabilityModel>,
) -> QueryResult<StreamMetrics> {
    let tolerance = query.validate(config)?;
    ensure_stream(source, stream)?;

    let filter = EventFilter::all();
    let mut events = source.fetch_events(stream, &filter)?;
    crate::gaps::sort_events(&mut events);

    let buckets = query
        .targets
        .iter()
        .map(|&target| {
            let selected = EventFilter::bucket(target, tolerance);
            let matching: Vec<Event> = events
                .iter()
                .filter(|e| selected.accepts(e))
                .cloned()
                .collect();
            let hits = sequence_partitioned(matching);
            let stats = GapStatistics::from_gaps(&gap_values(&hits));
            let last_sequence_index = hits.last().map(|h| h.sequence_index);
            BucketMetrics {
                bucket: target,
                count: hits.len(),
                last_sequence_index,
                eta_observed: observed_eta(last_sequence_index, &stats),
                eta_theoretical: theoretical_eta(last_sequence_index, target, model),
                stats,
            }
        })
        .collect();

    let mut density = DensityHistogram::new(query.window_size);
    density.record_all(events.iter().map(|e| e.sequence_index));

    let metrics = StreamMetrics {
        stream: stream.clone(),
        total_events: events.len(),
        highest_result: events.iter().map(|e| e.result).reduce(f64::max),
        hit_rate_per_minute: hit_rate_per_minute(&events),
        buckets,
        window_size: density.window_size(),
        density: density.into_counts(),
        top_peaks: top_peaks(&events, query.top_peaks),
    };

    debug!(
        stream = %stream,
        events = metrics.total_events,
        targets = query.targets.len(),
        "metrics query"
    );
    Ok(metrics)
}

/// Events per minute over the arrival span, 0 when the span is empty
pub fn hit_rate_per_minute(events: &[Event]) -> f64 {
    let first = events.iter().map(|e| e.received_at).min();
    let last = events.iter().map(|e| e.received_at).max();
    match (first, last) {
        (Some(first), Some(last)) => {
            let seconds = (last - first).num_milliseconds() as f64 / 1000.0;
            if seconds > 0.0 {
                events.len() as f64 * 60.0 / seconds
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

/// Highest `limit` results, ties by ascending sequence index then arrival
pub fn top_peaks(events: &[Event], limit: usize) -> Vec<Peak> {
    let mut ranked: Vec<&Event> = events.iter().collect();
    ranked.sort_by(|a, b| {
        b.result
            .total_cmp(&a.result)
            .then(a.sequence_index.cmp(&b.sequence_index))
            .then(a.received_order.cmp(&b.received_order))
    });
    ranked
        .into_iter()
        .take(limit)
        .map(|e| Peak {
            result: e.result,
            sequence_index: e.sequence_index,
            received_order: e.received_order,
            received_at: e.received_at,
        })
        .collect()
}
