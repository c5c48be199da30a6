//! Range and global gap statistics, ETA projection
//!
//! Gaps here are always computed over the whole (unscoped) bucket sequence.
//! A range window then selects the gaps whose closing hit lies inside it, so
//! the first hit of a window still carries its distance to the previous hit
//! even when that hit sits in an earlier window.

use crate::bucket::{quantize, validate_bucket_value, BucketKey, Tolerance};
use crate::config::QueryConfig;
use crate::error::{AnalyticsError, QueryResult};
use crate::gaps::{sequence_partitioned, Hit};
use crate::query::fetch_bucket_hits;
use crate::source::{ensure_stream, EventFilter, EventSource, SequenceRange, StreamId};
use crate::stats::{ConfidenceInterval, GapStatistics};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Per-event hit probability of a bucket
///
/// Supplies the theoretical ETA. The core ships [`ProbabilityTable`]; a host
/// with a closed-form payout model can implement this directly.
pub trait HitProbabilityModel: Send + Sync {
    /// Probability in `(0, 1]` that one event lands in `bucket`, if known
    fn hit_probability(&self, bucket: BucketKey) -> Option<f64>;
}

/// Lookup table of hit probabilities keyed by bucket
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbabilityTable {
    probabilities: HashMap<BucketKey, f64>,
}

impl ProbabilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the probability of `bucket` (quantized)
    pub fn insert(&mut self, bucket: f64, probability: f64) -> QueryResult<()> {
        validate_bucket_value(bucket)?;
        if !(probability > 0.0 && probability <= 1.0) {
            return Err(AnalyticsError::invalid(format!(
                "hit probability must be in (0, 1], got {probability}"
            )));
        }
        self.probabilities.insert(quantize(bucket), probability);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.probabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probabilities.is_empty()
    }
}

impl HitProbabilityModel for ProbabilityTable {
    fn hit_probability(&self, bucket: BucketKey) -> Option<f64> {
        self.probabilities.get(&bucket).copied()
    }
}

/// Half-open sequence window `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceWindow {
    pub start: u64,
    pub end: u64,
}

impl SequenceWindow {
    pub fn new(start: u64, end: u64) -> QueryResult<Self> {
        if end <= start {
            return Err(AnalyticsError::invalid(format!(
                "Invalid range {start}-{end}: end must be greater than start"
            )));
        }
        Ok(Self { start, end })
    }

    #[inline]
    pub fn contains(&self, sequence_index: u64) -> bool {
        sequence_index >= self.start && sequence_index < self.end
    }

    /// `"start-end"`, the form accepted by [`parse_windows`]
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SequenceWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Parse `"0-500,500-1500"` into windows
///
/// Each entry is validated on its own; the first bad entry is reported.
/// Overlapping windows are allowed. A string with no entries is rejected.
pub fn parse_windows(raw: &str) -> QueryResult<Vec<SequenceWindow>> {
    let windows = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_window)
        .collect::<QueryResult<Vec<_>>>()?;
    if windows.is_empty() {
        return Err(AnalyticsError::invalid(
            "At least one range must be provided (expected start-end)",
        ));
    }
    Ok(windows)
}

fn parse_window(entry: &str) -> QueryResult<SequenceWindow> {
    let malformed = || {
        AnalyticsError::invalid(format!(
            "Invalid range format: {entry} (expected start-end)"
        ))
    };
    let (start, end) = entry.split_once('-').ok_or_else(malformed)?;
    let (start, end) = (start.trim(), end.trim());

    // "-5-10" splits at the sign, "5--3" and "5- -3" leave it on `end`
    if (start.is_empty() && !end.is_empty()) || end.starts_with('-') {
        return Err(AnalyticsError::invalid(format!(
            "Invalid range {entry}: bounds cannot be negative"
        )));
    }

    let start: u64 = start.parse().map_err(|_| malformed())?;
    let end: u64 = end.parse().map_err(|_| malformed())?;
    SequenceWindow::new(start, end)
}

/// Parameters of a range statistics query
#[derive(Debug, Clone, PartialEq)]
pub struct RangeStatsQuery {
    pub bucket: f64,
    pub tolerance: f64,
    /// Raw window list; `None` means one window over the observed domain
    pub ranges: Option<String>,
}

impl RangeStatsQuery {
    pub fn new(bucket: f64, config: &QueryConfig) -> Self {
        Self {
            bucket,
            tolerance: config.default_tolerance,
            ranges: None,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_ranges(mut self, ranges: impl Into<String>) -> Self {
        self.ranges = Some(ranges.into());
        self
    }
}

/// Statistics of one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeStatistics {
    pub range: String,
    pub start: u64,
    pub end: u64,
    pub stats: GapStatistics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeStatsResult {
    pub stream: StreamId,
    pub bucket: f64,
    pub tolerance: f64,
    /// In request order
    pub stats_by_range: Vec<RangeStatistics>,
}

/// Gap statistics per sequence window
///
/// # Errors
///
/// `InvalidArgument` for a bad tolerance, bucket, or any malformed window
/// (all checked before data access), `NotFound`, `DataAccess`.
pub fn query_range_stats<S: EventSource + ?Sized>(
    source: &S,
    stream: &StreamId,
    query: &RangeStatsQuery,
    _config: &QueryConfig,
) -> QueryResult<RangeStatsResult> {
    let tolerance = Tolerance::new(query.tolerance)?;
    validate_bucket_value(query.bucket)?;
    let requested = match &query.ranges {
        Some(raw) => Some(parse_windows(raw)?),
        None => None,
    };
    ensure_stream(source, stream)?;

    let (windows, hits) = match requested {
        Some(windows) => {
            let hits =
                fetch_bucket_hits(source, stream, query.bucket, tolerance, SequenceRange::all())?;
            (windows, hits)
        }
        None => {
            // The default window and the hits must come from the same read
            let mut events = source.fetch_events(stream, &EventFilter::all())?;
            let max = events.iter().map(|e| e.sequence_index).max().unwrap_or(0);
            let selected = EventFilter::bucket(query.bucket, tolerance);
            events.retain(|e| selected.accepts(e));
            let window = SequenceWindow::new(0, max.saturating_add(1))?;
            (vec![window], sequence_partitioned(events))
        }
    };
    let stats_by_range = windows
        .iter()
        .map(|window| RangeStatistics {
            range: window.label(),
            start: window.start,
            end: window.end,
            stats: GapStatistics::from_gaps(&gaps_in_window(&hits, window)),
        })
        .collect();

    debug!(stream = %stream, bucket = query.bucket, windows = windows.len(), "range stats query");

    Ok(RangeStatsResult {
        stream: stream.clone(),
        bucket: query.bucket,
        tolerance: tolerance.get(),
        stats_by_range,
    })
}

fn gaps_in_window(hits: &[Hit], window: &SequenceWindow) -> Vec<u64> {
    hits.iter()
        .filter(|h| window.contains(h.sequence_index))
        .filter_map(|h| h.gap)
        .collect()
}

/// Parameters of a global statistics query
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalStatsQuery {
    pub bucket: f64,
    pub tolerance: f64,
}

impl GlobalStatsQuery {
    pub fn new(bucket: f64, config: &QueryConfig) -> Self {
        Self {
            bucket,
            tolerance: config.default_tolerance,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalStatsResult {
    pub stream: StreamId,
    pub bucket: f64,
    pub tolerance: f64,
    pub hit_count: usize,
    pub last_sequence_index: Option<u64>,
    pub global_stats: GapStatistics,
    /// `last + mean_gap`; null with fewer than two hits
    pub observed_eta: Option<f64>,
    /// `last + 1/p`; null without a probability model
    pub theoretical_eta: Option<f64>,
    pub confidence_interval: Option<ConfidenceInterval>,
}

/// Observed ETA: last hit plus the mean gap
pub fn observed_eta(last_sequence_index: Option<u64>, stats: &GapStatistics) -> Option<f64> {
    let last = last_sequence_index?;
    stats.mean.map(|mean| last as f64 + mean)
}

/// Theoretical ETA: last hit plus the mean of a geometric waiting time
pub fn theoretical_eta(
    last_sequence_index: Option<u64>,
    bucket: f64,
    model: Option<&dyn HitProbabilityModel>,
) -> Option<f64> {
    let last = last_sequence_index?;
    let p = model?.hit_probability(quantize(bucket))?;
    if p > 0.0 {
        Some(last as f64 + 1.0 / p)
    } else {
        None
    }
}

/// Whole-stream statistics and ETAs for one bucket
///
/// # Example
///
/// ```
/// use hitpulse::config::QueryConfig;
/// use hitpulse::query::{query_global_stats, GlobalStatsQuery, ProbabilityTable};
/// use hitpulse::source::{MemoryEventLog, StreamId};
///
/// let log = MemoryEventLog::new();
/// let stream = StreamId::new("hash", "client");
/// for seq in [100, 300, 600] {
///     log.append(&stream, seq, 1000.0).unwrap();
/// }
///
/// let mut model = ProbabilityTable::new();
/// model.insert(1000.0, 0.001).unwrap();
///
/// let config = QueryConfig::default();
/// let query = GlobalStatsQuery::new(1000.0, &config).with_tolerance(0.01);
/// let result = query_global_stats(&log, &stream, &query, &config, Some(&model)).unwrap();
///
/// assert_eq!(result.observed_eta, Some(850.0));
/// assert_eq!(result.theoretical_eta, Some(1600.0));
/// ```
pub fn query_global_stats<S: EventSource + ?Sized>(
    source: &S,
    stream: &StreamId,
    query: &GlobalStatsQuery,
    config: &QueryConfig,
    model: Option<&dyn HitProbabilityModel>,
) -> QueryResult<GlobalStatsResult> {
    let tolerance = Tolerance::new(query.tolerance)?;
    validate_bucket_value(query.bucket)?;
    ensure_stream(source, stream)?;

    let hits = fetch_bucket_hits(source, stream, query.bucket, tolerance, SequenceRange::all())?;
    let gaps: Vec<u64> = hits.iter().filter_map(|h| h.gap).collect();
    let global_stats = GapStatistics::from_gaps(&gaps);
    let last_sequence_index = hits.last().map(|h| h.sequence_index);

    let result = GlobalStatsResult {
        stream: stream.clone(),
        bucket: query.bucket,
        tolerance: tolerance.get(),
        hit_count: hits.len(),
        last_sequence_index,
        observed_eta: observed_eta(last_sequence_index, &global_stats),
        theoretical_eta: theoretical_eta(last_sequence_index, query.bucket, model),
        confidence_interval: ConfidenceInterval::for_mean(
            &global_stats,
            config.min_confidence_sample,
            config.confidence_z,
        ),
        global_stats,
    };

    debug!(stream = %stream, bucket = query.bucket, hits = result.hit_count, "global stats query");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::query::test_support::*;
    use crate::source::MemoryEventLog;

    fn config() -> QueryConfig {
        QueryConfig::default()
    }

    #[test]
    fn test_parse_windows() {
        let windows = parse_windows("0-500, 500-1500").unwrap();
        assert_eq!(windows, vec![SequenceWindow { start: 0, end: 500 }, SequenceWindow { start: 500, end: 1500 }]);
        assert_eq!(windows[1].label(), "500-1500");

        // Overlap is fine
        assert_eq!(parse_windows("0-10,5-15").unwrap().len(), 2);
    }

    #[test]
    fn test_parse_windows_errors() {
        let err = parse_windows("0-500,abc").unwrap_err();
        assert!(err.to_string().contains("Invalid range format"));

        let err = parse_windows("-5-10").unwrap_err();
        assert!(err.to_string().contains("negative"));

        let err = parse_windows("10--5").unwrap_err();
        assert!(err.to_string().contains("negative"));

        let err = parse_windows("5- -3").unwrap_err();
        assert!(err.to_string().contains("negative"));

        let err = parse_windows("-").unwrap_err();
        assert!(err.to_string().contains("Invalid range format"));

        for empty in ["", ",", " , ,"] {
            let err = parse_windows(empty).unwrap_err();
            assert!(err.to_string().contains("At least one range"));
        }

        let err = parse_windows("500-100").unwrap_err();
        assert!(err.to_string().contains("end must be greater than start"));

        assert!(parse_windows("7-7").is_err());
    }

    #[test]
    fn test_window_contains_is_half_open() {
        let window = SequenceWindow::new(100, 200).unwrap();
        assert!(window.contains(100));
        assert!(window.contains(199));
        assert!(!window.contains(200));
    }

    #[test]
    fn test_range_stats_use_unscoped_gaps() {
        let query = RangeStatsQuery::new(1000.0, &config())
            .with_tolerance(0.01)
            .with_ranges("0-250,250-1000");
        let result = query_range_stats(&sample_log(), &stream(), &query, &config()).unwrap();

        assert_eq!(result.stats_by_range.len(), 2);
        // 100 opens the stream: no gap in the first window
        assert_eq!(result.stats_by_range[0].stats.count, 0);
        // 300 keeps its gap to 100 although 100 is in another window
        let second = &result.stats_by_range[1].stats;
        assert_eq!(second.count, 2);
        assert_eq!(second.min, Some(200));
        assert_eq!(second.max, Some(300));
    }

    #[test]
    fn test_range_stats_default_window() {
        let query = RangeStatsQuery::new(1000.0, &config()).with_tolerance(0.01);
        let result = query_range_stats(&sample_log(), &stream(), &query, &config()).unwrap();
        assert_eq!(result.stats_by_range.len(), 1);
        // Highest event in the stream is 700
        assert_eq!(result.stats_by_range[0].range, "0-701");
        assert_eq!(result.stats_by_range[0].stats.count, 2);
    }

    #[test]
    fn test_range_stats_default_window_from_one_read() {
        let source = GrowingSource::new(sample_log());
        let query = RangeStatsQuery::new(1000.0, &config()).with_tolerance(0.01);
        let result = query_range_stats(&source, &stream(), &query, &config()).unwrap();

        assert_eq!(source.reads(), 1);
        assert_eq!(result.stats_by_range[0].range, "0-701");
        assert_eq!(result.stats_by_range[0].stats.count, 2);
        assert_eq!(result.stats_by_range[0].stats.max, Some(300));
    }

    #[test]
    fn test_range_stats_reject_empty_range_list() {
        let query = RangeStatsQuery::new(1000.0, &config()).with_ranges(",");
        let err = query_range_stats(&sample_log(), &stream(), &query, &config()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_range_stats_empty_stream() {
        let log = MemoryEventLog::new();
        log.create_stream(&stream()).unwrap();
        let query = RangeStatsQuery::new(1000.0, &config());
        let result = query_range_stats(&log, &stream(), &query, &config()).unwrap();
        assert_eq!(result.stats_by_range[0].range, "0-1");
        assert!(result.stats_by_range[0].stats.is_empty());
    }

    #[test]
    fn test_range_stats_validate_before_lookup() {
        let query = RangeStatsQuery::new(1000.0, &config()).with_ranges("1-x");
        let err = query_range_stats(&sample_log(), &StreamId::new("a", "b"), &query, &config())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_global_stats_and_eta() {
        let mut model = ProbabilityTable::new();
        model.insert(1000.0, 0.01).unwrap();

        let query = GlobalStatsQuery::new(1000.0, &config()).with_tolerance(0.01);
        let result =
            query_global_stats(&sample_log(), &stream(), &query, &config(), Some(&model)).unwrap();
        assert_eq!(result.hit_count, 3);
        assert_eq!(result.last_sequence_index, Some(600));
        assert_eq!(result.global_stats.mean, Some(250.0));
        assert_eq!(result.observed_eta, Some(850.0));
        assert_eq!(result.theoretical_eta, Some(700.0));
        // Two gaps is below the confidence sample floor
        assert!(result.confidence_interval.is_none());
    }

    #[test]
    fn test_global_stats_without_model_or_history() {
        let query = GlobalStatsQuery::new(1.5, &config()).with_tolerance(0.01);
        let result = query_global_stats(&sample_log(), &stream(), &query, &config(), None).unwrap();
        assert_eq!(result.hit_count, 1);
        assert_eq!(result.observed_eta, None);
        assert_eq!(result.theoretical_eta, None);

        let query = GlobalStatsQuery::new(9999.0, &config()).with_tolerance(0.01);
        let result = query_global_stats(&sample_log(), &stream(), &query, &config(), None).unwrap();
        assert_eq!(result.hit_count, 0);
        assert_eq!(result.global_stats.count, 0);
        assert_eq!(result.last_sequence_index, None);
    }

    #[test]
    fn test_global_stats_confidence_interval() {
        let log = MemoryEventLog::new();
        let s = stream();
        for i in 1..=50u64 {
            log.append(&s, i * 10 + (i % 3), 5.0).unwrap();
        }
        let config = config();
        let query = GlobalStatsQuery::new(5.0, &config).with_tolerance(0.01);
        let result = query_global_stats(&log, &s, &query, &config, None).unwrap();
        let ci = result.confidence_interval.unwrap();
        let mean = result.global_stats.mean.unwrap();
        assert!(ci.lower <= mean && mean <= ci.upper);
        assert_eq!(ci.sample_size, 49);
    }

    #[test]
    fn test_probability_table_rejects_bad_probability() {
        let mut table = ProbabilityTable::new();
        assert!(table.insert(10.0, 0.0).is_err());
        assert!(table.insert(10.0, 1.5).is_err());
        assert!(table.insert(-1.0, 0.5).is_err());
        assert!(table.insert(10.0, 1.0).is_ok());
        assert_eq!(table.len(), 1);
    }
}
