//! Batch multi-bucket query
//!
//! Evaluates up to `max_batch_buckets` target buckets against one stream.
//! Each bucket is independent: its hit list equals what [`query_hits`]
//! returns for the same bucket, range, and limit in ascending order.
//!
//! Buckets run on the rayon pool when `parallel_batch` is enabled. Results
//! are keyed by the requested bucket string in a `BTreeMap`, so output never
//! depends on completion order.
//!
//! [`query_hits`]: super::single::query_hits

use super::{fetch_bucket_hits, validate_limit, CancellationToken};
use crate::bucket::{parse_bucket_list, validate_bucket_count, validate_bucket_value, RequestedBucket, Tolerance};
use crate::config::QueryConfig;
use crate::error::{AnalyticsError, QueryResult};
use crate::gaps::{gap_values, Hit};
use crate::source::{ensure_stream, EventSource, SequenceRange, StreamId};
use crate::stats::GapStatistics;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Parameters of a batch query
#[derive(Debug, Clone, PartialEq)]
pub struct BatchHitQuery {
    pub buckets: Vec<RequestedBucket>,
    pub tolerance: f64,
    pub after: Option<u64>,
    pub before: Option<u64>,
    pub limit_per_bucket: usize,
}

impl BatchHitQuery {
    /// Batch over already-parsed bucket values, defaults from `config`
    pub fn new(buckets: Vec<RequestedBucket>, config: &QueryConfig) -> Self {
        Self {
            buckets,
            tolerance: config.default_tolerance,
            after: None,
            before: None,
            limit_per_bucket: config.default_limit,
        }
    }

    /// Parse a comma-separated list such as `"1000.00,2000.00"`
    pub fn parse(raw: &str, config: &QueryConfig) -> QueryResult<Self> {
        let buckets = parse_bucket_list(raw, config.max_batch_buckets)?;
        Ok(Self::new(buckets, config))
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_range(mut self, after: Option<u64>, before: Option<u64>) -> Self {
        self.after = after;
        self.before = before;
        self
    }

    pub fn with_limit(mut self, limit_per_bucket: usize) -> Self {
        self.limit_per_bucket = limit_per_bucket;
        self
    }

    fn validate(&self, config: &QueryConfig) -> QueryResult<(Tolerance, SequenceRange)> {
        validate_bucket_count(self.buckets.len(), config.max_batch_buckets)?;
        for bucket in &self.buckets {
            validate_bucket_value(bucket.value)?;
        }
        let tolerance = Tolerance::new(self.tolerance)?;
        let range = SequenceRange::new(self.after, self.before)?;
        validate_limit(self.limit_per_bucket, config.max_limit)?;
        Ok((tolerance, range))
    }
}

/// Per-bucket hits and statistics, keyed by requested bucket string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchHitResult {
    pub stream: StreamId,
    pub tolerance: f64,
    pub after: Option<u64>,
    pub before: Option<u64>,
    pub limit_per_bucket: usize,
    pub hits_by_bucket: BTreeMap<String, Vec<Hit>>,
    /// Statistics over the gaps present in the returned hit list
    pub stats_by_bucket: BTreeMap<String, GapStatistics>,
}

/// Run a batch query
///
/// `cancel` is checked before each bucket and once more before the result is
/// assembled. A cancelled batch returns `Cancelled` and no partial output.
pub fn query_batch<S: EventSource + ?Sized>(
    source: &S,
    stream: &StreamId,
    query: &BatchHitQuery,
    config: &QueryConfig,
    cancel: &CancellationToken,
) -> QueryResult<BatchHitResult> {
    let (tolerance, range) = query.validate(config)?;
    ensure_stream(source, stream)?;

    let evaluate = |bucket: &RequestedBucket| -> QueryResult<(String, Vec<Hit>)> {
        cancel.check()?;
        let mut hits = fetch_bucket_hits(source, stream, bucket.value, tolerance, range)?;
        hits.truncate(query.limit_per_bucket);
        Ok((bucket.key.clone(), hits))
    };

    let evaluated: QueryResult<Vec<(String, Vec<Hit>)>> = if config.parallel_batch {
        query.buckets.par_iter().map(evaluate).collect()
    } else {
        query.buckets.iter().map(evaluate).collect()
    };

    let evaluated = match evaluated.and_then(|rows| cancel.check().map(|_| rows)) {
        Ok(rows) => rows,
        Err(AnalyticsError::Cancelled) => {
            warn!(stream = %stream, buckets = query.buckets.len(), "batch query cancelled");
            return Err(AnalyticsError::Cancelled);
        }
        Err(e) => return Err(e),
    };

    let mut hits_by_bucket = BTreeMap::new();
    let mut stats_by_bucket = BTreeMap::new();
    for (key, hits) in evaluated {
        stats_by_bucket.insert(key.clone(), GapStatistics::from_gaps(&gap_values(&hits)));
        hits_by_bucket.insert(key, hits);
    }

    debug!(
        stream = %stream,
        buckets = hits_by_bucket.len(),
        parallel = config.parallel_batch,
        "batch query"
    );

    Ok(BatchHitResult {
        stream: stream.clone(),
        tolerance: tolerance.get(),
        after: query.after,
        before: query.before,
        limit_per_bucket: query.limit_per_bucket,
        hits_by_bucket,
        stats_by_bucket,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::query::single::{query_hits, HitQuery};
    use crate::query::test_support::*;
    use crate::source::MemoryEventLog;

    fn config() -> QueryConfig {
        QueryConfig::default()
    }

    fn batch(raw: &str) -> BatchHitQuery {
        BatchHitQuery::parse(raw, &config()).unwrap().with_tolerance(0.01)
    }

    #[test]
    fn test_batch_hits_and_stats() {
        let result = query_batch(
            &sample_log(),
            &stream(),
            &batch("1000.00,2.00"),
            &config(),
            &CancellationToken::new(),
        )
        .unwrap();

        let hits = &result.hits_by_bucket["1000.0"];
        let seqs: Vec<u64> = hits.iter().map(|h| h.sequence_index).collect();
        assert_eq!(seqs, vec![100, 300, 600]);

        let stats = &result.stats_by_bucket["1000.0"];
        assert_eq!(stats.count, 2);
        assert_eq!(stats.mean, Some(250.0));
        assert_eq!(stats.min, Some(200));
        assert_eq!(stats.max, Some(300));

        assert_eq!(result.hits_by_bucket["2.0"].len(), 3);
    }

    #[test]
    fn test_limit_per_bucket_limits_stats() {
        let q = batch("1000.00").with_limit(2);
        let result =
            query_batch(&sample_log(), &stream(), &q, &config(), &CancellationToken::new()).unwrap();
        let seqs: Vec<u64> = result.hits_by_bucket["1000.0"]
            .iter()
            .map(|h| h.sequence_index)
            .collect();
        assert_eq!(seqs, vec![100, 300]);
        assert_eq!(result.stats_by_bucket["1000.0"].count, 1);
    }

    #[test]
    fn test_empty_bucket_has_zero_count_stats() {
        let result = query_batch(
            &sample_log(),
            &stream(),
            &batch("5000.00"),
            &config(),
            &CancellationToken::new(),
        )
        .unwrap();
        assert!(result.hits_by_bucket["5000.0"].is_empty());
        let stats = &result.stats_by_bucket["5000.0"];
        assert_eq!(stats.count, 0);
        assert!(stats.mean.is_none());
        assert!(stats.median.is_none());
        assert!(stats.min.is_none());
        assert!(stats.max.is_none());
    }

    #[test]
    fn test_batch_matches_single_queries() {
        let log = sample_log();
        let ranges = [(None, None), (Some(200), Some(700)), (Some(50), None), (None, Some(450))];

        for parallel in [true, false] {
            let config = QueryConfig {
                parallel_batch: parallel,
                ..QueryConfig::default()
            };
            for (after, before) in ranges {
                for limit in [1, 2, 100] {
                    let q = batch("1000.00,2.00").with_range(after, before).with_limit(limit);
                    let result =
                        query_batch(&log, &stream(), &q, &config, &CancellationToken::new()).unwrap();

                    for (key, value) in [("1000.0", 1000.0), ("2.0", 2.0)] {
                        let single = HitQuery::new(value, &config)
                            .with_tolerance(0.01)
                            .with_range(after, before)
                            .with_limit(limit);
                        let expected = query_hits(&log, &stream(), &single, &config).unwrap();
                        assert_eq!(result.hits_by_bucket[key], expected.hits);
                    }
                }
            }
        }
    }

    #[test]
    fn test_near_equal_requests_stay_distinct() {
        let result = query_batch(
            &sample_log(),
            &stream(),
            &batch("1000.0,1000.001"),
            &config(),
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(result.hits_by_bucket.len(), 2);
        assert!(result.hits_by_bucket.contains_key("1000.001"));
    }

    #[test]
    fn test_validation_before_lookup() {
        let missing = StreamId::new("x", "y");
        let q = batch("1000.00").with_tolerance(-1.0);
        let err =
            query_batch(&sample_log(), &missing, &q, &config(), &CancellationToken::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let q = batch("1000.00").with_range(Some(1000), Some(500));
        let err =
            query_batch(&sample_log(), &stream(), &q, &config(), &CancellationToken::new()).unwrap_err();
        assert!(err.to_string().contains("before_nonce"));

        let q = BatchHitQuery::new(Vec::new(), &config());
        let err =
            query_batch(&sample_log(), &stream(), &q, &config(), &CancellationToken::new()).unwrap_err();
        assert!(err.to_string().contains("At least one bucket"));

        let err =
            query_batch(&sample_log(), &missing, &batch("1.0"), &config(), &CancellationToken::new())
                .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_cancelled_batch_returns_nothing() {
        let token = CancellationToken::new();
        token.cancel();
        let err = query_batch(&sample_log(), &stream(), &batch("1000.00,2.00"), &config(), &token)
            .unwrap_err();
        assert_eq!(err, AnalyticsError::Cancelled);
    }

    #[test]
    fn test_source_failure_fails_whole_batch() {
        let err = query_batch(
            &UnavailableSource,
            &stream(),
            &batch("1000.00,2.00"),
            &config(),
            &CancellationToken::new(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataAccessFailure);
    }

    #[test]
    fn test_large_batch_on_rayon_pool() {
        let log = MemoryEventLog::new();
        let s = stream();
        for seq in 1..=2000u64 {
            log.append(&s, seq, (seq % 20) as f64).unwrap();
        }
        let raw: Vec<String> = (0..20).map(|b| format!("{}.0", b)).collect();
        let q = batch(&raw.join(","));
        let result = query_batch(&log, &s, &q, &config(), &CancellationToken::new()).unwrap();
        assert_eq!(result.hits_by_bucket.len(), 20);
        for stats in result.stats_by_bucket.values() {
            assert_eq!(stats.count, 99);
            assert_eq!(stats.mean, Some(20.0));
        }
    }

    fn assert_consistent(hits: &[Hit]) {
        assert_eq!(hits.first().and_then(|h| h.gap), None);
        for pair in hits.windows(2) {
            assert!(pair[0].sequence_index < pair[1].sequence_index);
            assert_eq!(
                pair[1].gap,
                Some(pair[1].sequence_index - pair[0].sequence_index)
            );
        }
    }

    #[test]
    fn test_queries_stay_consistent_under_concurrent_appends() {
        let log = sample_log();
        let config = config();
        let q = batch("1000.00,2.00").with_limit(config.max_limit);
        let single = HitQuery::new(1000.0, &config)
            .with_tolerance(0.01)
            .with_limit(config.max_limit);

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for i in 0..1500u64 {
                    let result = if i % 2 == 0 { 1000.0 } else { 2.0 };
                    log.append(&stream(), 701 + i, result).unwrap();
                }
            });

            for _ in 0..50 {
                let result =
                    query_batch(&log, &stream(), &q, &config, &CancellationToken::new()).unwrap();
                for (key, hits) in &result.hits_by_bucket {
                    assert_consistent(hits);
                    let stats = &result.stats_by_bucket[key];
                    assert_eq!(stats.count, hits.len().saturating_sub(1));
                }

                let result = query_hits(&log, &stream(), &single, &config).unwrap();
                assert_consistent(&result.hits);
                assert!(result.total_in_range >= result.hits.len());
                assert!(result.total_in_range >= 3);
            }
        });
    }
}
