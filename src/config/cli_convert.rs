//! CLI to query conversion utilities

use crate::bucket::parse_bucket_list;
use crate::config::cli::{Cli, Command};
use crate::config::QueryConfig;
use crate::error::QueryResult;
use crate::query::{BatchHitQuery, GlobalStatsQuery, HitOrder, HitQuery, MetricsQuery, RangeStatsQuery};
use crate::source::{MemoryEventLog, StreamId};
use anyhow::{Context, Result};

/// A parsed analytics request
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Streams,
    Hits(HitQuery),
    Batch(BatchHitQuery),
    RangeStats(RangeStatsQuery),
    GlobalStats(GlobalStatsQuery),
    Density { window_size: Option<u64> },
    Metrics(MetricsQuery),
}

/// Turn a subcommand into a query request
///
/// Unset options take their defaults from `config`. Argument errors (such as
/// a malformed bucket list) surface as query errors, not CLI errors.
pub fn build_request(command: &Command, config: &QueryConfig) -> QueryResult<Request> {
    let tolerance_or_default = |t: Option<f64>| t.unwrap_or(config.default_tolerance);

    let request = match command {
        Command::Streams => Request::Streams,

        Command::Hits {
            bucket,
            tolerance,
            after,
            before,
            limit,
            recent,
            no_distance,
        } => Request::Hits(
            HitQuery::new(*bucket, config)
                .with_tolerance(tolerance_or_default(*tolerance))
                .with_range(*after, *before)
                .with_limit(limit.unwrap_or(config.default_limit))
                .with_order(if *recent {
                    HitOrder::RecentFirst
                } else {
                    HitOrder::SequenceAsc
                })
                .with_distance(!*no_distance),
        ),

        Command::Batch {
            buckets,
            tolerance,
            after,
            before,
            limit,
        } => Request::Batch(
            BatchHitQuery::parse(buckets, config)?
                .with_tolerance(tolerance_or_default(*tolerance))
                .with_range(*after, *before)
                .with_limit(limit.unwrap_or(config.default_limit)),
        ),

        Command::Stats {
            bucket,
            tolerance,
            ranges,
        } => {
            let mut query = RangeStatsQuery::new(*bucket, config)
                .with_tolerance(tolerance_or_default(*tolerance));
            if let Some(ranges) = ranges {
                query = query.with_ranges(ranges.clone());
            }
            Request::RangeStats(query)
        }

        Command::Global { bucket, tolerance } => Request::GlobalStats(
            GlobalStatsQuery::new(*bucket, config).with_tolerance(tolerance_or_default(*tolerance)),
        ),

        Command::Density { window_size } => Request::Density {
            window_size: *window_size,
        },

        Command::Metrics {
            buckets,
            tolerance,
            window_size,
            top_peaks,
        } => {
            let targets = match buckets {
                Some(raw) => parse_bucket_list(raw, config.max_batch_buckets)?
                    .into_iter()
                    .map(|b| b.value)
                    .collect(),
                None => Vec::new(),
            };
            Request::Metrics(
                MetricsQuery::new(targets, config)
                    .with_tolerance(tolerance_or_default(*tolerance))
                    .with_window_size(window_size.unwrap_or(config.default_window_size))
                    .with_top_peaks(top_peaks.unwrap_or(config.default_top_peaks)),
            )
        }
    };

    Ok(request)
}

/// Pick the stream to analyze
///
/// An explicit seed pair wins. Otherwise the log must hold exactly one stream.
pub fn resolve_stream(cli: &Cli, log: &MemoryEventLog) -> Result<StreamId> {
    if let (Some(hash), Some(client)) = (&cli.server_seed_hash, &cli.client_seed) {
        return Ok(StreamId::new(hash.clone(), client.clone()));
    }

    let streams = log.streams().context("Failed to list streams")?;
    match streams.as_slice() {
        [only] => Ok(only.clone()),
        [] => anyhow::bail!("event log contains no streams"),
        _ => anyhow::bail!(
            "event log contains {} streams; select one with --server-seed-hash and --client-seed",
            streams.len()
        ),
    }
}
