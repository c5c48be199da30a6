//! Density histogram query

use crate::config::QueryConfig;
use crate::error::{AnalyticsError, QueryResult};
use crate::source::{ensure_stream, EventSource, StreamId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Event counts per sequence window, all result values included
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityResult {
    pub stream: StreamId,
    pub window_size: u64,
    pub total_events: u64,
    /// Window index → count; empty windows are absent
    pub windows: BTreeMap<u64, u64>,
}

/// Validate a density window width
pub fn validate_window_size(window_size: u64) -> QueryResult<u64> {
    if window_size == 0 {
        return Err(AnalyticsError::invalid("window_size must be greater than 0"));
    }
    Ok(window_size)
}

/// Count events per window `[k * w, (k + 1) * w)`
///
/// `window_size` falls back to `config.default_window_size`.
pub fn query_density<S: EventSource + ?Sized>(
    source: &S,
    stream: &StreamId,
    window_size: Option<u64>,
    config: &QueryConfig,
) -> QueryResult<DensityResult> {
    let window_size = validate_window_size(window_size.unwrap_or(config.default_window_size))?;
    ensure_stream(source, stream)?;

    let windows = source.window_counts(stream, window_size)?;
    let total_events = windows.values().sum();

    debug!(stream = %stream, window_size, windows = windows.len(), "density query");

    Ok(DensityResult {
        stream: stream.clone(),
        window_size,
        total_events,
        windows,
    })
}
