//! hitpulse - Hit/gap recurrence analytics over per-stream event logs
//!
//! hitpulse answers "how often does outcome bucket B recur in stream S, and
//! when is it likely to recur next?" over a log of `(sequence_index, result)`
//! events.
//!
//! # Architecture
//!
//! - **Bucket classification**: quantize results to two decimals; select by tolerance
//! - **Gap sequencing**: per-bucket distance between consecutive hits, one pass over sorted events
//! - **Statistics**: exact mean, median, population std dev, min, max, nearest-rank p90
//! - **Queries**: single bucket, batch (rayon), range windows, global ETA, density, metrics
//! - **Event sources**: the core reads through the `EventSource` trait; an in-memory
//!   log and a JSON-lines loader are included
//!
//! # Example
//!
//! ```
//! use hitpulse::config::QueryConfig;
//! use hitpulse::query::{query_batch, BatchHitQuery, CancellationToken};
//! use hitpulse::source::{MemoryEventLog, StreamId};
//!
//! let log = MemoryEventLog::new();
//! let stream = StreamId::new("hash", "client");
//! for seq in [100, 300, 600] {
//!     log.append(&stream, seq, 1000.0).unwrap();
//! }
//!
//! let config = QueryConfig::default();
//! let query = BatchHitQuery::parse("1000.00,2000.00", &config).unwrap();
//! let result = query_batch(&log, &stream, &query, &config, &CancellationToken::new()).unwrap();
//!
//! assert_eq!(result.stats_by_bucket["1000.0"].mean, Some(250.0));
//! assert_eq!(result.stats_by_bucket["2000.0"].count, 0);
//! ```

pub mod bucket;
pub mod config;
pub mod error;
pub mod gaps;
pub mod output;
pub mod query;
pub mod source;
pub mod stats;

// Re-export commonly used types
pub use config::{Config, QueryConfig};
pub use error::{AnalyticsError, ErrorKind, QueryResult};
pub use source::{EventSource, MemoryEventLog, StreamId};

/// Result type used by the binary and the config/output layers
pub type Result<T> = anyhow::Result<T>;
