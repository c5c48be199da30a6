//! JSON output formatting
//!
//! Serializes any result type. Absent statistics are written as `null`, never
//! omitted, so every response for a given query has the same shape.

use super::ErrorReport;
use crate::Result;
use serde::Serialize;
use std::io::Write;

/// Serialize `value` to a string
pub fn to_json_string<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}

/// Write `value` followed by a newline
pub fn write_json<W: Write, T: Serialize + ?Sized>(
    mut writer: W,
    value: &T,
    pretty: bool,
) -> Result<()> {
    if pretty {
        serde_json::to_writer_pretty(&mut writer, value)?;
    } else {
        serde_json::to_writer(&mut writer, value)?;
    }
    writeln!(writer)?;
    Ok(())
}

/// Error document `{"error": {"kind": ..., "message": ...}}`
pub fn error_json(report: &ErrorReport, pretty: bool) -> Result<String> {
    #[derive(Serialize)]
    struct Envelope<'a> {
        error: &'a ErrorReport,
    }
    to_json_string(&Envelope { error: report }, pretty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueryConfig;
    use crate::error::AnalyticsError;
    use crate::query::{query_batch, BatchHitQuery, CancellationToken};
    use crate::source::{MemoryEventLog, StreamId};

    #[test]
    fn test_batch_json_shape() {
        let log = MemoryEventLog::new();
        let stream = StreamId::new("h", "c");
        for seq in [100, 300, 600] {
            log.append(&stream, seq, 1000.0).unwrap();
        }
        let config = QueryConfig::default();
        let query = BatchHitQuery::parse("1000.00,5.00", &config).unwrap();
        let result = query_batch(&log, &stream, &query, &config, &CancellationToken::new()).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&to_json_string(&result, false).unwrap()).unwrap();
        assert_eq!(value["stream"]["server_seed_hash"], "h");
        assert_eq!(value["hits_by_bucket"]["1000.0"][0]["gap"], serde_json::Value::Null);
        assert_eq!(value["hits_by_bucket"]["1000.0"][1]["gap"], 200);
        assert_eq!(value["stats_by_bucket"]["1000.0"]["mean"], 250.0);
        assert!(value["stats_by_bucket"]["5.0"]["mean"].is_null());
        assert_eq!(value["stats_by_bucket"]["5.0"]["method"], "exact");
    }

    #[test]
    fn test_write_json_compact_vs_pretty() {
        let mut compact = Vec::new();
        write_json(&mut compact, &vec![1, 2], false).unwrap();
        assert_eq!(String::from_utf8(compact).unwrap(), "[1,2]\n");

        let mut pretty = Vec::new();
        write_json(&mut pretty, &vec![1, 2], true).unwrap();
        assert!(String::from_utf8(pretty).unwrap().contains("\n  1,"));
    }

    #[test]
    fn test_error_json() {
        let report = ErrorReport::from(&AnalyticsError::invalid("limit must be between 1 and 1000, got 0"));
        let json = error_json(&report, false).unwrap();
        assert_eq!(
            json,
            r#"{"error":{"kind":"InvalidArgument","message":"limit must be between 1 and 1000, got 0"}}"#
        );
    }
}
