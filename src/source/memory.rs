//! In-memory event log
//!
//! A thread-safe, append-only event store that implements [`EventSource`].
//! It plays the role a database plays in production: the CLI fills one from a
//! JSON-lines file and the test suites use it as a deterministic backend.
//!
//! Reads hand out cloned, freshly sorted vectors, so a writer appending to a
//! stream while a query runs can never change the slice that query computes on.
//!
//! # Example
//!
//! ```
//! use hitpulse::source::{EventFilter, EventSource, MemoryEventLog, StreamId};
//!
//! let log = MemoryEventLog::new();
//! let stream = StreamId::new("hash", "client");
//! log.append(&stream, 300, 1000.0).unwrap();
//! log.append(&stream, 100, 1000.0).unwrap();
//!
//! let events = log.fetch_events(&stream, &EventFilter::all()).unwrap();
//! assert_eq!(events[0].sequence_index, 100);
//! ```

use super::{Event, EventFilter, EventSource, StreamId, StreamSummary};
use crate::error::SourceError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Thread-safe in-memory event log keyed by stream
#[derive(Debug, Default)]
pub struct MemoryEventLog {
    streams: RwLock<HashMap<StreamId, Vec<Event>>>,
    next_order: AtomicU64,
}

impl MemoryEventLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event stamped with the current time
    ///
    /// Creates the stream on first use.
    pub fn append(
        &self,
        stream: &StreamId,
        sequence_index: u64,
        result: f64,
    ) -> Result<Event, SourceError> {
        self.append_at(stream, sequence_index, result, Utc::now())
    }

    /// Append an event with an explicit arrival time
    ///
    /// # Errors
    ///
    /// `SourceError::Rejected` for a zero sequence index or a negative or
    /// non-finite result.
    pub fn append_at(
        &self,
        stream: &StreamId,
        sequence_index: u64,
        result: f64,
        received_at: DateTime<Utc>,
    ) -> Result<Event, SourceError> {
        if sequence_index == 0 {
            return Err(SourceError::Rejected(
                "sequence index must be at least 1".to_string(),
            ));
        }
        if !result.is_finite() || result < 0.0 {
            return Err(SourceError::Rejected(format!(
                "result must be a non-negative number, got {result}"
            )));
        }

        let mut streams = self
            .streams
            .write()
            .map_err(|_| SourceError::Unavailable("event log lock poisoned".to_string()))?;

        // Arrival order is assigned under the write lock so it matches append order
        let event = Event {
            sequence_index,
            result,
            received_order: self.next_order.fetch_add(1, Ordering::Relaxed) + 1,
            received_at,
        };
        streams.entry(stream.clone()).or_default().push(event.clone());
        Ok(event)
    }

    /// Create a stream with no events
    pub fn create_stream(&self, stream: &StreamId) -> Result<(), SourceError> {
        let mut streams = self
            .streams
            .write()
            .map_err(|_| SourceError::Unavailable("event log lock poisoned".to_string()))?;
        streams.entry(stream.clone()).or_default();
        Ok(())
    }

    /// Delete a stream and all of its events
    ///
    /// Returns `true` if the stream existed.
    pub fn remove_stream(&self, stream: &StreamId) -> Result<bool, SourceError> {
        let mut streams = self
            .streams
            .write()
            .map_err(|_| SourceError::Unavailable("event log lock poisoned".to_string()))?;
        Ok(streams.remove(stream).is_some())
    }

    /// All stream identifiers, sorted
    pub fn streams(&self) -> Result<Vec<StreamId>, SourceError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| SourceError::Unavailable("event log lock poisoned".to_string()))?;
        let mut ids: Vec<StreamId> = streams.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    /// Number of events in a stream (0 for an unknown stream)
    pub fn event_count(&self, stream: &StreamId) -> Result<usize, SourceError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| SourceError::Unavailable("event log lock poisoned".to_string()))?;
        Ok(streams.get(stream).map_or(0, Vec::len))
    }

    /// Per-stream overview, sorted by stream identifier
    pub fn summaries(&self) -> Result<Vec<StreamSummary>, SourceError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| SourceError::Unavailable("event log lock poisoned".to_string()))?;
        let mut summaries: Vec<StreamSummary> = streams
            .iter()
            .map(|(id, events)| StreamSummary {
                stream: id.clone(),
                total_events: events.len(),
                highest_result: events.iter().map(|e| e.result).reduce(f64::max),
                last_sequence_index: events.iter().map(|e| e.sequence_index).max(),
                last_received_at: events.iter().map(|e| e.received_at).max(),
            })
            .collect();
        summaries.sort_by(|a, b| a.stream.cmp(&b.stream));
        Ok(summaries)
    }
}

impl EventSource for MemoryEventLog {
    fn contains_stream(&self, stream: &StreamId) -> Result<bool, SourceError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| SourceError::Unavailable("event log lock poisoned".to_string()))?;
        Ok(streams.contains_key(stream))
    }

    fn fetch_events(
        &self,
        stream: &StreamId,
        filter: &EventFilter,
    ) -> Result<Vec<Event>, SourceError> {
        let mut events: Vec<Event> = {
            let streams = self
                .streams
                .read()
                .map_err(|_| SourceError::Unavailable("event log lock poisoned".to_string()))?;
            let stored = streams
                .get(stream)
                .ok_or_else(|| SourceError::StreamNotFound(stream.clone()))?;
            stored.iter().filter(|e| filter.accepts(e)).cloned().collect()
        };

        events.sort_by_key(|e| (e.sequence_index, e.received_order));
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::Tolerance;
    use crate::source::SequenceRange;

    fn stream() -> StreamId {
        StreamId::new("test_hash", "test_client")
    }

    #[test]
    fn test_append_assigns_increasing_order() {
        let log = MemoryEventLog::new();
        let a = log.append(&stream(), 10, 1.0).unwrap();
        let b = log.append(&stream(), 5, 1.0).unwrap();
        assert!(b.received_order > a.received_order);
        assert_eq!(log.event_count(&stream()).unwrap(), 2);
    }

    #[test]
    fn test_append_rejects_invalid_events() {
        let log = MemoryEventLog::new();
        assert!(log.append(&stream(), 0, 1.0).is_err());
        assert!(log.append(&stream(), 1, -1.0).is_err());
        assert!(log.append(&stream(), 1, f64::NAN).is_err());
        assert!(!log.contains_stream(&stream()).unwrap());
    }

    #[test]
    fn test_fetch_sorts_late_arrivals() {
        let log = MemoryEventLog::new();
        log.append(&stream(), 600, 1000.0).unwrap();
        log.append(&stream(), 100, 1000.0).unwrap();
        log.append(&stream(), 300, 1000.0).unwrap();

        let events = log.fetch_events(&stream(), &EventFilter::all()).unwrap();
        let seqs: Vec<u64> = events.iter().map(|e| e.sequence_index).collect();
        assert_eq!(seqs, vec![100, 300, 600]);
    }

    #[test]
    fn test_fetch_breaks_ties_by_arrival() {
        let log = MemoryEventLog::new();
        let first = log.append(&stream(), 50, 2.0).unwrap();
        let second = log.append(&stream(), 50, 2.0).unwrap();

        let events = log.fetch_events(&stream(), &EventFilter::all()).unwrap();
        assert_eq!(events[0].received_order, first.received_order);
        assert_eq!(events[1].received_order, second.received_order);
    }

    #[test]
    fn test_fetch_applies_filter() {
        let log = MemoryEventLog::new();
        for (seq, result) in [(100, 1000.0), (200, 2.0), (300, 1000.0), (600, 1000.0)] {
            log.append(&stream(), seq, result).unwrap();
        }

        let filter = EventFilter::bucket(1000.0, Tolerance::new(1e-9).unwrap())
            .within(SequenceRange::new(Some(100), Some(600)).unwrap());
        let events = log.fetch_events(&stream(), &filter).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].sequence_index, 300);
    }

    #[test]
    fn test_summaries() {
        let log = MemoryEventLog::new();
        log.append(&stream(), 40, 3.5).unwrap();
        log.append(&stream(), 12, 120.0).unwrap();
        log.create_stream(&StreamId::new("a", "b")).unwrap();

        let summaries = log.summaries().unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].stream, StreamId::new("a", "b"));
        assert_eq!(summaries[0].total_events, 0);
        assert_eq!(summaries[0].highest_result, None);
        assert_eq!(summaries[1].total_events, 2);
        assert_eq!(summaries[1].highest_result, Some(120.0));
        assert_eq!(summaries[1].last_sequence_index, Some(40));
    }

    #[test]
    fn test_missing_stream() {
        let log = MemoryEventLog::new();
        let err = log.fetch_events(&stream(), &EventFilter::all()).unwrap_err();
        assert_eq!(err, SourceError::StreamNotFound(stream()));
    }

    #[test]
    fn test_remove_stream() {
        let log = MemoryEventLog::new();
        log.append(&stream(), 1, 1.0).unwrap();
        assert!(log.remove_stream(&stream()).unwrap());
        assert!(!log.remove_stream(&stream()).unwrap());
        assert!(log.streams().unwrap().is_empty());
    }

    #[test]
    fn test_default_window_counts() {
        let log = MemoryEventLog::new();
        for seq in [1, 999, 1000, 5500] {
            log.append(&stream(), seq, 1.0).unwrap();
        }
        let counts = log.window_counts(&stream(), 1000).unwrap();
        assert_eq!(counts.get(&0), Some(&2));
        assert_eq!(counts.get(&1), Some(&1));
        assert_eq!(counts.get(&5), Some(&1));
        assert_eq!(counts.len(), 3);
    }
}
