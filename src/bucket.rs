//! Bucket classification
//!
//! Maps continuous result values onto discrete buckets and decides whether a
//! result belongs to a caller-supplied target bucket.
//!
//! Two matching policies exist and they are deliberately kept apart:
//!
//! - **Partition**: two events share a bucket iff their [`BucketKey`]s are equal.
//!   Gap sequences are always computed within a partition.
//! - **Selection**: an event qualifies for a query against a target value iff
//!   `|result - target| <= tolerance` (see [`matches`]).
//!
//! # Rounding
//!
//! Quantization rounds half away from zero on the shortest decimal form of the
//! result (the digits `Display` prints for an `f64`), the way a SQL
//! `ROUND(x, 2)` treats a stored value. `2.675`, `1.005` and `0.145` are ties
//! and land in `2.68`, `1.01` and `0.15`, whatever binary value sits behind
//! the literal.
//!
//! # Example
//!
//! ```
//! use hitpulse::bucket::{quantize, matches, Tolerance};
//!
//! let key = quantize(1000.004);
//! assert_eq!(key.to_string(), "1000.00");
//!
//! let tol = Tolerance::new(0.01).unwrap();
//! assert!(matches(1000.004, 1000.0, tol));
//! assert!(!matches(1000.02, 1000.0, tol));
//! ```

use crate::error::{AnalyticsError, QueryResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

const BUCKET_SCALE: f64 = 100.0;

/// Quantized result value, stored as an integer count of hundredths
///
/// Integer storage makes "bit-for-bit equal quantized results" a plain
/// integer comparison, which is what the gap partition keys on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketKey(i64);

impl BucketKey {
    /// Raw count of hundredths
    pub fn hundredths(self) -> i64 {
        self.0
    }

    /// Quantized value as a float (e.g. `1000.0` for key `1000.00`)
    pub fn as_f64(self) -> f64 {
        self.0 as f64 / BUCKET_SCALE
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Serialize for BucketKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for BucketKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Ok(quantize(value))
    }
}

/// Quantize a result value to its bucket key
///
/// Rounds half away from zero at two decimal places. Non-finite input
/// saturates (NaN maps to key `0.00`); callers validate results before they
/// reach the classifier.
pub fn quantize(result: f64) -> BucketKey {
    if !result.is_finite() {
        return BucketKey((result * BUCKET_SCALE) as i64);
    }

    // Display never uses exponent notation and prints the shortest digits
    // that round-trip, e.g. "2.675" for the literal 2.675
    let digits = result.abs().to_string();
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits.as_str(), ""));
    let mut fraction = fraction.bytes();
    let mut hundredths = whole.parse::<i64>().unwrap_or(i64::MAX / 100).saturating_mul(100);
    for scale in [10, 1] {
        let digit = fraction.next().map_or(0, |d| i64::from(d - b'0'));
        hundredths = hundredths.saturating_add(digit * scale);
    }
    if fraction.next().map_or(false, |d| d >= b'5') {
        hundredths = hundredths.saturating_add(1);
    }

    BucketKey(if result < 0.0 { -hundredths } else { hundredths })
}

/// Validated, strictly positive match tolerance
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Tolerance(f64);

impl Tolerance {
    /// Validate a raw tolerance
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when `value <= 0` or is not finite.
    pub fn new(value: f64) -> QueryResult<Self> {
        if !value.is_finite() || value <= 0.0 {
            return Err(AnalyticsError::invalid("tolerance must be greater than 0"));
        }
        Ok(Self(value))
    }

    /// The tolerance value
    pub fn get(self) -> f64 {
        self.0
    }
}

/// Tolerance-based selection: `|result - target| <= tolerance`
#[inline]
pub fn matches(result: f64, target: f64, tolerance: Tolerance) -> bool {
    (result - target).abs() <= tolerance.get()
}

/// Validate a single requested bucket value
pub fn validate_bucket_value(value: f64) -> QueryResult<f64> {
    if !value.is_finite() {
        return Err(AnalyticsError::invalid(format!(
            "bucket value must be a finite number, got {value}"
        )));
    }
    if value < 0.0 {
        return Err(AnalyticsError::invalid(format!(
            "bucket value cannot be negative, got {value}"
        )));
    }
    Ok(value)
}

/// A bucket value as requested by the caller
///
/// `key` is the shortest round-trip form of the parsed value (`"1000.00"`
/// becomes `"1000.0"`). It is never re-quantized, so near-equal requests stay
/// distinct keys in batch responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestedBucket {
    pub value: f64,
    pub key: String,
}

impl RequestedBucket {
    /// Wrap a parsed bucket value
    pub fn new(value: f64) -> Self {
        Self {
            value,
            key: format!("{value:?}"),
        }
    }
}

/// Parse a comma-separated bucket list such as `"1000.00,2000.00,11200.00"`
///
/// Empty entries are skipped. Checks run in a fixed order so the first
/// problem reported is deterministic: unparseable entries, empty list,
/// too many buckets, negative values.
pub fn parse_bucket_list(raw: &str, max_buckets: usize) -> QueryResult<Vec<RequestedBucket>> {
    let entries: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let mut values = Vec::with_capacity(entries.len());
    let mut invalid = Vec::new();
    for entry in &entries {
        match entry.parse::<f64>() {
            Ok(v) if v.is_finite() => values.push(v),
            _ => invalid.push(*entry),
        }
    }

    if !invalid.is_empty() {
        return Err(AnalyticsError::invalid(format!(
            "Invalid bucket values: {}",
            invalid.join(", ")
        )));
    }

    validate_bucket_count(values.len(), max_buckets)?;

    let negative: Vec<String> = values
        .iter()
        .filter(|v| **v < 0.0)
        .map(|v| format!("{v:?}"))
        .collect();
    if !negative.is_empty() {
        return Err(AnalyticsError::invalid(format!(
            "Bucket values cannot be negative: {}",
            negative.join(", ")
        )));
    }

    Ok(values.into_iter().map(RequestedBucket::new).collect())
}

/// Enforce `1 <= count <= max_buckets`
pub fn validate_bucket_count(count: usize, max_buckets: usize) -> QueryResult<()> {
    if count == 0 {
        return Err(AnalyticsError::invalid(
            "At least one bucket value must be provided",
        ));
    }
    if count > max_buckets {
        return Err(AnalyticsError::invalid(format!(
            "Maximum {max_buckets} buckets allowed, got {count}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_quantize_basic() {
        assert_eq!(quantize(1000.0).hundredths(), 100_000);
        assert_eq!(quantize(1.234).hundredths(), 123);
        assert_eq!(quantize(1.236).hundredths(), 124);
        assert_eq!(quantize(0.0).hundredths(), 0);
    }

    #[test]
    fn test_quantize_rounds_half_away_from_zero() {
        assert_eq!(quantize(0.125).to_string(), "0.13");
        assert_eq!(quantize(0.375).to_string(), "0.38");
        // Decimal ties whose binary value sits just below the midpoint
        assert_eq!(quantize(2.675).to_string(), "2.68");
        assert_eq!(quantize(1.005).to_string(), "1.01");
        assert_eq!(quantize(0.285).to_string(), "0.29");
        assert_eq!(quantize(0.145).to_string(), "0.15");
        assert_eq!(quantize(1.115).to_string(), "1.12");
        // Just below a tie still rounds down
        assert_eq!(quantize(1.0049).to_string(), "1.00");
        assert_eq!(quantize(-1.005).hundredths(), -101);
    }

    #[test]
    fn test_quantize_non_finite_saturates() {
        assert_eq!(quantize(f64::NAN).hundredths(), 0);
        assert_eq!(quantize(f64::INFINITY).hundredths(), i64::MAX);
    }

    #[test]
    fn test_quantize_idempotent() {
        for x in [0.0, 0.01, 0.125, 1.005, 2.675, 11200.0, 48800.004, 123456.789] {
            let key = quantize(x);
            assert_eq!(quantize(key.as_f64()), key, "not idempotent for {}", x);
        }
    }

    #[test]
    fn test_tolerance_must_be_positive() {
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = Tolerance::new(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        }
        assert!(Tolerance::new(1e-9).is_ok());
    }

    #[test]
    fn test_matches_is_inclusive() {
        let tol = Tolerance::new(0.5).unwrap();
        assert!(matches(10.5, 10.0, tol));
        assert!(matches(9.5, 10.0, tol));
        assert!(!matches(10.51, 10.0, tol));
    }

    #[test]
    fn test_validate_bucket_value() {
        assert!(validate_bucket_value(0.0).is_ok());
        assert!(validate_bucket_value(-100.0).is_err());
        assert!(validate_bucket_value(f64::NAN).is_err());
    }

    #[test]
    fn test_parse_bucket_list_keeps_requested_form() {
        let buckets = parse_bucket_list("1000.00, 2000.00,11200.00", 20).unwrap();
        let keys: Vec<&str> = buckets.iter().map(|b| b.key.as_str()).collect();
        assert_eq!(keys, vec!["1000.0", "2000.0", "11200.0"]);
    }

    #[test]
    fn test_parse_bucket_list_does_not_merge_near_values() {
        let buckets = parse_bucket_list("1000.0,1000.001", 20).unwrap();
        assert_eq!(buckets.len(), 2);
        assert_ne!(buckets[0].key, buckets[1].key);
    }

    #[test]
    fn test_parse_bucket_list_errors() {
        let err = parse_bucket_list("invalid,not_a_number", 20).unwrap_err();
        assert!(err.to_string().contains("Invalid bucket values"));

        let err = parse_bucket_list("", 20).unwrap_err();
        assert!(err
            .to_string()
            .contains("At least one bucket value must be provided"));

        let many: Vec<String> = (0..21).map(|i| format!("{}.0", i)).collect();
        let err = parse_bucket_list(&many.join(","), 20).unwrap_err();
        assert!(err.to_string().contains("Maximum 20 buckets allowed"));

        let err = parse_bucket_list("1000.00,-500.00", 20).unwrap_err();
        assert!(err.to_string().contains("cannot be negative"));
    }

    #[test]
    fn test_bucket_key_serializes_as_number() {
        let json = serde_json::to_string(&quantize(11200.0)).unwrap();
        assert_eq!(json, "11200.0");
    }
}
