//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.
//!
//! Query limits and defaults live in [`QueryConfig`], which is passed
//! explicitly into every query call. The analytics core never reads a global
//! settings object.

pub mod cli;
pub mod cli_convert;
pub mod toml;
pub mod validator;

use crate::query::range::ProbabilityTable;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Complete configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub model: ModelConfig,
}

/// Limits and defaults applied by the query layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Tolerance used when a request does not name one
    #[serde(default = "default_tolerance")]
    pub default_tolerance: f64,
    /// Hit limit used when a request does not name one
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    /// Upper bound for `limit` and `limit_per_bucket` (1-N)
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
    /// Upper bound for buckets in one batch or metrics request
    #[serde(default = "default_max_batch_buckets")]
    pub max_batch_buckets: usize,
    /// Density window size used when a request does not name one
    #[serde(default = "default_window_size")]
    pub default_window_size: u64,
    /// Top peaks returned by the metrics query by default
    #[serde(default = "default_top_peaks")]
    pub default_top_peaks: usize,
    /// Upper bound for top peaks
    #[serde(default = "default_max_top_peaks")]
    pub max_top_peaks: usize,
    /// Minimum gap count before a confidence interval is reported
    #[serde(default = "default_min_confidence_sample")]
    pub min_confidence_sample: usize,
    /// Critical value for the confidence interval (1.96 ≈ 95%)
    #[serde(default = "default_confidence_z")]
    pub confidence_z: f64,
    /// Evaluate batch buckets on the rayon pool
    #[serde(default = "default_parallel_batch")]
    pub parallel_batch: bool,
}

fn default_tolerance() -> f64 {
    1e-9
}

fn default_limit() -> usize {
    100
}

fn default_max_limit() -> usize {
    1000
}

fn default_max_batch_buckets() -> usize {
    20
}

fn default_window_size() -> u64 {
    1000
}

fn default_top_peaks() -> usize {
    20
}

fn default_max_top_peaks() -> usize {
    100
}

fn default_min_confidence_sample() -> usize {
    30
}

fn default_confidence_z() -> f64 {
    1.96
}

fn default_parallel_batch() -> bool {
    true
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_tolerance: default_tolerance(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            max_batch_buckets: default_max_batch_buckets(),
            default_window_size: default_window_size(),
            default_top_peaks: default_top_peaks(),
            max_top_peaks: default_max_top_peaks(),
            min_confidence_sample: default_min_confidence_sample(),
            confidence_z: default_confidence_z(),
            parallel_batch: default_parallel_batch(),
        }
    }
}

/// Output format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    /// Pretty-print JSON output
    #[serde(default = "default_pretty")]
    pub pretty: bool,
}

fn default_pretty() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            pretty: default_pretty(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive (e.g. "warn", "hitpulse=debug")
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Hit-probability model used for theoretical ETAs
///
/// ```toml
/// [model.probabilities]
/// "1000.00" = 0.00099
/// "11200.00" = 0.0000884
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Bucket value → per-event hit probability in (0, 1]
    #[serde(default)]
    pub probabilities: BTreeMap<String, f64>,
}

impl ModelConfig {
    /// Build the probability table, or `None` when no model is configured
    pub fn probability_table(&self) -> Result<Option<ProbabilityTable>> {
        if self.probabilities.is_empty() {
            return Ok(None);
        }

        let mut table = ProbabilityTable::new();
        for (bucket, probability) in &self.probabilities {
            let value: f64 = bucket
                .trim()
                .parse()
                .with_context(|| format!("Invalid bucket value in model: {}", bucket))?;
            table
                .insert(value, *probability)
                .with_context(|| format!("Invalid model entry for bucket {}", bucket))?;
        }
        Ok(Some(table))
    }
}

// Display trait implementations

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Configuration:")?;
        writeln!(f, "  Query: {}", self.query)?;
        writeln!(f, "  Output: {}", self.output)?;
        writeln!(f, "  Logging: level={}", self.logging.level)?;
        writeln!(
            f,
            "  Model: {} bucket probabilities",
            self.model.probabilities.len()
        )?;
        Ok(())
    }
}

impl fmt::Display for QueryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tolerance={}, limit={} (max {}), max_buckets={}, window={}, parallel_batch={}",
            self.default_tolerance,
            self.default_limit,
            self.max_limit,
            self.max_batch_buckets,
            self.default_window_size,
            self.parallel_batch
        )
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl fmt::Display for OutputConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "format={}", self.format)?;
        if self.format == OutputFormat::Json {
            write!(f, ", pretty={}", self.pretty)?;
        }
        Ok(())
    }
}
