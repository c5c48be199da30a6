//! CLI argument parsing using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    /// Human-readable tables
    Text,
    /// JSON document
    Json,
}

/// hitpulse - Hit/gap recurrence analytics over per-stream event logs
#[derive(Parser, Debug)]
#[command(name = "hitpulse")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Event log (JSON lines, one event per line)
    #[arg(short = 'e', long, env = "HITPULSE_EVENTS", value_name = "FILE")]
    pub events: PathBuf,

    /// Server seed hash of the stream to analyze
    ///
    /// Optional when the log holds a single stream
    #[arg(long)]
    pub server_seed_hash: Option<String>,

    /// Client seed of the stream to analyze
    #[arg(long)]
    pub client_seed: Option<String>,

    // === Configuration File ===
    /// TOML configuration file
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    // === Output Options ===
    /// Output format
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,

    /// Compact JSON (no pretty printing)
    #[arg(long)]
    pub compact: bool,

    /// Log filter directive (e.g. "info", "hitpulse=debug"); RUST_LOG wins
    #[arg(long)]
    pub log_level: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Analytics command
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// List streams in the event log
    Streams,

    /// Hits of one bucket with their gaps
    Hits {
        /// Target bucket value (e.g. 1000.00)
        #[arg(allow_hyphen_values = true)]
        bucket: f64,

        /// Match tolerance
        #[arg(short = 't', long)]
        tolerance: Option<f64>,

        /// Only hits with sequence index greater than this
        #[arg(long)]
        after: Option<u64>,

        /// Only hits with sequence index less than this
        #[arg(long)]
        before: Option<u64>,

        /// Maximum hits returned
        #[arg(short = 'l', long)]
        limit: Option<usize>,

        /// Most recently received first
        #[arg(long)]
        recent: bool,

        /// Omit the gap to the previous hit
        #[arg(long)]
        no_distance: bool,
    },

    /// Hits and gap statistics for several buckets at once
    Batch {
        /// Comma-separated bucket values (e.g. "1000.00,2000.00,11200.00")
        #[arg(allow_hyphen_values = true)]
        buckets: String,

        /// Match tolerance
        #[arg(short = 't', long)]
        tolerance: Option<f64>,

        /// Only hits with sequence index greater than this
        #[arg(long)]
        after: Option<u64>,

        /// Only hits with sequence index less than this
        #[arg(long)]
        before: Option<u64>,

        /// Maximum hits per bucket
        #[arg(short = 'l', long)]
        limit: Option<usize>,
    },

    /// Gap statistics per sequence window
    Stats {
        /// Target bucket value
        #[arg(allow_hyphen_values = true)]
        bucket: f64,

        /// Match tolerance
        #[arg(short = 't', long)]
        tolerance: Option<f64>,

        /// Comma-separated windows (e.g. "0-500,500-1500"); defaults to the whole stream
        #[arg(short = 'r', long, allow_hyphen_values = true)]
        ranges: Option<String>,
    },

    /// Whole-stream gap statistics and ETAs for one bucket
    Global {
        /// Target bucket value
        #[arg(allow_hyphen_values = true)]
        bucket: f64,

        /// Match tolerance
        #[arg(short = 't', long)]
        tolerance: Option<f64>,
    },

    /// Event counts per sequence window
    Density {
        /// Window width in sequence indices
        #[arg(short = 'w', long)]
        window_size: Option<u64>,
    },

    /// Stream dashboard: totals, per-bucket summaries, density, top peaks
    Metrics {
        /// Comma-separated bucket values to summarize
        #[arg(short = 'b', long, allow_hyphen_values = true)]
        buckets: Option<String>,

        /// Match tolerance
        #[arg(short = 't', long)]
        tolerance: Option<f64>,

        /// Density window width
        #[arg(short = 'w', long)]
        window_size: Option<u64>,

        /// Number of highest results to list
        #[arg(long)]
        top_peaks: Option<usize>,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate CLI arguments
    ///
    /// Only checks what clap cannot express. Query arguments are validated by
    /// the query layer so the CLI reports the same errors as any other host.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server_seed_hash.is_some() != self.client_seed.is_some() {
            anyhow::bail!("--server-seed-hash and --client-seed must be given together");
        }

        if self.compact && self.format == Some(FormatArg::Text) {
            anyhow::bail!("--compact only applies to --format json");
        }

        Ok(())
    }
}
