//! Human-readable text output

use crate::query::batch::BatchHitResult;
use crate::query::density::DensityResult;
use crate::query::metrics::StreamMetrics;
use crate::query::range::{GlobalStatsResult, RangeStatsResult};
use crate::query::single::{HitOrder, HitQueryResult};
use crate::source::StreamSummary;
use crate::stats::GapStatistics;
use std::fmt::{self, Write};

const RULE: &str = "═══════════════════════════════════════════════════════════";

/// A result that can be rendered as a text report
pub trait TextReport {
    fn write_text(&self, out: &mut String) -> fmt::Result;
}

/// Render a report into a string
pub fn render<T: TextReport + ?Sized>(report: &T) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = report.write_text(&mut out);
    out
}

/// Print a report to stdout
pub fn print_report<T: TextReport + ?Sized>(report: &T) {
    print!("{}", render(report));
}

fn banner(out: &mut String, title: &str) -> fmt::Result {
    writeln!(out, "{}", RULE)?;
    writeln!(out, "{:^59}", title)?;
    writeln!(out, "{}", RULE)?;
    writeln!(out)
}

fn write_stats(out: &mut String, indent: &str, stats: &GapStatistics) -> fmt::Result {
    if stats.is_empty() {
        return writeln!(out, "{}Gaps: none", indent);
    }
    writeln!(out, "{}Gaps:   {}", indent, format_number(stats.count as u64))?;
    writeln!(
        out,
        "{}Mean:   {}   Median: {}   Std dev: {}",
        indent,
        format_opt_f64(stats.mean),
        format_opt_f64(stats.median),
        format_opt_f64(stats.std_dev)
    )?;
    writeln!(
        out,
        "{}Min:    {}   Max: {}   P90: {}",
        indent,
        format_opt_u64(stats.min),
        format_opt_u64(stats.max),
        format_opt_u64(stats.p90)
    )
}

impl TextReport for [StreamSummary] {
    fn write_text(&self, out: &mut String) -> fmt::Result {
        banner(out, "STREAMS")?;
        if self.is_empty() {
            return writeln!(out, "No streams.");
        }
        for summary in self {
            writeln!(out, "{}", summary.stream)?;
            writeln!(out, "  Events:       {}", format_number(summary.total_events as u64))?;
            writeln!(out, "  Highest:      {}", format_opt_f64(summary.highest_result))?;
            writeln!(out, "  Last nonce:   {}", format_opt_u64(summary.last_sequence_index))?;
            if let Some(at) = summary.last_received_at {
                writeln!(out, "  Last arrival: {}", at.to_rfc3339())?;
            }
        }
        Ok(())
    }
}

impl TextReport for HitQueryResult {
    fn write_text(&self, out: &mut String) -> fmt::Result {
        banner(out, "BUCKET HITS")?;
        writeln!(out, "Stream:    {}", self.stream)?;
        writeln!(out, "Bucket:    {} (±{})", self.bucket, self.tolerance)?;
        writeln!(
            out,
            "Range:     ({}, {})",
            format_opt_u64(self.after),
            format_opt_u64(self.before)
        )?;
        writeln!(
            out,
            "Hits:      {} of {} in range{}",
            format_number(self.hits.len() as u64),
            format_number(self.total_in_range as u64),
            if self.order == HitOrder::RecentFirst {
                ", most recent first"
            } else {
                ""
            }
        )?;
        if self.after.is_some() {
            writeln!(
                out,
                "Previous:  {}",
                format_opt_u64(self.prev_sequence_before_range)
            )?;
        }
        writeln!(out)?;

        writeln!(out, "{:>12}  {:>12}  {:>10}  {:>8}", "Nonce", "Result", "Bucket", "Gap")?;
        for hit in &self.hits {
            writeln!(
                out,
                "{:>12}  {:>12.2}  {:>10}  {:>8}",
                hit.sequence_index,
                hit.result,
                hit.bucket.to_string(),
                format_opt_u64(hit.gap)
            )?;
        }
        Ok(())
    }
}

impl TextReport for BatchHitResult {
    fn write_text(&self, out: &mut String) -> fmt::Result {
        banner(out, "BATCH BUCKET HITS")?;
        writeln!(out, "Stream:    {}", self.stream)?;
        writeln!(out, "Tolerance: {}", self.tolerance)?;
        writeln!(out, "Limit:     {} per bucket", self.limit_per_bucket)?;
        writeln!(out)?;

        for (key, hits) in &self.hits_by_bucket {
            writeln!(out, "Bucket {}:", key)?;
            let nonces: Vec<String> = hits.iter().map(|h| h.sequence_index.to_string()).collect();
            if nonces.is_empty() {
                writeln!(out, "  Hits: none")?;
            } else {
                writeln!(out, "  Hits: {}", nonces.join(", "))?;
            }
            if let Some(stats) = self.stats_by_bucket.get(key) {
                write_stats(out, "  ", stats)?;
            }
            writeln!(out)?;
        }
        Ok(())
    }
}

impl TextReport for RangeStatsResult {
    fn write_text(&self, out: &mut String) -> fmt::Result {
        banner(out, "RANGE STATISTICS")?;
        writeln!(out, "Stream:    {}", self.stream)?;
        writeln!(out, "Bucket:    {} (±{})", self.bucket, self.tolerance)?;
        writeln!(out)?;
        for range in &self.stats_by_range {
            writeln!(out, "Range {}:", range.range)?;
            write_stats(out, "  ", &range.stats)?;
        }
        Ok(())
    }
}

impl TextReport for GlobalStatsResult {
    fn write_text(&self, out: &mut String) -> fmt::Result {
        banner(out, "GLOBAL STATISTICS")?;
        writeln!(out, "Stream:    {}", self.stream)?;
        writeln!(out, "Bucket:    {} (±{})", self.bucket, self.tolerance)?;
        writeln!(out, "Hits:      {}", format_number(self.hit_count as u64))?;
        writeln!(out, "Last hit:  {}", format_opt_u64(self.last_sequence_index))?;
        writeln!(out)?;
        write_stats(out, "", &self.global_stats)?;
        writeln!(out)?;
        writeln!(out, "ETA (observed):    {}", format_opt_f64(self.observed_eta))?;
        writeln!(out, "ETA (theoretical): {}", format_opt_f64(self.theoretical_eta))?;
        match &self.confidence_interval {
            Some(ci) => writeln!(
                out,
                "Mean gap CI:       [{:.2}, {:.2}] (z={}, n={})",
                ci.lower, ci.upper, ci.z, ci.sample_size
            ),
            None => writeln!(out, "Mean gap CI:       - (sample too small)"),
        }
    }
}

impl TextReport for DensityResult {
    fn write_text(&self, out: &mut String) -> fmt::Result {
        banner(out, "DENSITY")?;
        writeln!(out, "Stream:    {}", self.stream)?;
        writeln!(out, "Window:    {}", format_number(self.window_size))?;
        writeln!(out, "Events:    {}", format_number(self.total_events))?;
        writeln!(out)?;
        write_density(out, self.window_size, &self.windows)
    }
}

fn write_density(
    out: &mut String,
    window_size: u64,
    windows: &std::collections::BTreeMap<u64, u64>,
) -> fmt::Result {
    const BAR_WIDTH: u64 = 40;
    let peak = windows.values().copied().max().unwrap_or(0).max(1);
    for (&window, &count) in windows {
        let start = window.saturating_mul(window_size);
        let end = start.saturating_add(window_size);
        let bar = "█".repeat(((count * BAR_WIDTH + peak - 1) / peak) as usize);
        writeln!(out, "{:>10}-{:<10} {:>8}  {}", start, end, count, bar)?;
    }
    Ok(())
}

impl TextReport for StreamMetrics {
    fn write_text(&self, out: &mut String) -> fmt::Result {
        banner(out, "STREAM METRICS")?;
        writeln!(out, "Stream:     {}", self.stream)?;
        writeln!(out, "Events:     {}", format_number(self.total_events as u64))?;
        writeln!(out, "Highest:    {}", format_opt_f64(self.highest_result))?;
        writeln!(out, "Rate:       {:.2} events/min", self.hit_rate_per_minute)?;
        writeln!(out)?;

        for bucket in &self.buckets {
            writeln!(
                out,
                "Bucket {}: {} hits, last {}",
                bucket.bucket,
                format_number(bucket.count as u64),
                format_opt_u64(bucket.last_sequence_index)
            )?;
            write_stats(out, "  ", &bucket.stats)?;
            writeln!(
                out,
                "  ETA observed: {}   theoretical: {}",
                format_opt_f64(bucket.eta_observed),
                format_opt_f64(bucket.eta_theoretical)
            )?;
        }
        if !self.buckets.is_empty() {
            writeln!(out)?;
        }

        writeln!(out, "Top peaks:")?;
        for peak in &self.top_peaks {
            writeln!(out, "  {:>12.2} at nonce {}", peak.result, peak.sequence_index)?;
        }
        writeln!(out)?;

        writeln!(out, "Density (window {}):", format_number(self.window_size))?;
        write_density(out, self.window_size, &self.density)
    }
}

/// Format number with thousands separators
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();

    for (count, c) in s.chars().rev().enumerate() {
        if count > 0 && count % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }

    result.chars().rev().collect()
}

fn format_opt_f64(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.2}", v))
}

fn format_opt_u64(value: Option<u64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}
