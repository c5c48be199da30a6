//! hitpulse CLI entry point

use anyhow::{Context, Result};
use hitpulse::config::cli::Cli;
use hitpulse::config::cli_convert::{build_request, resolve_stream, Request};
use hitpulse::config::{toml::load_config, Config, OutputFormat};
use hitpulse::error::QueryResult;
use hitpulse::output::{json, text, ErrorReport};
use hitpulse::query::{self, CancellationToken};
use hitpulse::source::jsonl::load_event_log;
use hitpulse::source::{MemoryEventLog, StreamId};
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info};

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();
    cli.validate()?;

    let config = load_config(&cli).context("Configuration validation failed")?;
    init_logging(&config);
    debug!("{}", config);

    let load_start = Instant::now();
    let log = load_event_log(&cli.events)?;
    info!(
        path = %cli.events.display(),
        elapsed_ms = load_start.elapsed().as_millis() as u64,
        "event log ready"
    );

    let request = match build_request(&cli.command, &config.query) {
        Ok(request) => request,
        Err(e) => report_failure(&ErrorReport::from(&e), &config),
    };

    run(&request, &cli, &log, &config)
}

/// Install the tracing subscriber: RUST_LOG wins over the configured level
fn init_logging(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Execute a query request and print its result
fn run(request: &Request, cli: &Cli, log: &MemoryEventLog, config: &Config) -> Result<()> {
    let resolve = || -> Result<StreamId> {
        let stream = resolve_stream(cli, log)?;
        debug!(stream = %stream, "resolved stream");
        Ok(stream)
    };

    let query_config = &config.query;
    let model = config.model.probability_table()?;
    let model_ref = model
        .as_ref()
        .map(|table| table as &dyn query::HitProbabilityModel);

    match request {
        Request::Streams => {
            let summaries = log.summaries().context("Failed to list streams")?;
            emit(summaries.as_slice(), config)
        }
        Request::Hits(q) => emit_result(query::query_hits(log, &resolve()?, q, query_config), config),
        Request::Batch(q) => emit_result(
            query::query_batch(log, &resolve()?, q, query_config, &CancellationToken::new()),
            config,
        ),
        Request::RangeStats(q) => {
            emit_result(query::query_range_stats(log, &resolve()?, q, query_config), config)
        }
        Request::GlobalStats(q) => emit_result(
            query::query_global_stats(log, &resolve()?, q, query_config, model_ref),
            config,
        ),
        Request::Density { window_size } => emit_result(
            query::query_density(log, &resolve()?, *window_size, query_config),
            config,
        ),
        Request::Metrics(q) => emit_result(
            query::query_metrics(log, &resolve()?, q, query_config, model_ref),
            config,
        ),
    }
}

fn emit_result<T>(result: QueryResult<T>, config: &Config) -> Result<()>
where
    T: Serialize + text::TextReport,
{
    match result {
        Ok(value) => emit(&value, config),
        Err(e) => report_failure(&ErrorReport::from(&e), config),
    }
}

fn emit<T>(value: &T, config: &Config) -> Result<()>
where
    T: Serialize + text::TextReport + ?Sized,
{
    match config.output.format {
        OutputFormat::Json => json::write_json(std::io::stdout().lock(), value, config.output.pretty),
        OutputFormat::Text => {
            text::print_report(value);
            Ok(())
        }
    }
}

/// Print a tagged query failure and exit non-zero
fn report_failure(report: &ErrorReport, config: &Config) -> ! {
    match config.output.format {
        OutputFormat::Json => match json::error_json(report, config.output.pretty) {
            Ok(doc) => println!("{}", doc),
            Err(_) => eprintln!("Error [{}]: {}", report.kind, report.message),
        },
        OutputFormat::Text => eprintln!("Error [{}]: {}", report.kind, report.message),
    }
    std::process::exit(1);
}
