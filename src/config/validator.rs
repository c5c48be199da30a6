//! Configuration validation

use super::*;
use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Validate complete configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_query(&config.query)?;
    validate_logging(&config.logging)?;
    validate_model(&config.model)?;

    Ok(())
}

/// Validate query limits and defaults
pub fn validate_query(query: &QueryConfig) -> Result<()> {
    if !query.default_tolerance.is_finite() || query.default_tolerance <= 0.0 {
        anyhow::bail!(
            "default_tolerance must be greater than 0, got {}",
            query.default_tolerance
        );
    }

    if query.max_limit == 0 {
        anyhow::bail!("max_limit must be at least 1");
    }
    if query.default_limit == 0 || query.default_limit > query.max_limit {
        anyhow::bail!(
            "default_limit must be between 1 and max_limit ({}), got {}",
            query.max_limit,
            query.default_limit
        );
    }

    if query.max_batch_buckets == 0 {
        anyhow::bail!("max_batch_buckets must be at least 1");
    }

    if query.default_window_size == 0 {
        anyhow::bail!("default_window_size must be greater than 0");
    }

    if query.max_top_peaks == 0 {
        anyhow::bail!("max_top_peaks must be at least 1");
    }
    if query.default_top_peaks == 0 || query.default_top_peaks > query.max_top_peaks {
        anyhow::bail!(
            "default_top_peaks must be between 1 and max_top_peaks ({}), got {}",
            query.max_top_peaks,
            query.default_top_peaks
        );
    }

    if !query.confidence_z.is_finite() || query.confidence_z <= 0.0 {
        anyhow::bail!("confidence_z must be greater than 0, got {}", query.confidence_z);
    }

    Ok(())
}

/// Validate the log filter directive
pub fn validate_logging(logging: &LoggingConfig) -> Result<()> {
    EnvFilter::try_new(&logging.level)
        .with_context(|| format!("Invalid log level: {}", logging.level))?;
    Ok(())
}

/// Validate hit probabilities
pub fn validate_model(model: &ModelConfig) -> Result<()> {
    model
        .probability_table()
        .context("Invalid [model] section")?;
    Ok(())
}
