use crate::error::{AppError, Result};

use super::{Config, Thresholds};

/// Check a loaded configuration and report every problem at once.
pub fn validate_config(config: &Config) -> Result<()> {
    let mut issues = Vec::new();

    if config.market.venue.trim().is_empty() {
        issues.push("market.venue must not be empty".to_string());
    }
    if config.market.screener.trim().is_empty() {
        issues.push("market.screener must not be empty".to_string());
    }
    if !config.market.endpoint.starts_with("http://")
        && !config.market.endpoint.starts_with("https://")
    {
        issues.push(format!(
            "market.endpoint must be an http(s) URL, got `{}`",
            config.market.endpoint
        ));
    }

    if config.fetch.concurrency == 0 {
        issues.push("fetch.concurrency must be at least 1".to_string());
    }
    if config.fetch.timeout_secs == 0 {
        issues.push("fetch.timeout_secs must be greater than zero".to_string());
    }
    if config.fetch.cache_capacity == 0 {
        issues.push("fetch.cache_capacity must be at least 1".to_string());
    }
    if config.fetch.cache_ttl_secs == 0 {
        issues.push("fetch.cache_ttl_secs must be greater than zero".to_string());
    }

    if config.fetch.cache_ttl_secs >= config.schedule.ingest_every_secs {
        issues.push(format!(
            "fetch.cache_ttl_secs ({}) must be shorter than schedule.ingest_every_secs ({})",
            config.fetch.cache_ttl_secs, config.schedule.ingest_every_secs
        ));
    }

    for (name, secs) in [
        ("schedule.ingest_every_secs", config.schedule.ingest_every_secs),
        ("schedule.ingest_backoff_secs", config.schedule.ingest_backoff_secs),
        ("schedule.report_every_secs", config.schedule.report_every_secs),
    ] {
        if secs == 0 {
            issues.push(format!("{name} must be greater than zero"));
        }
    }

    validate_thresholds(&config.thresholds, &mut issues);

    if config.history_file.as_os_str().is_empty() {
        issues.push("history_file must not be empty".to_string());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(AppError::message(format!(
            "Invalid configuration:\n  - {}",
            issues.join("\n  - ")
        )))
    }
}

fn validate_thresholds(thresholds: &Thresholds, issues: &mut Vec<String>) {
    let Thresholds {
        overbought,
        oversold,
        neutral_low,
        neutral_high,
    } = *thresholds;

    for (name, value) in [
        ("overbought", overbought),
        ("oversold", oversold),
        ("neutral_low", neutral_low),
        ("neutral_high", neutral_high),
    ] {
        if !(0.0..=100.0).contains(&value) {
            issues.push(format!("thresholds.{name} must lie within 0..=100"));
        }
    }

    if oversold >= overbought {
        issues.push("thresholds.oversold must be below the overbought lower bound".to_string());
    }
    if neutral_low > neutral_high {
        issues.push("thresholds.neutral_low must not exceed neutral_high".to_string());
    }
    if neutral_low < oversold || neutral_high > overbought {
        issues.push(
            "thresholds neutral band must sit between the oversold and overbought levels"
                .to_string(),
        );
    }
}
