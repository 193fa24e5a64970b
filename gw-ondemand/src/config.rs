// Configuration loader

//! Configuration loading and validation
//!
//! Configuration comes from an optional TOML file, overridden by the
//! environment variables a scheduled deployment sets (`INSTANCE_ID`,
//! `HEADSCALE_URL`, `IDLE_TIMEOUT_MINUTES`, `CLOUDWATCH_NAMESPACE`, ...).

use crate::types::Config;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Load configuration from an optional TOML file and the process environment.
///
/// A missing file is only an error when `required` is set (the path was given
/// explicitly on the command line).
pub fn load_config<P: AsRef<Path>>(path: P, required: bool) -> Result<Config> {
    let path = path.as_ref();

    let mut config = if path.exists() {
        let contents = fs::read_to_string(path).context("Failed to read config file")?;
        toml::from_str(&contents).context("Failed to parse config file")?
    } else if required {
        anyhow::bail!("Config file {} does not exist", path.display());
    } else {
        log::debug!("No config file at {}, using environment only", path.display());
        Config::default()
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config)?;
    Ok(config)
}

/// Apply environment overrides using the supplied lookup
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(id) = lookup("INSTANCE_ID") {
        config.general.instance_id = id;
    }
    if let Some(url) = lookup("HEADSCALE_URL") {
        config.general.headscale_url = Some(url);
    }
    if let Some(minutes) = lookup("IDLE_TIMEOUT_MINUTES") {
        config.general.idle_timeout_minutes = minutes
            .trim()
            .parse()
            .with_context(|| format!("Invalid IDLE_TIMEOUT_MINUTES: {}", minutes))?;
    }
    if let Some(namespace) = lookup("CLOUDWATCH_NAMESPACE") {
        config.general.metrics_namespace = namespace;
    }
    if let Some(region) = lookup("AWS_REGION") {
        config.general.region = Some(region);
    }
    if let Some(listen) = lookup("LISTEN_ADDR") {
        config.server.listen = listen;
    }
    if let Some(minutes) = lookup("MONITOR_INTERVAL_MINUTES") {
        config.monitor.interval_minutes = minutes
            .trim()
            .parse()
            .with_context(|| format!("Invalid MONITOR_INTERVAL_MINUTES: {}", minutes))?;
    }
    Ok(())
}

/// Validate configuration values
pub fn validate_config(config: &Config) -> Result<()> {
    if config.general.instance_id.trim().is_empty() {
        anyhow::bail!("instance_id cannot be empty (set INSTANCE_ID)");
    }

    if config.general.idle_timeout_minutes == 0 {
        anyhow::bail!("idle_timeout_minutes must be > 0");
    }

    if config.general.metrics_namespace.is_empty() {
        anyhow::bail!("metrics_namespace cannot be empty");
    }

    if let Some(url) = &config.general.headscale_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            anyhow::bail!("headscale_url must be an http:// or https:// URL, got '{}'", url);
        }
    }

    if config.monitor.interval_minutes == 0 {
        anyhow::bail!("monitor.interval_minutes must be > 0");
    }

    Ok(())
}

/// Oracle base URL, required by the idle monitor
pub fn require_headscale_url(config: &Config) -> Result<&str> {
    config
        .general
        .headscale_url
        .as_deref()
        .context("headscale_url (HEADSCALE_URL) is required for the idle monitor")
}
