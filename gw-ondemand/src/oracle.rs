// Headscale activity oracle

//! Activity oracle client
//!
//! Reduces what the Headscale coordination server tells us to an
//! [`ActivitySample`]. The two fallbacks are deliberately asymmetric:
//!
//! - unreachable or unhealthy oracle: `{0, Unknown}`, so an idle gateway gets stopped
//! - healthy oracle without a node listing: `{1, Inferred}`, so sessions we
//!   cannot see are not cut off
//!
//! Oracle failures never propagate to the caller.

use crate::types::ActivitySample;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

/// Timeout for oracle HTTP requests
pub const ORACLE_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = "gw-ondemand-monitor/1.0";

/// One entry of the oracle's node listing
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeEntry {
    #[serde(default)]
    pub name: String,
    /// ISO-8601 timestamp of the last time the node was seen
    #[serde(default)]
    pub last_seen: Option<String>,
}

/// Source of client activity information
#[async_trait]
pub trait ActivityOracle: Send + Sync {
    /// True if the oracle answered its health check with 200
    async fn health(&self) -> bool;

    /// Detailed node listing, or `None` when it cannot be obtained
    async fn list_nodes(&self) -> Option<Vec<NodeEntry>>;
}

/// Probe the oracle and reduce the answer to an activity sample
pub async fn probe(
    oracle: &dyn ActivityOracle,
    idle_timeout_minutes: u64,
    now: DateTime<Utc>,
) -> ActivitySample {
    if !oracle.health().await {
        log::info!("Headscale not responding, assuming no active connections");
        return ActivitySample::unreachable();
    }

    match oracle.list_nodes().await {
        None => {
            log::info!("Cannot query nodes, assuming activity based on health check");
            ActivitySample::inferred()
        }
        Some(nodes) => {
            let active = count_active_nodes(&nodes, now, idle_timeout_minutes);
            log::info!("Total active connections: {}", active);
            ActivitySample::exact(active)
        }
    }
}

/// Count nodes seen within the idle timeout.
/// Entries with a missing or unparsable `lastSeen` are skipped.
pub fn count_active_nodes(nodes: &[NodeEntry], now: DateTime<Utc>, idle_timeout_minutes: u64) -> u32 {
    let mut active = 0;

    for node in nodes {
        let name = if node.name.is_empty() { "unknown" } else { &node.name };

        let Some(raw) = node.last_seen.as_deref().filter(|s| !s.is_empty()) else {
            log::debug!("Node {} has no lastSeen, skipping", name);
            continue;
        };

        let last_seen = match DateTime::parse_from_rfc3339(raw) {
            Ok(t) => t.with_timezone(&Utc),
            Err(e) => {
                log::warn!("Error parsing lastSeen time '{}' for node {}: {}", raw, name, e);
                continue;
            }
        };

        let idle_minutes = (now - last_seen).num_milliseconds() as f64 / 60_000.0;
        if idle_minutes < idle_timeout_minutes as f64 {
            log::info!("Node {} active (idle {:.1}m)", name, idle_minutes);
            active += 1;
        } else {
            log::info!("Node {} idle ({:.1}m)", name, idle_minutes);
        }
    }

    active
}

/// Oracle backed by a Headscale server's HTTP endpoints
#[derive(Debug, Clone)]
pub struct HeadscaleOracle {
    base_url: String,
    client: reqwest::Client,
}

impl HeadscaleOracle {
    /// Create an oracle client with the default 10s timeout
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, ORACLE_TIMEOUT)
    }

    /// Create an oracle client with a custom request timeout
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// URL of the health endpoint
    pub fn health_url(&self) -> String {
        format!("{}/health", self.base_url)
    }

    /// URL of the node listing endpoint
    pub fn nodes_url(&self) -> String {
        format!("{}/api/v1/node", self.base_url)
    }
}

#[async_trait]
impl ActivityOracle for HeadscaleOracle {
    async fn health(&self) -> bool {
        let url = self.health_url();
        log::info!("Checking Headscale health at {}", url);

        match self.client.get(&url).send().await {
            Ok(resp) if resp.status() == reqwest::StatusCode::OK => {
                log::info!("Headscale health check passed");
                true
            }
            Ok(resp) => {
                log::warn!("Headscale health check returned status {}", resp.status());
                false
            }
            Err(e) if e.is_timeout() => {
                log::warn!("Headscale health check timed out: {}", e);
                false
            }
            Err(e) => {
                log::warn!("Headscale health check failed: {}", e);
                false
            }
        }
    }

    async fn list_nodes(&self) -> Option<Vec<NodeEntry>> {
        // TODO: query nodes_url() once an API key is provisioned for the monitor
        log::info!("Querying Headscale nodes at {}", self.nodes_url());
        log::warn!("Headscale node listing is not available without API authentication");
        None
    }
}
