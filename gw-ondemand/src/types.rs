// Shared types for the gateway lifecycle

//! Shared data structures
//!
//! This module defines the data model shared between components: the managed
//! instance snapshot read from the control plane, the activity sample produced
//! by the oracle, and the configuration structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of the managed instance, as reported by the control plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceState {
    /// Booting after a start command
    Pending,
    /// Up and serving
    Running,
    /// Shutting down after a stop command
    Stopping,
    /// Fully stopped
    Stopped,
    /// Being terminated
    ShuttingDown,
    /// Gone for good
    Terminated,
    /// Any state name the control plane reports that we don't recognise
    #[serde(other)]
    Unknown,
}

impl ResourceState {
    /// Parse a control-plane state name. Unrecognised names map to `Unknown`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "pending" => Self::Pending,
            "running" => Self::Running,
            "stopping" => Self::Stopping,
            "stopped" => Self::Stopped,
            "shutting-down" => Self::ShuttingDown,
            "terminated" => Self::Terminated,
            _ => Self::Unknown,
        }
    }

    /// Control-plane name of the state
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::ShuttingDown => "shutting-down",
            Self::Terminated => "terminated",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the managed instance. Re-read on every invocation, never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedResource {
    /// Control-plane instance ID
    pub instance_id: String,
    /// Lifecycle state at the time of the read
    pub state: ResourceState,
    /// Public address, present only while the instance has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<String>,
    /// When the instance was last started
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launch_time: Option<DateTime<Utc>>,
    /// Instance size, `unknown` when not reported
    pub instance_type: String,
}

/// How much the oracle actually knew when it produced an [`ActivitySample`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Sessions were enumerated and counted
    Exact,
    /// Oracle is healthy but opaque; activity is assumed
    Inferred,
    /// Oracle unreachable; no activity is assumed
    Unknown,
}

/// Best-known number of active client sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActivitySample {
    /// Number of sessions considered active
    pub count: u32,
    /// How the count was obtained
    pub confidence: Confidence,
}

impl ActivitySample {
    /// Sample used when the oracle cannot be reached
    pub fn unreachable() -> Self {
        Self {
            count: 0,
            confidence: Confidence::Unknown,
        }
    }

    /// Sample used when the oracle is healthy but cannot enumerate sessions
    pub fn inferred() -> Self {
        Self {
            count: 1,
            confidence: Confidence::Inferred,
        }
    }

    /// Sample from an enumerated session listing
    pub fn exact(count: u32) -> Self {
        Self {
            count,
            confidence: Confidence::Exact,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// Instance, oracle and logging settings
    #[serde(default)]
    pub general: GeneralConfig,
    /// Control API settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Idle monitor loop settings
    #[serde(default)]
    pub monitor: MonitorConfig,
}

/// General configuration options
#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    /// ID of the managed instance
    #[serde(default)]
    pub instance_id: String,
    /// Base URL of the Headscale activity oracle
    #[serde(default)]
    pub headscale_url: Option<String>,
    /// Minutes since last seen before a node counts as idle
    #[serde(default = "default_idle_timeout_minutes")]
    pub idle_timeout_minutes: u64,
    /// Namespace monitor metrics are published under
    #[serde(default = "default_metrics_namespace")]
    pub metrics_namespace: String,
    /// AWS region (falls back to the SDK's own resolution)
    #[serde(default)]
    pub region: Option<String>,
    /// Default log filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Control API server options
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Socket address the control API binds to
    #[serde(default = "default_listen")]
    pub listen: String,
}

/// Idle monitor loop options
#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    /// Minutes between cycles in watch mode
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            instance_id: String::new(),
            headscale_url: None,
            idle_timeout_minutes: default_idle_timeout_minutes(),
            metrics_namespace: default_metrics_namespace(),
            region: None,
            log_level: default_log_level(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
        }
    }
}

// Default values for configuration
fn default_idle_timeout_minutes() -> u64 {
    60
}

fn default_metrics_namespace() -> String {
    "ZeroTeir".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_interval_minutes() -> u64 {
    5
}
