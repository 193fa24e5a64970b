// Idle monitor cycle

//! Periodic idle monitor
//!
//! One call to [`Monitor::run_cycle`] is one scheduled check: read the
//! instance, probe the oracle if it is running, decide, publish metrics
//! exactly once, and stop the instance if it is idle. The cycle always
//! produces a [`MonitorResult`]; failures become `action: "error"`.

use crate::actuator::Actuator;
use crate::engine::{self, Action, Decision};
use crate::metrics::{self, MetricsSink};
use crate::oracle::{self, ActivityOracle};
use crate::types::{ActivitySample, ResourceState};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

/// Structured outcome of one monitor cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorResult {
    /// 200 on success, 500 on failure
    pub status_code: u16,
    /// `skipped`, `stopped`, `running` or `error`
    pub action: String,
    /// Human-readable explanation
    pub reason: String,
    /// Connections counted, absent when the instance was not probed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_connections: Option<u32>,
    /// Instance state reported for the cycle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_state: Option<String>,
}

/// Monitor settings taken from configuration
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Instance to watch
    pub instance_id: String,
    /// Minutes since last seen before a node counts as idle
    pub idle_timeout_minutes: u64,
    /// Namespace for published metrics
    pub metrics_namespace: String,
}

/// Runs idle-check cycles against one instance
pub struct Monitor {
    actuator: Actuator,
    oracle: Arc<dyn ActivityOracle>,
    sink: Arc<dyn MetricsSink>,
    settings: MonitorSettings,
}

impl Monitor {
    /// Create a monitor from its collaborators
    pub fn new(
        actuator: Actuator,
        oracle: Arc<dyn ActivityOracle>,
        sink: Arc<dyn MetricsSink>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            actuator,
            oracle,
            sink,
            settings,
        }
    }

    /// Run one idle-check cycle
    pub async fn run_cycle(&self) -> MonitorResult {
        log::info!("Idle monitor check started");
        let instance_id = &self.settings.instance_id;

        let resource = match self.actuator.backend().describe(instance_id).await {
            Ok(resource) => resource,
            Err(e) => {
                log::error!("Error getting instance state: {}", e);
                let decision = Decision::error(e.to_string());
                self.publish(&decision).await;
                return MonitorResult {
                    status_code: 500,
                    action: Action::Error.as_str().to_string(),
                    reason: decision.reason,
                    active_connections: None,
                    instance_state: None,
                };
            }
        };
        log::info!("Instance state: {}", resource.state);

        let activity = if resource.state == ResourceState::Running {
            oracle::probe(
                self.oracle.as_ref(),
                self.settings.idle_timeout_minutes,
                Utc::now(),
            )
            .await
        } else {
            // Not probed; the engine skips non-running instances
            ActivitySample::exact(0)
        };

        let decision = engine::evaluate(&resource, &activity);
        self.publish(&decision).await;

        match decision.action {
            Action::Skip => {
                log::info!(
                    "Instance not running (state: {}), skipping idle check",
                    resource.state
                );
                MonitorResult {
                    status_code: 200,
                    action: decision.action.as_str().to_string(),
                    reason: decision.reason,
                    active_connections: None,
                    instance_state: Some(resource.state.to_string()),
                }
            }
            Action::Stop => {
                log::info!("No active connections detected, stopping instance");
                // State was read this cycle; only the stop command itself decides the outcome
                match self.actuator.backend().stop(instance_id).await {
                    Ok(()) => MonitorResult {
                        status_code: 200,
                        action: decision.action.as_str().to_string(),
                        reason: decision.reason,
                        active_connections: Some(0),
                        instance_state: Some(ResourceState::Stopping.to_string()),
                    },
                    Err(e) => {
                        log::error!("Error stopping instance: {}", e);
                        MonitorResult {
                            status_code: 500,
                            action: Action::Error.as_str().to_string(),
                            reason: "Failed to stop instance".to_string(),
                            active_connections: Some(0),
                            instance_state: Some(resource.state.to_string()),
                        }
                    }
                }
            }
            Action::KeepRunning => {
                log::info!(
                    "{} active connection(s), instance remains running",
                    activity.count
                );
                MonitorResult {
                    status_code: 200,
                    action: decision.action.as_str().to_string(),
                    reason: decision.reason,
                    active_connections: Some(decision.metrics.active_connections),
                    instance_state: Some(resource.state.to_string()),
                }
            }
            Action::Error => MonitorResult {
                status_code: 500,
                action: decision.action.as_str().to_string(),
                reason: decision.reason,
                active_connections: None,
                instance_state: Some(resource.state.to_string()),
            },
        }
    }

    async fn publish(&self, decision: &Decision) {
        metrics::publish(
            self.sink.as_ref(),
            &self.settings.metrics_namespace,
            decision,
        )
        .await;
    }
}
