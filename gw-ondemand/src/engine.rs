// Idle decision engine

//! Idle decision engine
//!
//! Pure function from (instance state, activity sample) to the action the
//! monitor should take and the metric values it should publish. No I/O.

use crate::types::{ActivitySample, ManagedResource, ResourceState};
use serde::Serialize;

/// Action chosen for one monitor cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Action {
    /// Instance is not running; nothing to decide
    Skip,
    /// Running with no active connections
    Stop,
    /// Running with at least one active connection
    KeepRunning,
    /// The cycle could not be evaluated
    Error,
}

impl Action {
    /// Name used in the monitor's result object
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Skip => "skipped",
            Action::Stop => "stopped",
            Action::KeepRunning => "running",
            Action::Error => "error",
        }
    }
}

/// Metric values published once per monitor cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EmittedMetrics {
    /// `ActiveConnections` value
    pub active_connections: u32,
    /// `InstanceState` value, see [`state_value`]
    pub instance_state: i32,
}

/// Outcome of evaluating one monitor cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// What the monitor should do
    pub action: Action,
    /// Human-readable explanation
    pub reason: String,
    /// Values to publish for this cycle
    pub metrics: EmittedMetrics,
}

impl Decision {
    /// Decision for a cycle that failed before it could be evaluated.
    /// Reports no connections and the worst-case state value.
    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            action: Action::Error,
            reason: reason.into(),
            metrics: EmittedMetrics {
                active_connections: 0,
                instance_state: state_value(ResourceState::Unknown),
            },
        }
    }
}

/// Numeric value of a state for the `InstanceState` metric.
/// Unrecognised states count as the worst case.
pub fn state_value(state: ResourceState) -> i32 {
    match state {
        ResourceState::Running => 1,
        ResourceState::Stopped | ResourceState::Pending | ResourceState::Stopping => 0,
        ResourceState::Terminated => -1,
        ResourceState::ShuttingDown | ResourceState::Unknown => -1,
    }
}

/// Decide what to do with the instance given its state and current activity
pub fn evaluate(resource: &ManagedResource, activity: &ActivitySample) -> Decision {
    log::debug!(
        "Evaluating: state={}, activity={:?}",
        resource.state,
        activity
    );

    if resource.state != ResourceState::Running {
        return Decision {
            action: Action::Skip,
            reason: format!("Instance not running (state: {})", resource.state),
            metrics: EmittedMetrics {
                active_connections: 0,
                instance_state: state_value(resource.state),
            },
        };
    }

    if activity.count == 0 {
        return Decision {
            action: Action::Stop,
            reason: "No active connections".to_string(),
            metrics: EmittedMetrics {
                active_connections: 0,
                instance_state: state_value(ResourceState::Running),
            },
        };
    }

    Decision {
        action: Action::KeepRunning,
        reason: format!("{} active connection(s)", activity.count),
        metrics: EmittedMetrics {
            active_connections: activity.count,
            instance_state: state_value(ResourceState::Running),
        },
    }
}
