// Lifecycle actuator for the managed instance

//! Start/stop commands with idempotent short-circuits
//!
//! Start waits (bounded) until the instance is `running` so the caller gets a
//! usable address back; stop only issues the command and reports the state
//! observed right after it.

use crate::backend::ResourceBackend;
use crate::error::{ControlError, ControlResult};
use crate::types::{ManagedResource, ResourceState};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Delay between state polls while waiting for start (seconds)
pub const START_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Maximum number of state polls while waiting for start (40 * 5s = 200s)
pub const START_MAX_ATTEMPTS: u32 = 40;

/// Control operation exposed over the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    /// Start and wait for running
    Start,
    /// Stop without waiting
    Stop,
    /// Read-only snapshot
    Status,
}

/// Result of a control operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleOutcome {
    /// Operation that produced this outcome
    pub action: ControlAction,
    /// Human-readable summary
    pub message: String,
    /// Instance snapshot at the end of the operation
    pub resource: ManagedResource,
}

/// Issues lifecycle commands against the backend
#[derive(Clone)]
pub struct Actuator {
    backend: Arc<dyn ResourceBackend>,
    poll_interval: Duration,
    max_attempts: u32,
}

impl Actuator {
    /// Create an actuator with the default 5s x 40 start wait
    pub fn new(backend: Arc<dyn ResourceBackend>) -> Self {
        Self::with_wait(backend, START_POLL_INTERVAL, START_MAX_ATTEMPTS)
    }

    /// Create an actuator with a custom start wait
    pub fn with_wait(
        backend: Arc<dyn ResourceBackend>,
        poll_interval: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            backend,
            poll_interval,
            max_attempts,
        }
    }

    /// Backend this actuator drives
    pub fn backend(&self) -> &Arc<dyn ResourceBackend> {
        &self.backend
    }

    /// Current snapshot of the instance
    pub async fn status(&self, instance_id: &str) -> ControlResult<LifecycleOutcome> {
        log::info!("Getting status for instance {}", instance_id);
        let resource = self.backend.describe(instance_id).await?;

        Ok(LifecycleOutcome {
            action: ControlAction::Status,
            message: format!("Instance is {}", resource.state),
            resource,
        })
    }

    /// Start the instance and wait until it is running.
    ///
    /// Returns immediately without issuing a command if the instance is
    /// already running or pending.
    pub async fn start(&self, instance_id: &str) -> ControlResult<LifecycleOutcome> {
        log::info!("Starting instance {}", instance_id);

        let current = self.backend.describe(instance_id).await?;
        match current.state {
            ResourceState::Running => {
                log::info!("Instance is already running");
                return Ok(outcome(ControlAction::Start, "Instance is already running", current));
            }
            ResourceState::Pending => {
                log::info!("Instance is already starting");
                return Ok(outcome(ControlAction::Start, "Instance is already starting", current));
            }
            _ => {}
        }

        self.backend
            .start(instance_id)
            .await
            .inspect_err(|e| log::error!("Failed to start instance: {}", e))?;

        let resource = self.wait_until_running(instance_id).await?;
        log::info!(
            "Instance started successfully: {}",
            resource.public_ip.as_deref().unwrap_or("no public IP")
        );

        Ok(outcome(ControlAction::Start, "Instance started successfully", resource))
    }

    /// Stop the instance without waiting for it to be fully stopped.
    ///
    /// Returns immediately without issuing a command if the instance is
    /// already stopped or stopping.
    pub async fn stop(&self, instance_id: &str) -> ControlResult<LifecycleOutcome> {
        log::info!("Stopping instance {}", instance_id);

        let current = self.backend.describe(instance_id).await?;
        if matches!(current.state, ResourceState::Stopped | ResourceState::Stopping) {
            log::info!("Instance is already {}", current.state);
            let message = format!("Instance is already {}", current.state);
            return Ok(outcome(ControlAction::Stop, message, current));
        }

        self.backend
            .stop(instance_id)
            .await
            .inspect_err(|e| log::error!("Failed to stop instance: {}", e))?;

        let resource = self.backend.describe(instance_id).await?;
        Ok(outcome(ControlAction::Stop, "Instance stop initiated", resource))
    }

    /// Poll until the instance reports `running`, at most `max_attempts` times.
    /// The wait is a plain async sleep loop; dropping the future cancels it.
    async fn wait_until_running(&self, instance_id: &str) -> ControlResult<ManagedResource> {
        for attempt in 1..=self.max_attempts {
            tokio::time::sleep(self.poll_interval).await;

            let resource = self.backend.describe(instance_id).await?;
            match resource.state {
                ResourceState::Running => {
                    log::debug!("Instance running after {} poll(s)", attempt);
                    return Ok(resource);
                }
                ResourceState::Stopping | ResourceState::ShuttingDown | ResourceState::Terminated => {
                    log::error!(
                        "Instance entered {} while waiting for running",
                        resource.state
                    );
                    return Err(ControlError::Provider {
                        code: "IncorrectInstanceState".to_string(),
                        message: format!(
                            "Instance {} entered {} while starting",
                            instance_id, resource.state
                        ),
                    });
                }
                state => {
                    log::debug!(
                        "Waiting for running: state={} (attempt {}/{})",
                        state,
                        attempt,
                        self.max_attempts
                    );
                }
            }
        }

        log::error!(
            "Instance {} did not reach running within {}s",
            instance_id,
            self.poll_interval.as_secs() * u64::from(self.max_attempts)
        );
        Err(ControlError::WaitTimeout {
            instance_id: instance_id.to_string(),
            attempts: self.max_attempts,
        })
    }
}

fn outcome(
    action: ControlAction,
    message: impl Into<String>,
    resource: ManagedResource,
) -> LifecycleOutcome {
    LifecycleOutcome {
        action,
        message: message.into(),
        resource,
    }
}
