// Control-plane backend for the managed instance

//! Resource state reader and control-plane capability
//!
//! [`ResourceBackend`] is the seam between the lifecycle logic and the cloud
//! provider. [`Ec2Backend`] implements it on top of the EC2 SDK client.

use crate::aws::classify_sdk_error;
use crate::error::{ControlError, ControlResult};
use crate::types::{ManagedResource, ResourceState};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_ec2::operation::describe_instances::DescribeInstancesOutput;
use aws_sdk_ec2::Client;
use chrono::{DateTime, Utc};

/// Control-plane operations on a single instance
#[async_trait]
pub trait ResourceBackend: Send + Sync {
    /// Read the current state and attributes of the instance
    async fn describe(&self, instance_id: &str) -> ControlResult<ManagedResource>;

    /// Issue a start command (does not wait)
    async fn start(&self, instance_id: &str) -> ControlResult<()>;

    /// Issue a stop command (does not wait)
    async fn stop(&self, instance_id: &str) -> ControlResult<()>;
}

/// EC2 backend on the AWS SDK
#[derive(Debug, Clone)]
pub struct Ec2Backend {
    client: Client,
}

impl Ec2Backend {
    /// Create a backend from a loaded SDK config
    pub fn new(config: &SdkConfig) -> Self {
        Self::from_client(Client::new(config))
    }

    /// Wrap an already configured EC2 client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceBackend for Ec2Backend {
    async fn describe(&self, instance_id: &str) -> ControlResult<ManagedResource> {
        check_id(instance_id)?;
        let output = self
            .client
            .describe_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))
            .inspect_err(|e| log::error!("Error describing instance {}: {}", instance_id, e))?;
        parse_describe_output(instance_id, &output)
    }

    async fn start(&self, instance_id: &str) -> ControlResult<()> {
        check_id(instance_id)?;
        self.client
            .start_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        log::info!("Start command sent for {}", instance_id);
        Ok(())
    }

    async fn stop(&self, instance_id: &str) -> ControlResult<()> {
        check_id(instance_id)?;
        self.client
            .stop_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        log::info!("Stop command sent for {}", instance_id);
        Ok(())
    }
}

fn check_id(instance_id: &str) -> ControlResult<()> {
    if instance_id.trim().is_empty() {
        return Err(ControlError::Validation(
            "instance_id cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Reduce a `DescribeInstances` response to a resource snapshot.
/// An empty reservation list means the instance does not exist.
pub fn parse_describe_output(
    instance_id: &str,
    output: &DescribeInstancesOutput,
) -> ControlResult<ManagedResource> {
    let instance = output
        .reservations()
        .iter()
        .flat_map(|r| r.instances())
        .next()
        .ok_or_else(|| ControlError::NotFound(instance_id.to_string()))?;

    let state = instance
        .state()
        .and_then(|s| s.name())
        .map(|name| ResourceState::from_name(name.as_str()))
        .unwrap_or(ResourceState::Unknown);

    let launch_time = instance
        .launch_time()
        .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()));

    Ok(ManagedResource {
        instance_id: instance.instance_id().unwrap_or(instance_id).to_string(),
        state,
        public_ip: instance.public_ip_address().map(str::to_string),
        launch_time,
        instance_type: instance
            .instance_type()
            .map(|t| t.as_str().to_string())
            .unwrap_or_else(|| "unknown".to_string()),
    })
}
