// Metrics sink

//! Telemetry for monitor cycles
//!
//! Each cycle publishes `ActiveConnections` and `InstanceState` under the
//! configured namespace. Publishing failures are logged and swallowed.

use crate::aws::classify_sdk_error;
use crate::engine::Decision;
use crate::error::{ControlError, ControlResult};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_cloudwatch::primitives::DateTime as AwsDateTime;
use aws_sdk_cloudwatch::types::{MetricDatum, StandardUnit};
use aws_sdk_cloudwatch::Client;
use chrono::{DateTime, Utc};

/// A single timestamped observation
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    /// Metric name, e.g. `ActiveConnections`
    pub metric_name: &'static str,
    /// Observed value
    pub value: f64,
    /// CloudWatch unit name
    pub unit: &'static str,
    /// Observation time
    pub timestamp: DateTime<Utc>,
}

/// Destination for metric observations
#[async_trait]
pub trait MetricsSink: Send + Sync {
    /// Publish `metrics` under `namespace` in one call
    async fn put_metrics(&self, namespace: &str, metrics: &[Metric]) -> ControlResult<()>;
}

/// Observations for a decision, timestamped at `now`
pub fn decision_metrics(decision: &Decision, now: DateTime<Utc>) -> Vec<Metric> {
    vec![
        Metric {
            metric_name: "ActiveConnections",
            value: f64::from(decision.metrics.active_connections),
            unit: "Count",
            timestamp: now,
        },
        Metric {
            metric_name: "InstanceState",
            value: f64::from(decision.metrics.instance_state),
            unit: "None",
            timestamp: now,
        },
    ]
}

/// Publish a decision's metrics. Never fails the caller.
pub async fn publish(sink: &dyn MetricsSink, namespace: &str, decision: &Decision) {
    let metrics = decision_metrics(decision, Utc::now());

    match sink.put_metrics(namespace, &metrics).await {
        Ok(()) => log::info!(
            "Published metrics: ActiveConnections={}, InstanceState={}",
            decision.metrics.active_connections,
            decision.metrics.instance_state
        ),
        Err(e) => log::error!("Error publishing metrics: {}", e),
    }
}

/// CloudWatch sink on the AWS SDK
#[derive(Debug, Clone)]
pub struct CloudWatchSink {
    client: Client,
}

impl CloudWatchSink {
    /// Create a sink from a loaded SDK config
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

#[async_trait]
impl MetricsSink for CloudWatchSink {
    async fn put_metrics(&self, namespace: &str, metrics: &[Metric]) -> ControlResult<()> {
        let data = metrics
            .iter()
            .map(to_datum)
            .collect::<ControlResult<Vec<_>>>()?;

        self.client
            .put_metric_data()
            .namespace(namespace)
            .set_metric_data(Some(data))
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(())
    }
}

/// Convert an observation into a CloudWatch datum
pub fn to_datum(metric: &Metric) -> ControlResult<MetricDatum> {
    MetricDatum::builder()
        .metric_name(metric.metric_name)
        .value(metric.value)
        .unit(StandardUnit::from(metric.unit))
        .timestamp(AwsDateTime::from_secs(metric.timestamp.timestamp()))
        .build()
        .map_err(|e| ControlError::Internal(format!("Invalid metric datum: {}", e)))
}
