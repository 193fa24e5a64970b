//! In-memory fakes for the backend, oracle and metrics capabilities.

#![allow(dead_code)]

use async_trait::async_trait;
use gw_ondemand::backend::ResourceBackend;
use gw_ondemand::error::{ControlError, ControlResult};
use gw_ondemand::metrics::{Metric, MetricsSink};
use gw_ondemand::oracle::{ActivityOracle, NodeEntry};
use gw_ondemand::types::{ManagedResource, ResourceState};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const INSTANCE_ID: &str = "i-0123456789abcdef0";

pub fn resource(state: ResourceState) -> ManagedResource {
    ManagedResource {
        instance_id: INSTANCE_ID.to_string(),
        state,
        public_ip: None,
        launch_time: None,
        instance_type: "t3.micro".to_string(),
    }
}

struct Inner {
    resource: ManagedResource,
    /// States reported by successive describes once a start was issued
    after_start: VecDeque<ResourceState>,
    started: bool,
    address_on_running: Option<String>,
    describe_error: Option<ControlError>,
    /// Describes succeed this many times, then fail with `describe_error`
    describe_ok_budget: Option<usize>,
    yield_on_describe: bool,
    start_error: Option<ControlError>,
    stop_error: Option<ControlError>,
    describes: usize,
    starts: usize,
    stops: usize,
}

/// Scripted control plane for a single instance
pub struct FakeBackend {
    inner: Mutex<Inner>,
}

impl FakeBackend {
    pub fn new(state: ResourceState) -> Self {
        Self {
            inner: Mutex::new(Inner {
                resource: resource(state),
                after_start: VecDeque::new(),
                started: false,
                address_on_running: None,
                describe_error: None,
                describe_ok_budget: None,
                yield_on_describe: false,
                start_error: None,
                stop_error: None,
                describes: 0,
                starts: 0,
                stops: 0,
            }),
        }
    }

    pub fn with_start_sequence(self, states: &[ResourceState]) -> Self {
        self.inner.lock().unwrap().after_start = states.iter().copied().collect();
        self
    }

    pub fn with_address_on_running(self, ip: &str) -> Self {
        self.inner.lock().unwrap().address_on_running = Some(ip.to_string());
        self
    }

    pub fn with_public_ip(self, ip: &str) -> Self {
        self.inner.lock().unwrap().resource.public_ip = Some(ip.to_string());
        self
    }

    pub fn with_describe_error(self, err: ControlError) -> Self {
        self.inner.lock().unwrap().describe_error = Some(err);
        self
    }

    pub fn with_describe_error_after(self, successes: usize, err: ControlError) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.describe_error = Some(err);
            inner.describe_ok_budget = Some(successes);
        }
        self
    }

    /// Yield to the scheduler after every describe, so concurrent callers
    /// can all read the same state before any of them acts on it
    pub fn with_yielding_describe(self) -> Self {
        self.inner.lock().unwrap().yield_on_describe = true;
        self
    }

    pub fn with_start_error(self, err: ControlError) -> Self {
        self.inner.lock().unwrap().start_error = Some(err);
        self
    }

    pub fn with_stop_error(self, err: ControlError) -> Self {
        self.inner.lock().unwrap().stop_error = Some(err);
        self
    }

    pub fn describes(&self) -> usize {
        self.inner.lock().unwrap().describes
    }

    pub fn starts(&self) -> usize {
        self.inner.lock().unwrap().starts
    }

    pub fn stops(&self) -> usize {
        self.inner.lock().unwrap().stops
    }

    pub fn state(&self) -> ResourceState {
        self.inner.lock().unwrap().resource.state
    }
}

impl FakeBackend {
    fn next_describe(inner: &mut Inner) -> ControlResult<ManagedResource> {
        let failing = match inner.describe_ok_budget {
            Some(0) => true,
            Some(ref mut left) => {
                *left -= 1;
                false
            }
            None => inner.describe_error.is_some(),
        };
        if failing {
            if let Some(err) = &inner.describe_error {
                return Err(err.clone());
            }
        }

        if inner.started {
            if let Some(next) = inner.after_start.pop_front() {
                inner.resource.state = next;
                if next == ResourceState::Running {
                    inner.resource.public_ip = inner.address_on_running.clone();
                }
            }
        }
        Ok(inner.resource.clone())
    }
}

#[async_trait]
impl ResourceBackend for FakeBackend {
    async fn describe(&self, _instance_id: &str) -> ControlResult<ManagedResource> {
        let (result, yield_now) = {
            let mut inner = self.inner.lock().unwrap();
            inner.describes += 1;
            (Self::next_describe(&mut inner), inner.yield_on_describe)
        };
        if yield_now {
            tokio::task::yield_now().await;
        }
        result
    }

    async fn start(&self, _instance_id: &str) -> ControlResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.starts += 1;
        if let Some(err) = &inner.start_error {
            return Err(err.clone());
        }
        inner.started = true;
        inner.resource.state = ResourceState::Pending;
        Ok(())
    }

    async fn stop(&self, _instance_id: &str) -> ControlResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.stops += 1;
        if let Some(err) = &inner.stop_error {
            return Err(err.clone());
        }
        inner.resource.state = ResourceState::Stopping;
        Ok(())
    }
}

/// Oracle with a fixed health answer and optional listing
pub struct FakeOracle {
    healthy: bool,
    nodes: Option<Vec<NodeEntry>>,
    health_calls: AtomicUsize,
}

impl FakeOracle {
    pub fn unreachable() -> Self {
        Self::new(false, None)
    }

    pub fn opaque() -> Self {
        Self::new(true, None)
    }

    pub fn with_nodes(nodes: Vec<NodeEntry>) -> Self {
        Self::new(true, Some(nodes))
    }

    fn new(healthy: bool, nodes: Option<Vec<NodeEntry>>) -> Self {
        Self {
            healthy,
            nodes,
            health_calls: AtomicUsize::new(0),
        }
    }

    pub fn health_calls(&self) -> usize {
        self.health_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActivityOracle for FakeOracle {
    async fn health(&self) -> bool {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        self.healthy
    }

    async fn list_nodes(&self) -> Option<Vec<NodeEntry>> {
        self.nodes.clone()
    }
}

/// Sink that records every publish, optionally failing each one
#[derive(Default)]
pub struct RecordingSink {
    fail: bool,
    calls: Mutex<Vec<(String, Vec<Metric>)>>,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, Vec<Metric>)> {
        self.calls.lock().unwrap().clone()
    }

    /// `(ActiveConnections, InstanceState)` of each publish
    pub fn values(&self) -> Vec<(f64, f64)> {
        self.calls()
            .iter()
            .map(|(_, metrics)| {
                let get = |name: &str| {
                    metrics
                        .iter()
                        .find(|m| m.metric_name == name)
                        .map(|m| m.value)
                        .unwrap()
                };
                (get("ActiveConnections"), get("InstanceState"))
            })
            .collect()
    }
}

#[async_trait]
impl MetricsSink for RecordingSink {
    async fn put_metrics(&self, namespace: &str, metrics: &[Metric]) -> ControlResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push((namespace.to_string(), metrics.to_vec()));
        if self.fail {
            return Err(ControlError::Provider {
                code: "Throttling".to_string(),
                message: "Rate exceeded".to_string(),
            });
        }
        Ok(())
    }
}
