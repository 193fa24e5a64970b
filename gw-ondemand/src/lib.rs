// On-demand VPN gateway lifecycle library
// Shared modules for the control API, the idle monitor and tests

#![warn(missing_docs)]

//! On-Demand VPN Gateway Lifecycle Library
//!
//! This library manages a single on-demand VPN gateway instance: it starts,
//! stops and reports on the instance through a small HTTP control API, and
//! runs a periodic idle monitor that stops the instance once no VPN client
//! is active.
//!
//! # Main Components
//!
//! - [`oracle`]: Activity oracle client (Headscale health and node activity)
//! - [`backend`]: Control-plane capability and instance state reader
//! - [`engine`]: Pure idle decision engine
//! - [`actuator`]: Start/stop commands with a bounded start wait
//! - [`router`]: Control API request routing and error mapping
//! - [`metrics`]: Metrics sink for monitor cycles
//! - [`aws`]: Shared AWS SDK config and error classification
//! - [`monitor`]: Idle monitor cycle tying the pieces together
//! - [`config`]: Configuration file and environment loading
//! - [`types`]: Shared data structures

pub mod actuator;
pub mod aws;
pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod monitor;
pub mod oracle;
pub mod router;
pub mod types;
