//! Fleetmon collectors: gauge signals for deployments stuck provisioning or
//! deprovisioning and for cluster syncs that keep failing.
//!
//! Each collector lists a fresh snapshot per call, keeps no state between
//! calls, and streams its samples into a [`MetricSink`] in snapshot order.

#![forbid(unsafe_code)]

pub mod clustersync;
pub mod config;
pub mod deprovisioning;
pub mod exposition;
pub mod protocol;
pub mod provisioning;
pub mod resolver;
pub mod set;

pub use clustersync::{ClusterSyncFailingSeconds, CLUSTERSYNC_FAILING_SECONDS};
pub use config::{ConfigError, Thresholds};
pub use deprovisioning::{DeprovisionUnderwaySeconds, DEPROVISION_UNDERWAY_SECONDS};
pub use protocol::{CollectError, Collector, Desc, MetricSink, Sample};
pub use provisioning::{
    ProvisionUnderwayInstallRestarts, ProvisionUnderwaySeconds, PROVISION_UNDERWAY_INSTALL_RESTARTS,
    PROVISION_UNDERWAY_SECONDS,
};
pub use resolver::{Polarity, Resolution, Signal, SignalRule, SignalTable, Suppression};
pub use set::{CollectReport, CollectorSet, Scrape, DEFAULT_SINK_CAP};
