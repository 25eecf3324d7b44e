//! Fleetmon core types: record views, the snapshot source seam and the clock.

#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod model;

pub use model::{
    condition_types, ClusterDeploymentView, ClusterSyncView, Condition, ConditionStatus, Conditions,
};

pub mod prelude {
    pub use super::{
        age_secs, condition_types, Clock, ClusterDeploymentView, ClusterSyncView, Condition,
        ConditionStatus, EntityKind, FixedClock, FleetSource, SourceError, SystemClock,
    };
}

/// Kinds of fleet records a source can list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    ClusterDeployment,
    ClusterSync,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ClusterDeployment => f.write_str("ClusterDeployment"),
            Self::ClusterSync => f.write_str("ClusterSync"),
        }
    }
}

/// Snapshot fetch failures. Not recoverable inside a collector.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum SourceError {
    #[error("list {kind}: {message}")]
    List { kind: EntityKind, message: String },
    #[error("source unavailable: {0}")]
    Unavailable(String),
}

/// Read-only listing of fleet records.
///
/// Implementations return only currently-existing records, sorted by
/// namespace then name, and must return the whole listing or an error.
#[async_trait::async_trait]
pub trait FleetSource: Send + Sync {
    async fn list_cluster_deployments(&self) -> Result<Vec<ClusterDeploymentView>, SourceError>;

    async fn list_cluster_syncs(&self) -> Result<Vec<ClusterSyncView>, SourceError>;
}

#[async_trait::async_trait]
impl<T: FleetSource + ?Sized> FleetSource for std::sync::Arc<T> {
    async fn list_cluster_deployments(&self) -> Result<Vec<ClusterDeploymentView>, SourceError> {
        (**self).list_cluster_deployments().await
    }

    async fn list_cluster_syncs(&self) -> Result<Vec<ClusterSyncView>, SourceError> {
        (**self).list_cluster_syncs().await
    }
}

/// Sort key shared by every source.
pub fn sort_by_identity<T>(items: &mut [T], key: impl Fn(&T) -> (&str, &str)) {
    items.sort_by(|a, b| key(a).cmp(&key(b)));
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant (tests, offline evaluation).
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Seconds elapsed between `since` and `now`, clamped at zero for clock skew.
pub fn age_secs(now: DateTime<Utc>, since: Option<DateTime<Utc>>) -> f64 {
    match since {
        Some(ts) => (now - ts).num_milliseconds().max(0) as f64 / 1000.0,
        None => 0.0,
    }
}
