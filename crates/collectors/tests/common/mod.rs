#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use fleetmon_collectors::{Collector, MetricSink, Sample};
use fleetmon_core::{
    ClusterDeploymentView, ClusterSyncView, Condition, ConditionStatus, EntityKind, FixedClock, FleetSource,
    SourceError,
};
use fleetmon_store::MemoryFleet;

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

pub fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock(now()))
}

/// Deployment named like its namespace, created two hours ago.
pub fn cd(name: &str) -> ClusterDeploymentView {
    let mut cd = ClusterDeploymentView::new(name, name);
    cd.created = Some(now() - Duration::hours(2));
    cd
}

pub fn installed(mut cd: ClusterDeploymentView) -> ClusterDeploymentView {
    cd.installed = Some(now() - Duration::minutes(90));
    cd
}

pub fn deleted(mut cd: ClusterDeploymentView) -> ClusterDeploymentView {
    cd.deleted = Some(now() - Duration::minutes(10));
    cd.finalizers.push("test-finalizer".into());
    cd
}

pub fn created_ago(mut cd: ClusterDeploymentView, ago: Duration) -> ClusterDeploymentView {
    cd.created = Some(now() - ago);
    cd
}

pub fn restarts(mut cd: ClusterDeploymentView, n: u32) -> ClusterDeploymentView {
    cd.install_restarts = n;
    cd
}

pub fn with_cond(mut cd: ClusterDeploymentView, kind: &str, status: ConditionStatus, reason: &str) -> ClusterDeploymentView {
    cd.set_condition(Condition::new(kind, status, reason));
    cd
}

pub fn failing_since(ns: &str, name: &str, at: DateTime<Utc>) -> ClusterSyncView {
    let mut cs = ClusterSyncView::new(ns, name);
    cs.set_condition(Condition::new("Failed", ConditionStatus::True, "Failure").since(at));
    cs
}

pub fn fleet(deployments: Vec<ClusterDeploymentView>) -> Arc<MemoryFleet> {
    let f = Arc::new(MemoryFleet::new());
    for d in deployments {
        f.upsert_deployment(d);
    }
    f
}

/// Run one Collect with a concurrent drain, like an exporter would.
pub async fn run(c: &dyn Collector) -> Vec<Sample> {
    let (sink, mut rx) = MetricSink::channel(1);
    let drain = async {
        let mut got = Vec::new();
        while let Some(s) = rx.recv().await {
            got.push(s);
        }
        got
    };
    let (res, got) = tokio::join!(c.collect(sink), drain);
    let n = res.expect("collect failed");
    assert_eq!(n, got.len());
    got
}

/// Labels sorted by name, `k = v` joined by spaces.
pub fn pretty(s: &Sample) -> String {
    let mut labels: Vec<_> = s.labels.iter().collect();
    labels.sort_by(|a, b| a.0.cmp(&b.0));
    labels.iter().map(|(k, v)| format!("{} = {}", k, v)).collect::<Vec<_>>().join(" ")
}

pub fn pretty_with_value(s: &Sample) -> String {
    format!("{} {}", pretty(s), s.value)
}

/// Source whose listings always fail.
pub struct FailingSource;

#[async_trait::async_trait]
impl FleetSource for FailingSource {
    async fn list_cluster_deployments(&self) -> Result<Vec<ClusterDeploymentView>, SourceError> {
        Err(SourceError::List { kind: EntityKind::ClusterDeployment, message: "connection refused".into() })
    }

    async fn list_cluster_syncs(&self) -> Result<Vec<ClusterSyncView>, SourceError> {
        Err(SourceError::List { kind: EntityKind::ClusterSync, message: "connection refused".into() })
    }
}
