use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fleetmon_core::{age_secs, Clock, ClusterDeploymentView, FleetSource, SystemClock};

use crate::protocol::{fetch_and_emit, CollectError, Collector, Desc, MetricSink, Sample};

pub const DEPROVISION_UNDERWAY_SECONDS: Desc = Desc {
    name: "hive_cluster_deployment_deprovision_underway_seconds",
    help: "Length of time a cluster has been deprovisioning.",
    labels: &["cluster_deployment", "namespace", "cluster_type"],
};

/// Deployments marked for deletion that finalizers still hold, aged from the
/// deletion timestamp. Conditions are not consulted.
pub struct DeprovisionUnderwaySeconds {
    source: Arc<dyn FleetSource>,
    clock: Arc<dyn Clock>,
    min: Duration,
}

impl DeprovisionUnderwaySeconds {
    pub const NAME: &'static str = "deprovision_underway_seconds";

    pub fn new(source: Arc<dyn FleetSource>, min: Duration) -> Self {
        Self { source, clock: Arc::new(SystemClock), min }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn samples(&self, deployments: &[ClusterDeploymentView], now: DateTime<Utc>) -> Vec<Sample> {
        let min = self.min.as_secs_f64();
        deployments
            .iter()
            .filter(|cd| cd.is_finalizing())
            .filter_map(|cd| {
                let age = age_secs(now, cd.deleted);
                (age >= min).then(|| {
                    Sample::new(
                        &DEPROVISION_UNDERWAY_SECONDS,
                        [cd.name.as_str(), cd.namespace.as_str(), cd.cluster_type_label()],
                        age,
                    )
                })
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl Collector for DeprovisionUnderwaySeconds {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn describe(&self) -> &'static [Desc] {
        &[DEPROVISION_UNDERWAY_SECONDS]
    }

    async fn collect(&self, sink: MetricSink) -> Result<usize, CollectError> {
        fetch_and_emit(Self::NAME, sink, self.source.list_cluster_deployments(), |deployments| {
            self.samples(deployments, self.clock.now())
        })
        .await
    }
}
