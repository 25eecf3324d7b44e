use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fleetmon_core::{age_secs, condition_types, Clock, ClusterSyncView, ConditionStatus, FleetSource, SystemClock};

use crate::protocol::{fetch_and_emit, CollectError, Collector, Desc, MetricSink, Sample};

pub const CLUSTERSYNC_FAILING_SECONDS: Desc = Desc {
    name: "hive_clustersync_failing_seconds",
    help: "Length of time a clustersync has been failing.",
    labels: &["namespaced_name"],
};

/// Sync records whose `Failed` condition is True, aged from its last transition.
pub struct ClusterSyncFailingSeconds {
    source: Arc<dyn FleetSource>,
    clock: Arc<dyn Clock>,
    min: Duration,
}

impl ClusterSyncFailingSeconds {
    pub const NAME: &'static str = "clustersync_failing_seconds";

    pub fn new(source: Arc<dyn FleetSource>, min: Duration) -> Self {
        Self { source, clock: Arc::new(SystemClock), min }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn samples(&self, syncs: &[ClusterSyncView], now: DateTime<Utc>) -> Vec<Sample> {
        let min = self.min.as_secs_f64();
        syncs
            .iter()
            .filter_map(|cs| {
                let failed = cs.condition(condition_types::SYNC_FAILED)?;
                if failed.status != ConditionStatus::True {
                    return None;
                }
                let age = age_secs(now, failed.last_transition);
                (age >= min).then(|| Sample::new(&CLUSTERSYNC_FAILING_SECONDS, [cs.namespaced_name()], age))
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl Collector for ClusterSyncFailingSeconds {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn describe(&self) -> &'static [Desc] {
        &[CLUSTERSYNC_FAILING_SECONDS]
    }

    async fn collect(&self, sink: MetricSink) -> Result<usize, CollectError> {
        fetch_and_emit(Self::NAME, sink, self.source.list_cluster_syncs(), |syncs| {
            self.samples(syncs, self.clock.now())
        })
        .await
    }
}
