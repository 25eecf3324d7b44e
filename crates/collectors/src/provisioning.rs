//! Stuck-provisioning collectors: one gated on age, one on install restarts.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fleetmon_core::{age_secs, Clock, ClusterDeploymentView, FleetSource, SystemClock};
use tracing::debug;

use crate::protocol::{fetch_and_emit, CollectError, Collector, Desc, MetricSink, Sample};
use crate::resolver::{Resolution, Signal, SignalTable};

pub const PROVISION_LABELS: &[&str] = &[
    "cluster_deployment",
    "namespace",
    "cluster_type",
    "platform",
    "image_set",
    "condition",
    "reason",
];

pub const PROVISION_UNDERWAY_SECONDS: Desc = Desc {
    name: "hive_cluster_deployment_provision_underway_seconds",
    help: "Length of time a cluster has been provisioning.",
    labels: PROVISION_LABELS,
};

pub const PROVISION_UNDERWAY_INSTALL_RESTARTS: Desc = Desc {
    name: "hive_cluster_deployment_provision_underway_install_restarts",
    help: "Number of install restarts for a cluster that is still provisioning.",
    labels: PROVISION_LABELS,
};

/// Deployments still provisioning and not suppressed by their conditions.
fn provisioning<'a>(
    deployments: &'a [ClusterDeploymentView],
    table: &'a SignalTable,
) -> impl Iterator<Item = (&'a ClusterDeploymentView, Signal<'a>)> + 'a {
    deployments
        .iter()
        .filter(|cd| !cd.is_installed() && !cd.is_deleting())
        .filter_map(move |cd| match table.resolve(&cd.conditions) {
            Resolution::Signal(sig) => Some((cd, sig)),
            Resolution::Suppressed(why) => {
                debug!(ns = %cd.namespace, name = %cd.name, ?why, "provisioning signal suppressed");
                None
            }
        })
}

fn provision_sample(desc: &Desc, cd: &ClusterDeploymentView, sig: Signal<'_>, value: f64) -> Sample {
    Sample::new(
        desc,
        [
            cd.name.as_str(),
            cd.namespace.as_str(),
            cd.cluster_type_label(),
            cd.platform_label(),
            cd.image_set_label(),
            sig.condition,
            sig.reason,
        ],
        value,
    )
}

/// Age-gated: value is seconds since creation.
pub struct ProvisionUnderwaySeconds {
    source: Arc<dyn FleetSource>,
    clock: Arc<dyn Clock>,
    table: SignalTable,
    min: Duration,
}

impl ProvisionUnderwaySeconds {
    pub const NAME: &'static str = "provision_underway_seconds";

    pub fn new(source: Arc<dyn FleetSource>, min: Duration) -> Self {
        Self { source, clock: Arc::new(SystemClock), table: SignalTable::default(), min }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_signal_table(mut self, table: SignalTable) -> Self {
        self.table = table;
        self
    }

    pub fn samples(&self, deployments: &[ClusterDeploymentView], now: DateTime<Utc>) -> Vec<Sample> {
        let min = self.min.as_secs_f64();
        provisioning(deployments, &self.table)
            .filter_map(|(cd, sig)| {
                let age = age_secs(now, cd.created);
                (age >= min).then(|| provision_sample(&PROVISION_UNDERWAY_SECONDS, cd, sig, age))
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl Collector for ProvisionUnderwaySeconds {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn describe(&self) -> &'static [Desc] {
        &[PROVISION_UNDERWAY_SECONDS]
    }

    async fn collect(&self, sink: MetricSink) -> Result<usize, CollectError> {
        fetch_and_emit(Self::NAME, sink, self.source.list_cluster_deployments(), |deployments| {
            self.samples(deployments, self.clock.now())
        })
        .await
    }
}

/// Restart-gated: value is the install restart count.
///
/// Deployments that never restarted are not reported, even with a zero minimum.
pub struct ProvisionUnderwayInstallRestarts {
    source: Arc<dyn FleetSource>,
    table: SignalTable,
    min: u32,
}

impl ProvisionUnderwayInstallRestarts {
    pub const NAME: &'static str = "provision_underway_install_restarts";

    pub fn new(source: Arc<dyn FleetSource>, min: u32) -> Self {
        Self { source, table: SignalTable::default(), min }
    }

    pub fn with_signal_table(mut self, table: SignalTable) -> Self {
        self.table = table;
        self
    }

    pub fn samples(&self, deployments: &[ClusterDeploymentView]) -> Vec<Sample> {
        provisioning(deployments, &self.table)
            .filter(|(cd, _)| cd.install_restarts > 0 && cd.install_restarts >= self.min)
            .map(|(cd, sig)| {
                provision_sample(&PROVISION_UNDERWAY_INSTALL_RESTARTS, cd, sig, f64::from(cd.install_restarts))
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl Collector for ProvisionUnderwayInstallRestarts {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn describe(&self) -> &'static [Desc] {
        &[PROVISION_UNDERWAY_INSTALL_RESTARTS]
    }

    async fn collect(&self, sink: MetricSink) -> Result<usize, CollectError> {
        fetch_and_emit(Self::NAME, sink, self.source.list_cluster_deployments(), |deployments| {
            self.samples(deployments)
        })
        .await
    }
}
