//! Explicit composition of collectors built at startup.

use std::sync::Arc;

use fleetmon_core::{Clock, FleetSource, SystemClock};
use futures::future::join_all;
use tracing::info;

use crate::clustersync::ClusterSyncFailingSeconds;
use crate::config::{ConfigError, Thresholds};
use crate::deprovisioning::DeprovisionUnderwaySeconds;
use crate::protocol::{CollectError, Collector, Desc, MetricSink, Sample};
use crate::provisioning::{ProvisionUnderwayInstallRestarts, ProvisionUnderwaySeconds};

pub const DEFAULT_SINK_CAP: usize = 256;

/// Outcome of one collector within a scrape.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectReport {
    pub collector: &'static str,
    pub result: Result<usize, CollectError>,
}

#[derive(Debug, Default)]
pub struct Scrape {
    pub samples: Vec<Sample>,
    pub reports: Vec<CollectReport>,
}

impl Scrape {
    pub fn failures(&self) -> impl Iterator<Item = &CollectReport> {
        self.reports.iter().filter(|r| r.result.is_err())
    }

    pub fn is_complete(&self) -> bool {
        self.failures().next().is_none()
    }
}

#[derive(Clone, Default)]
pub struct CollectorSet {
    collectors: Vec<Arc<dyn Collector>>,
}

impl CollectorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, collector: impl Collector + 'static) -> Self {
        self.collectors.push(Arc::new(collector));
        self
    }

    /// The four fleet collectors over one source and clock.
    pub fn from_thresholds(
        source: Arc<dyn FleetSource>,
        clock: Arc<dyn Clock>,
        t: &Thresholds,
    ) -> Result<Self, ConfigError> {
        let table = t.signal_table()?;
        Ok(Self::new()
            .with(
                ProvisionUnderwaySeconds::new(source.clone(), t.provision_underway_min())
                    .with_clock(clock.clone())
                    .with_signal_table(table.clone()),
            )
            .with(
                ProvisionUnderwayInstallRestarts::new(source.clone(), t.provision_restarts_min)
                    .with_signal_table(table),
            )
            .with(DeprovisionUnderwaySeconds::new(source.clone(), t.deprovision_underway_min()).with_clock(clock.clone()))
            .with(ClusterSyncFailingSeconds::new(source, t.clustersync_failing_min()).with_clock(clock)))
    }

    /// Same as [`from_thresholds`](Self::from_thresholds) with the system clock.
    pub fn standard(source: Arc<dyn FleetSource>, t: &Thresholds) -> Result<Self, ConfigError> {
        Self::from_thresholds(source, Arc::new(SystemClock), t)
    }

    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.collectors.iter().map(|c| c.name()).collect()
    }

    pub fn describe_all(&self) -> Vec<Desc> {
        self.collectors.iter().flat_map(|c| c.describe().iter().copied()).collect()
    }

    /// One task per collector feeding a shared bounded sink; returns once the
    /// drain loop sees end-of-stream from every collector.
    pub async fn collect_all(&self, cap: usize) -> Scrape {
        let (sink, mut rx) = MetricSink::channel(cap);
        let handles: Vec<_> = self
            .collectors
            .iter()
            .map(|c| {
                let c = Arc::clone(c);
                let sink = sink.clone();
                tokio::spawn(async move { c.collect(sink).await })
            })
            .collect();
        sink.finish();

        let mut samples = Vec::new();
        while let Some(s) = rx.recv().await {
            samples.push(s);
        }

        let reports: Vec<CollectReport> = join_all(handles)
            .await
            .into_iter()
            .zip(self.collectors.iter())
            .map(|(joined, c)| CollectReport {
                collector: c.name(),
                result: joined.unwrap_or_else(|e| Err(CollectError::Aborted(e.to_string()))),
            })
            .collect();
        let failed = reports.iter().filter(|r| r.result.is_err()).count();
        info!(collectors = reports.len(), samples = samples.len(), failed, "scrape finished");
        Scrape { samples, reports }
    }
}
