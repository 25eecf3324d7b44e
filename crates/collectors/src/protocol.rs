//! Describe/Collect contract shared by every collector.
//!
//! `describe` is static. `collect` fetches a snapshot, computes every sample up
//! front and only then streams them into a [`MetricSink`]; the sink is consumed
//! by the call, so end-of-stream is signalled even when a collector errors out.

use std::future::Future;
use std::time::Instant;

use fleetmon_core::SourceError;
use serde::Serialize;
use smallvec::SmallVec;
use tokio::sync::mpsc;
use tracing::debug;

/// Fixed descriptor of one gauge family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Desc {
    pub name: &'static str,
    pub help: &'static str,
    pub labels: &'static [&'static str],
}

/// One gauge record; labels follow the descriptor's order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub name: &'static str,
    pub labels: SmallVec<[(&'static str, String); 8]>,
    pub value: f64,
}

impl Sample {
    /// Pair `values` with the descriptor's label names.
    pub fn new<I, S>(desc: &Desc, values: I, value: f64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: SmallVec<[(&'static str, String); 8]> =
            desc.labels.iter().copied().zip(values.into_iter().map(Into::into)).collect();
        debug_assert_eq!(labels.len(), desc.labels.len(), "label arity mismatch for {}", desc.name);
        Self { name: desc.name, labels, value }
    }

    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.iter().find(|(k, _)| *k == name).map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CollectError {
    #[error("snapshot: {0}")]
    Source(#[from] SourceError),
    #[error("metric sink closed before collection finished")]
    SinkClosed,
    #[error("collector task aborted: {0}")]
    Aborted(String),
}

/// Producer half of a bounded, consumer-drained sample queue.
///
/// The consumer's drain loop ends once every clone has been finished or dropped.
#[derive(Debug, Clone)]
pub struct MetricSink {
    tx: mpsc::Sender<Sample>,
}

impl MetricSink {
    pub fn channel(cap: usize) -> (Self, mpsc::Receiver<Sample>) {
        let (tx, rx) = mpsc::channel(cap.max(1));
        (Self { tx }, rx)
    }

    /// Waits for queue capacity.
    pub async fn send(&self, sample: Sample) -> Result<(), CollectError> {
        self.tx.send(sample).await.map_err(|_| CollectError::SinkClosed)
    }

    /// Explicit end-of-stream for this producer.
    pub fn finish(self) {}
}

/// A pull-based gauge collector.
#[async_trait::async_trait]
pub trait Collector: Send + Sync {
    /// Short stable name used in logs and self-metrics.
    fn name(&self) -> &'static str;

    fn describe(&self) -> &'static [Desc];

    /// Stream the current samples and finish the sink. Returns the sample count.
    async fn collect(&self, sink: MetricSink) -> Result<usize, CollectError>;
}

/// Fetch one snapshot, compute every sample from it, then stream them.
///
/// A fetch failure is recorded and returned before anything is sent; the sink
/// is dropped either way, which ends this producer's stream.
pub(crate) async fn fetch_and_emit<T, F>(
    collector: &'static str,
    sink: MetricSink,
    fetch: F,
    compute: impl FnOnce(&[T]) -> Vec<Sample>,
) -> Result<usize, CollectError>
where
    F: Future<Output = Result<Vec<T>, SourceError>>,
{
    let started = Instant::now();
    let items = match fetch.await {
        Ok(items) => items,
        Err(e) => {
            let err = CollectError::from(e);
            record_failure(collector, &err);
            return Err(err);
        }
    };
    let samples = compute(&items);
    emit_all(collector, sink, samples, started).await
}

/// Stream precomputed samples in order, then finish.
async fn emit_all(
    collector: &'static str,
    sink: MetricSink,
    samples: Vec<Sample>,
    started: Instant,
) -> Result<usize, CollectError> {
    let n = samples.len();
    for s in samples {
        if let Err(e) = sink.send(s).await {
            record_failure(collector, &e);
            return Err(e);
        }
    }
    sink.finish();
    metrics::histogram!("fleet_collect_ms", started.elapsed().as_secs_f64() * 1000.0, "collector" => collector);
    metrics::gauge!("fleet_collect_samples", n as f64, "collector" => collector);
    debug!(collector, samples = n, "collect finished");
    Ok(n)
}

fn record_failure(collector: &'static str, err: &CollectError) {
    metrics::counter!("fleet_collect_errors_total", 1u64, "collector" => collector);
    tracing::warn!(collector, error = %err, "collect failed");
}
