#![forbid(unsafe_code)]

mod common;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use common::*;
use fleetmon_collectors::{ClusterSyncFailingSeconds, Collector, CLUSTERSYNC_FAILING_SECONDS};
use fleetmon_core::{ClusterSyncView, Condition, ConditionStatus};
use fleetmon_store::MemoryFleet;

fn syncs(items: Vec<ClusterSyncView>) -> Arc<MemoryFleet> {
    let f = Arc::new(MemoryFleet::new());
    for s in items {
        f.upsert_sync(s);
    }
    f
}

fn collector(source: Arc<MemoryFleet>, min: StdDuration) -> ClusterSyncFailingSeconds {
    ClusterSyncFailingSeconds::new(source, min).with_clock(clock())
}

#[tokio::test]
async fn failing_for_two_hours_is_reported() {
    let source = syncs(vec![failing_since("ns1", "cs1", now() - Duration::hours(2))]);
    let got = run(&collector(source.clone(), StdDuration::ZERO)).await;
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].name, "hive_clustersync_failing_seconds");
    assert_eq!(got[0].label("namespaced_name"), Some("ns1/cs1"));
    assert_eq!(got[0].value, 7200.0);

    assert!(run(&collector(source, StdDuration::from_secs(3 * 3600))).await.is_empty());
}

#[tokio::test]
async fn not_failing_is_ignored() {
    let mut ok = ClusterSyncView::new("ns1", "ok");
    ok.set_condition(Condition::new("Failed", ConditionStatus::False, "Success").since(now() - Duration::days(1)));
    let mut unknown = ClusterSyncView::new("ns1", "unknown");
    unknown.set_condition(Condition::new("Failed", ConditionStatus::Unknown, "").since(now() - Duration::days(1)));
    let bare = ClusterSyncView::new("ns2", "bare");

    let got = run(&collector(syncs(vec![ok, unknown, bare]), StdDuration::ZERO)).await;
    assert!(got.is_empty());
}

#[tokio::test]
async fn empty_fleet_reports_nothing() {
    assert!(run(&collector(syncs(vec![]), StdDuration::ZERO)).await.is_empty());
}

#[tokio::test]
async fn missing_transition_time_ages_zero() {
    let mut cs = ClusterSyncView::new("ns1", "fresh");
    cs.set_condition(Condition::new("Failed", ConditionStatus::True, "Failure"));
    let source = syncs(vec![cs]);

    let got = run(&collector(source.clone(), StdDuration::ZERO)).await;
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].value, 0.0);
    assert!(run(&collector(source, StdDuration::from_secs(1))).await.is_empty());
}

#[tokio::test]
async fn future_transition_is_clamped() {
    let source = syncs(vec![failing_since("ns1", "skewed", now() + Duration::minutes(5))]);
    let got = run(&collector(source, StdDuration::ZERO)).await;
    assert_eq!(got[0].value, 0.0);
}

#[tokio::test]
async fn samples_follow_namespaced_name_order() {
    let at = now() - Duration::hours(1);
    let source = syncs(vec![failing_since("b", "x", at), failing_since("a", "z", at), failing_since("a", "y", at)]);
    let got: Vec<String> = run(&collector(source, StdDuration::ZERO))
        .await
        .iter()
        .filter_map(|s| s.label("namespaced_name").map(str::to_string))
        .collect();
    assert_eq!(got, vec!["a/y", "a/z", "b/x"]);
}

#[tokio::test]
async fn fetch_failure_is_reported() {
    let c = ClusterSyncFailingSeconds::new(Arc::new(FailingSource), StdDuration::ZERO);
    let (sink, mut rx) = fleetmon_collectors::MetricSink::channel(1);
    assert!(c.collect(sink).await.is_err());
    assert!(rx.recv().await.is_none());
}

#[test]
fn describe_is_fixed() {
    let c = ClusterSyncFailingSeconds::new(Arc::new(FailingSource), StdDuration::ZERO);
    assert_eq!(c.describe(), &[CLUSTERSYNC_FAILING_SECONDS]);
    assert_eq!(c.describe()[0].labels, &["namespaced_name"]);
}
