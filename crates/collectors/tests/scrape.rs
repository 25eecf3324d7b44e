#![forbid(unsafe_code)]

mod common;

use std::sync::Arc;

use chrono::Duration;
use common::*;
use fleetmon_collectors::exposition::{render_json, render_text};
use fleetmon_collectors::{CollectError, CollectorSet, Thresholds, DEFAULT_SINK_CAP};
use fleetmon_core::ConditionStatus;
use fleetmon_store::MemoryFleet;

fn populated() -> Arc<MemoryFleet> {
    let f = fleet(vec![
        installed(cd("done")),
        with_cond(restarts(cd("quota"), 3), "ProvisionFailed", ConditionStatus::True, "FailedDueToQuotas"),
        deleted(installed(cd("leaving"))),
    ]);
    f.upsert_sync(failing_since("done", "done", now() - Duration::hours(2)));
    f
}

fn set(source: Arc<MemoryFleet>, t: &Thresholds) -> CollectorSet {
    CollectorSet::from_thresholds(source, clock(), t).expect("valid thresholds")
}

#[tokio::test]
async fn collects_every_family() {
    let scrape = set(populated(), &Thresholds::default()).collect_all(DEFAULT_SINK_CAP).await;
    assert!(scrape.is_complete());
    assert_eq!(scrape.reports.len(), 4);

    let mut names: Vec<&str> = scrape.samples.iter().map(|s| s.name).collect();
    names.sort_unstable();
    assert_eq!(
        names,
        vec![
            "hive_cluster_deployment_deprovision_underway_seconds",
            "hive_cluster_deployment_provision_underway_install_restarts",
            "hive_cluster_deployment_provision_underway_seconds",
            "hive_clustersync_failing_seconds",
        ]
    );
    let counted: usize = scrape.reports.iter().map(|r| r.result.clone().unwrap()).sum();
    assert_eq!(counted, scrape.samples.len());
}

#[tokio::test]
async fn tiny_sink_still_drains() {
    let scrape = set(populated(), &Thresholds::default()).collect_all(1).await;
    assert!(scrape.is_complete());
    assert_eq!(scrape.samples.len(), 4);
}

#[tokio::test]
async fn thresholds_gate_each_family() {
    let t = Thresholds {
        provision_underway_min_secs: 3 * 3600,
        provision_restarts_min: 5,
        deprovision_underway_min_secs: 0,
        clustersync_failing_min_secs: 3 * 3600,
        signal_order: Vec::new(),
    };
    let scrape = set(populated(), &t).collect_all(DEFAULT_SINK_CAP).await;
    let names: Vec<&str> = scrape.samples.iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["hive_cluster_deployment_deprovision_underway_seconds"]);
}

#[tokio::test]
async fn failing_source_is_reported_per_collector() {
    let set = CollectorSet::from_thresholds(Arc::new(FailingSource), clock(), &Thresholds::default()).unwrap();
    let scrape = set.collect_all(DEFAULT_SINK_CAP).await;
    assert!(scrape.samples.is_empty());
    assert!(!scrape.is_complete());
    assert_eq!(scrape.failures().count(), 4);
    for r in &scrape.reports {
        assert!(matches!(r.result, Err(CollectError::Source(_))), "{}: {:?}", r.collector, r.result);
    }
}

#[test]
fn describe_never_touches_the_source() {
    let set = CollectorSet::from_thresholds(Arc::new(FailingSource), clock(), &Thresholds::default()).unwrap();
    let descs = set.describe_all();
    assert_eq!(descs.len(), 4);
    assert_eq!(set.names(), vec![
        "provision_underway_seconds",
        "provision_underway_install_restarts",
        "deprovision_underway_seconds",
        "clustersync_failing_seconds",
    ]);
}

#[test]
fn unknown_signal_in_order_is_rejected() {
    let t = Thresholds { signal_order: vec!["Bogus".into()], ..Thresholds::default() };
    assert!(CollectorSet::from_thresholds(Arc::new(FailingSource), clock(), &t).is_err());
}

fn series<'a>(text: &'a str, family: &str, label: &str) -> Option<(&'a str, f64)> {
    text.lines()
        .filter(|l| l.starts_with(&format!("{family}{{")))
        .find(|l| l.contains(label))
        .and_then(|l| Some((l, l.rsplit(' ').next()?.parse().ok()?)))
}

#[tokio::test]
async fn rendered_text_is_stable_across_scrapes() {
    let set = set(populated(), &Thresholds::default());
    let descs = set.describe_all();

    // tasks interleave freely; the encoder orders families and series itself
    let first = set.collect_all(DEFAULT_SINK_CAP).await.samples;
    let second = set.collect_all(DEFAULT_SINK_CAP).await.samples;
    let text = render_text(&descs, &first).unwrap();
    assert_eq!(text, render_text(&descs, &second).unwrap());

    assert!(text.contains("# TYPE hive_clustersync_failing_seconds gauge\n"));
    let (_, v) = series(&text, "hive_clustersync_failing_seconds", "namespaced_name=\"done/done\"").unwrap();
    assert_eq!(v, 7200.0);

    let (line, v) =
        series(&text, "hive_cluster_deployment_provision_underway_install_restarts", "cluster_deployment=\"quota\"").unwrap();
    assert_eq!(v, 3.0);
    for label in ["condition=\"ProvisionFailed\"", "reason=\"FailedDueToQuotas\"", "image_set=\"none\"", "cluster_type=\"unspecified\""] {
        assert!(line.contains(label), "{label} missing from {line}");
    }

    let (_, v) =
        series(&text, "hive_cluster_deployment_deprovision_underway_seconds", "cluster_deployment=\"leaving\"").unwrap();
    assert_eq!(v, 600.0);

    let json = render_json(&first);
    assert_eq!(json.as_array().map(Vec::len), Some(4));
}
