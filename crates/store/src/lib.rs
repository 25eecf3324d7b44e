//! Fleetmon store: in-RAM fleet held as an atomically swapped snapshot

#![forbid(unsafe_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use fleetmon_core::{ClusterDeploymentView, ClusterSyncView, FleetSource, SourceError};
use fleetmon_kubehub::{decode_object, Decoded};
use kube::core::DynamicObject;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Immutable fleet state; both lists sorted by namespace then name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetSnapshot {
    pub epoch: u64,
    pub deployments: Vec<ClusterDeploymentView>,
    pub syncs: Vec<ClusterSyncView>,
}

fn upsert_sorted<T: Clone>(items: &mut Vec<T>, item: T, key: impl Fn(&T) -> (&str, &str)) {
    match items.binary_search_by(|x| key(x).cmp(&key(&item))) {
        Ok(idx) => items[idx] = item,
        Err(idx) => items.insert(idx, item),
    }
}

fn position<T>(items: &[T], ns: &str, name: &str, key: impl Fn(&T) -> (&str, &str)) -> Option<usize> {
    items.binary_search_by(|x| key(x).cmp(&(ns, name))).ok()
}

fn cd_key(c: &ClusterDeploymentView) -> (&str, &str) {
    (c.namespace.as_str(), c.name.as_str())
}

fn cs_key(c: &ClusterSyncView) -> (&str, &str) {
    (c.namespace.as_str(), c.name.as_str())
}

/// Insert or replace, or drop the record once deletion has nothing left to wait on.
fn put_deployment(s: &mut FleetSnapshot, cd: ClusterDeploymentView) {
    if cd.is_deleting() && cd.finalizers.is_empty() {
        if let Some(idx) = position(&s.deployments, &cd.namespace, &cd.name, cd_key) {
            s.deployments.remove(idx);
        }
    } else {
        upsert_sorted(&mut s.deployments, cd, cd_key);
    }
}

/// In-memory fleet. Readers get whole snapshots; writers copy-on-write.
///
/// A deployment whose deletion timestamp is set and whose finalizers are all
/// cleared is dropped from the store, the way the API server removes it.
pub struct MemoryFleet {
    snap: ArcSwap<FleetSnapshot>,
}

impl Default for MemoryFleet {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFleet {
    pub fn new() -> Self {
        Self { snap: ArcSwap::from_pointee(FleetSnapshot::default()) }
    }

    pub fn current(&self) -> Arc<FleetSnapshot> {
        self.snap.load_full()
    }

    /// Copy-on-write step. `f` may run more than once under contention and
    /// must only touch the snapshot it is given; returning `false` leaves the
    /// current snapshot (and epoch) in place.
    fn mutate(&self, f: impl Fn(&mut FleetSnapshot) -> bool) -> bool {
        let mut changed = false;
        self.snap.rcu(|cur| {
            let mut next = FleetSnapshot::clone(cur);
            changed = f(&mut next);
            if !changed {
                return Arc::clone(cur);
            }
            next.epoch = cur.epoch.saturating_add(1);
            Arc::new(next)
        });
        let snap = self.snap.load();
        let items = snap.deployments.len() + snap.syncs.len();
        metrics::gauge!("fleet_snapshot_items", items as f64);
        changed
    }

    pub fn upsert_deployment(&self, cd: ClusterDeploymentView) {
        debug!(ns = %cd.namespace, name = %cd.name, "upsert cluster deployment");
        self.mutate(|s| {
            put_deployment(s, cd.clone());
            true
        });
    }

    pub fn upsert_sync(&self, cs: ClusterSyncView) {
        debug!(ns = %cs.namespace, name = %cs.name, "upsert cluster sync");
        self.mutate(|s| {
            upsert_sorted(&mut s.syncs, cs.clone(), cs_key);
            true
        });
    }

    /// Returns whether the record existed.
    pub fn remove_deployment(&self, ns: &str, name: &str) -> bool {
        self.mutate(|s| match position(&s.deployments, ns, name, cd_key) {
            Some(idx) => {
                s.deployments.remove(idx);
                true
            }
            None => false,
        })
    }

    pub fn remove_sync(&self, ns: &str, name: &str) -> bool {
        self.mutate(|s| match position(&s.syncs, ns, name, cs_key) {
            Some(idx) => {
                s.syncs.remove(idx);
                true
            }
            None => false,
        })
    }

    /// Apply `f` to an existing deployment. Returns whether it existed.
    ///
    /// `f` is re-applied if a concurrent writer wins the swap, so it should
    /// derive the new state from the record it is handed.
    pub fn update_deployment(&self, ns: &str, name: &str, f: impl Fn(&mut ClusterDeploymentView)) -> bool {
        self.mutate(|s| {
            let Some(idx) = position(&s.deployments, ns, name, cd_key) else {
                return false;
            };
            let mut cd = s.deployments.remove(idx);
            f(&mut cd);
            put_deployment(s, cd);
            true
        })
    }

    /// Clear finalizers on every deployment (mirrors controllers finishing cleanup).
    pub fn clear_finalizers(&self) {
        self.mutate(|s| {
            for cd in s.deployments.iter_mut() {
                cd.finalizers.clear();
            }
            s.deployments.retain(|cd| !cd.is_deleting());
            true
        });
    }

    /// Load decoded Hive objects; unsupported kinds are skipped.
    pub fn load_objects(&self, objs: &[DynamicObject]) -> Result<usize> {
        let mut loaded = 0usize;
        for obj in objs {
            match decode_object(obj)? {
                Some(Decoded::ClusterDeployment(cd)) => {
                    self.upsert_deployment(cd);
                    loaded += 1;
                }
                Some(Decoded::ClusterSync(cs)) => {
                    self.upsert_sync(cs);
                    loaded += 1;
                }
                None => {
                    warn!(kind = ?obj.types.as_ref().map(|t| t.kind.as_str()), "skipping unsupported object");
                }
            }
        }
        Ok(loaded)
    }

    /// Load a fixture: a YAML list, a `kind: List` document, or a multi-document stream.
    pub fn load_yaml(&self, text: &str) -> Result<usize> {
        let mut objs = Vec::new();
        for doc in serde_yaml::Deserializer::from_str(text) {
            let value = serde_yaml::Value::deserialize(doc).context("parsing fixture document")?;
            if value.is_null() {
                continue;
            }
            if let Some(seq) = value.as_sequence() {
                for v in seq {
                    objs.push(serde_yaml::from_value::<DynamicObject>(v.clone()).context("decoding fixture object")?);
                }
            } else if let Some(items) = value.get("items").and_then(|v| v.as_sequence()) {
                for v in items {
                    objs.push(serde_yaml::from_value::<DynamicObject>(v.clone()).context("decoding list item")?);
                }
            } else {
                objs.push(serde_yaml::from_value::<DynamicObject>(value).context("decoding fixture object")?);
            }
        }
        let n = self.load_objects(&objs)?;
        info!(objects = n, "fixture loaded");
        Ok(n)
    }
}

#[async_trait::async_trait]
impl FleetSource for MemoryFleet {
    async fn list_cluster_deployments(&self) -> Result<Vec<ClusterDeploymentView>, SourceError> {
        Ok(self.current().deployments.clone())
    }

    async fn list_cluster_syncs(&self) -> Result<Vec<ClusterSyncView>, SourceError> {
        Ok(self.current().syncs.clone())
    }
}
