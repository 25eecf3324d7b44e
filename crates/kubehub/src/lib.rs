//! Fleetmon kubehub – Hive record listing against a live cluster

#![forbid(unsafe_code)]

use anyhow::Result;
use fleetmon_core::{
    sort_by_identity, ClusterDeploymentView, ClusterSyncView, EntityKind, FleetSource, SourceError,
};
use kube::{
    api::{Api, ListParams},
    core::{ApiResource, DynamicObject, GroupVersionKind},
    Client,
};
use tracing::{debug, warn};

pub mod decode;

pub use decode::{cluster_deployment_from, cluster_sync_from, decode_object, Decoded};

pub const CLUSTER_DEPLOYMENT_KIND: &str = "ClusterDeployment";
pub const CLUSTER_SYNC_KIND: &str = "ClusterSync";
pub const CLUSTER_TYPE_LABEL: &str = "hive.openshift.io/cluster-type";
pub const CLUSTER_PLATFORM_LABEL: &str = "hive.openshift.io/cluster-platform";

pub fn cluster_deployment_gvk() -> GroupVersionKind {
    GroupVersionKind::gvk("hive.openshift.io", "v1", CLUSTER_DEPLOYMENT_KIND)
}

pub fn cluster_sync_gvk() -> GroupVersionKind {
    GroupVersionKind::gvk("hiveinternal.openshift.io", "v1alpha1", CLUSTER_SYNC_KIND)
}

/// Lists Hive records through the kube API on every call; nothing is cached.
#[derive(Clone)]
pub struct KubeFleetSource {
    client: Client,
    namespace: Option<String>,
}

impl KubeFleetSource {
    pub fn new(client: Client, namespace: Option<String>) -> Self {
        Self { client, namespace }
    }

    /// Build from the default kubeconfig / in-cluster environment.
    pub async fn try_default(namespace: Option<String>) -> Result<Self> {
        let client = Client::try_default().await?;
        Ok(Self::new(client, namespace))
    }

    fn api(&self, gvk: &GroupVersionKind) -> Api<DynamicObject> {
        let ar = ApiResource::from_gvk(gvk);
        match self.namespace.as_deref() {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &ar),
            None => Api::all_with(self.client.clone(), &ar),
        }
    }

    async fn list_raw(&self, kind: EntityKind) -> Result<Vec<DynamicObject>, SourceError> {
        let gvk = match kind {
            EntityKind::ClusterDeployment => cluster_deployment_gvk(),
            EntityKind::ClusterSync => cluster_sync_gvk(),
        };
        let started = std::time::Instant::now();
        let list = self
            .api(&gvk)
            .list(&ListParams::default())
            .await
            .map_err(|e| SourceError::List { kind, message: e.to_string() })?;
        metrics::histogram!("fleet_list_ms", started.elapsed().as_secs_f64() * 1000.0, "kind" => kind.to_string());
        debug!(%kind, count = list.items.len(), ns = ?self.namespace, "listed");
        Ok(list.items)
    }
}

/// Decode a batch, skipping (and logging) objects that cannot be decoded.
fn decode_all<T>(objs: &[DynamicObject], f: impl Fn(&DynamicObject) -> Result<T>) -> Vec<T> {
    objs.iter()
        .filter_map(|o| match f(o) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(error = %e, name = ?o.metadata.name, "skipping undecodable object");
                None
            }
        })
        .collect()
}

#[async_trait::async_trait]
impl FleetSource for KubeFleetSource {
    async fn list_cluster_deployments(&self) -> Result<Vec<ClusterDeploymentView>, SourceError> {
        let raw = self.list_raw(EntityKind::ClusterDeployment).await?;
        let mut out = decode_all(&raw, cluster_deployment_from);
        sort_by_identity(&mut out, |c| (c.namespace.as_str(), c.name.as_str()));
        Ok(out)
    }

    async fn list_cluster_syncs(&self) -> Result<Vec<ClusterSyncView>, SourceError> {
        let raw = self.list_raw(EntityKind::ClusterSync).await?;
        let mut out = decode_all(&raw, cluster_sync_from);
        sort_by_identity(&mut out, |c| (c.namespace.as_str(), c.name.as_str()));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resources_pluralize_as_hive_serves_them() {
        let cd = ApiResource::from_gvk(&cluster_deployment_gvk());
        assert_eq!(cd.plural, "clusterdeployments");
        assert_eq!(cd.api_version, "hive.openshift.io/v1");
        let cs = ApiResource::from_gvk(&cluster_sync_gvk());
        assert_eq!(cs.plural, "clustersyncs");
        assert_eq!(cs.api_version, "hiveinternal.openshift.io/v1alpha1");
    }

    #[test]
    fn decode_all_skips_nameless_objects() {
        let objs: Vec<DynamicObject> = serde_yaml::from_str(
            r#"
- apiVersion: hive.openshift.io/v1
  kind: ClusterDeployment
  metadata: { name: keep, namespace: ns }
- apiVersion: hive.openshift.io/v1
  kind: ClusterDeployment
  metadata: { namespace: ns }
"#,
        )
        .unwrap();
        let out = decode_all(&objs, cluster_deployment_from);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "keep");
    }
}
