//! Decoding of Hive objects (as `DynamicObject`) into fleet views.
//!
//! Missing optional fields never fail decoding; they resolve to the view's
//! defaults. Only a missing `metadata.name` is an error.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use fleetmon_core::{ClusterDeploymentView, ClusterSyncView, Condition, ConditionStatus, Conditions};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::core::DynamicObject;
use serde::Deserialize;
use tracing::debug;

use crate::{CLUSTER_DEPLOYMENT_KIND, CLUSTER_PLATFORM_LABEL, CLUSTER_SYNC_KIND, CLUSTER_TYPE_LABEL};

/// A decoded record of either supported kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    ClusterDeployment(ClusterDeploymentView),
    ClusterSync(ClusterSyncView),
}

/// Condition fields kept as raw JSON so one malformed field only defaults
/// that field instead of dropping the condition.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCondition {
    #[serde(rename = "type")]
    kind: Option<serde_json::Value>,
    status: Option<serde_json::Value>,
    reason: Option<serde_json::Value>,
    #[serde(rename = "lastTransitionTime")]
    last_transition_time: Option<serde_json::Value>,
}

fn time_of(t: &Option<Time>) -> Option<DateTime<Utc>> {
    t.as_ref().map(|t| t.0)
}

fn str_of(v: &Option<serde_json::Value>) -> &str {
    v.as_ref().and_then(|v| v.as_str()).unwrap_or("")
}

/// Kube `Time`, or `None` when absent or unparseable.
fn lenient_time(v: Option<serde_json::Value>) -> Option<DateTime<Utc>> {
    let raw = v?;
    match serde_json::from_value::<Time>(raw.clone()) {
        Ok(t) => Some(t.0),
        Err(e) => {
            debug!(error = %e, value = %raw, "ignoring unparseable lastTransitionTime");
            None
        }
    }
}

fn parse_ts(v: Option<&serde_json::Value>) -> Option<DateTime<Utc>> {
    v.and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn conditions_of(obj: &DynamicObject) -> Conditions {
    let mut out = Conditions::new();
    let Some(items) = obj.data.pointer("/status/conditions").and_then(|v| v.as_array()) else {
        return out;
    };
    for item in items {
        let raw: RawCondition = match serde_json::from_value(item.clone()) {
            Ok(c) => c,
            Err(e) => {
                debug!(error = %e, "skipping undecodable condition");
                continue;
            }
        };
        let kind = str_of(&raw.kind);
        if kind.is_empty() || out.iter().any(|c| c.kind == kind) {
            continue;
        }
        out.push(Condition {
            kind: kind.to_string(),
            status: ConditionStatus::parse(str_of(&raw.status)),
            reason: str_of(&raw.reason).to_string(),
            last_transition: lenient_time(raw.last_transition_time),
        });
    }
    out
}

fn identity(obj: &DynamicObject) -> Result<(String, String)> {
    let name = obj
        .metadata
        .name
        .clone()
        .ok_or_else(|| anyhow!("object missing metadata.name"))?;
    Ok((obj.metadata.namespace.clone().unwrap_or_default(), name))
}

fn label(obj: &DynamicObject, key: &str) -> Option<String> {
    obj.metadata.labels.as_ref().and_then(|l| l.get(key)).cloned()
}

pub fn cluster_deployment_from(obj: &DynamicObject) -> Result<ClusterDeploymentView> {
    let (namespace, name) = identity(obj)?;
    let meta = &obj.metadata;
    let install_restarts = obj
        .data
        .pointer("/status/installRestarts")
        .and_then(|v| v.as_u64())
        .map(|n| n.min(u32::MAX as u64) as u32)
        .unwrap_or(0);
    Ok(ClusterDeploymentView {
        namespace,
        name,
        cluster_type: label(obj, CLUSTER_TYPE_LABEL),
        platform: label(obj, CLUSTER_PLATFORM_LABEL),
        created: time_of(&meta.creation_timestamp),
        deleted: time_of(&meta.deletion_timestamp),
        finalizers: meta.finalizers.iter().flatten().cloned().collect(),
        installed: parse_ts(obj.data.pointer("/status/installedTimestamp")),
        image_set: obj
            .data
            .pointer("/spec/provisioning/imageSetRef/name")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        install_restarts,
        conditions: conditions_of(obj),
    })
}

pub fn cluster_sync_from(obj: &DynamicObject) -> Result<ClusterSyncView> {
    let (namespace, name) = identity(obj)?;
    Ok(ClusterSyncView { namespace, name, conditions: conditions_of(obj) })
}

/// Decode by `kind`; other kinds yield `None`.
pub fn decode_object(obj: &DynamicObject) -> Result<Option<Decoded>> {
    let kind = obj.types.as_ref().map(|t| t.kind.as_str()).unwrap_or("");
    match kind {
        CLUSTER_DEPLOYMENT_KIND => cluster_deployment_from(obj).map(|v| Some(Decoded::ClusterDeployment(v))),
        CLUSTER_SYNC_KIND => cluster_sync_from(obj).map(|v| Some(Decoded::ClusterSync(v))),
        _ => Ok(None),
    }
}
