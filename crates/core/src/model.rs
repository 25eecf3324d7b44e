//! Read-only projections of fleet records.
//!
//! The collectors never see raw API objects; sources decode into these views
//! and defaulting of optional labels happens here so every collector renders
//! the same values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Well-known condition types and reasons on fleet records.
pub mod condition_types {
    pub const PROVISION_FAILED: &str = "ProvisionFailed";
    pub const PROVISION_STOPPED: &str = "ProvisionStopped";
    pub const DNS_NOT_READY: &str = "DNSNotReady";
    pub const REQUIREMENTS_MET: &str = "RequirementsMet";
    pub const HIBERNATING: &str = "Hibernating";
    /// ClusterSync failure condition.
    pub const SYNC_FAILED: &str = "Failed";

    /// Reason set on `ProvisionFailed` while a deployment is still bootstrapping.
    pub const REASON_INITIALIZED: &str = "Initialized";
}

pub const DEFAULT_CLUSTER_TYPE: &str = "unspecified";
pub const DEFAULT_IMAGE_SET: &str = "none";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

impl ConditionStatus {
    /// Lenient parse; anything other than `True`/`False` is `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s {
            "True" => Self::True,
            "False" => Self::False,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::True => "True",
            Self::False => "False",
            Self::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub kind: String,
    pub status: ConditionStatus,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub last_transition: Option<DateTime<Utc>>,
}

impl Condition {
    pub fn new(kind: impl Into<String>, status: ConditionStatus, reason: impl Into<String>) -> Self {
        Self { kind: kind.into(), status, reason: reason.into(), last_transition: None }
    }

    pub fn since(mut self, at: DateTime<Utc>) -> Self {
        self.last_transition = Some(at);
        self
    }
}

/// Condition set; types are unique within one record.
pub type Conditions = SmallVec<[Condition; 4]>;

fn find<'a>(conditions: &'a Conditions, kind: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.kind == kind)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ClusterDeploymentView {
    pub namespace: String,
    pub name: String,
    pub cluster_type: Option<String>,
    pub platform: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub deleted: Option<DateTime<Utc>>,
    pub finalizers: SmallVec<[String; 2]>,
    pub installed: Option<DateTime<Utc>>,
    pub image_set: Option<String>,
    pub install_restarts: u32,
    pub conditions: Conditions,
}

impl ClusterDeploymentView {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), name: name.into(), ..Default::default() }
    }

    pub fn cluster_type_label(&self) -> &str {
        match self.cluster_type.as_deref() {
            Some(t) if !t.is_empty() => t,
            _ => DEFAULT_CLUSTER_TYPE,
        }
    }

    pub fn platform_label(&self) -> &str {
        self.platform.as_deref().unwrap_or("")
    }

    pub fn image_set_label(&self) -> &str {
        match self.image_set.as_deref() {
            Some(s) if !s.is_empty() => s,
            _ => DEFAULT_IMAGE_SET,
        }
    }

    pub fn is_installed(&self) -> bool {
        self.installed.is_some()
    }

    pub fn is_deleting(&self) -> bool {
        self.deleted.is_some()
    }

    /// Deletion requested but cleanup still holding the record.
    pub fn is_finalizing(&self) -> bool {
        self.deleted.is_some() && !self.finalizers.is_empty()
    }

    pub fn condition(&self, kind: &str) -> Option<&Condition> {
        find(&self.conditions, kind)
    }

    /// Insert or replace a condition, keeping types unique.
    pub fn set_condition(&mut self, cond: Condition) {
        match self.conditions.iter_mut().find(|c| c.kind == cond.kind) {
            Some(slot) => *slot = cond,
            None => self.conditions.push(cond),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ClusterSyncView {
    pub namespace: String,
    pub name: String,
    pub conditions: Conditions,
}

impl ClusterSyncView {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), name: name.into(), conditions: Conditions::new() }
    }

    pub fn namespaced_name(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    pub fn condition(&self, kind: &str) -> Option<&Condition> {
        find(&self.conditions, kind)
    }

    pub fn set_condition(&mut self, cond: Condition) {
        match self.conditions.iter_mut().find(|c| c.kind == cond.kind) {
            Some(slot) => *slot = cond,
            None => self.conditions.push(cond),
        }
    }
}
