//! Collector thresholds: YAML file, then `FLEETMON_*` environment overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::resolver::{SignalTable, UnknownSignal};

pub const ENV_PROVISION_MIN_SECS: &str = "FLEETMON_PROVISION_MIN_SECS";
pub const ENV_PROVISION_RESTARTS_MIN: &str = "FLEETMON_PROVISION_RESTARTS_MIN";
pub const ENV_DEPROVISION_MIN_SECS: &str = "FLEETMON_DEPROVISION_MIN_SECS";
pub const ENV_CLUSTERSYNC_MIN_SECS: &str = "FLEETMON_CLUSTERSYNC_MIN_SECS";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading {}: {source}", path.display())]
    Read { path: PathBuf, source: std::io::Error },
    #[error("parsing thresholds: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error(transparent)]
    Signal(#[from] UnknownSignal),
}

/// Minimums below which an entity is left out of a scrape. All default to zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Thresholds {
    pub provision_underway_min_secs: u64,
    pub provision_restarts_min: u32,
    pub deprovision_underway_min_secs: u64,
    pub clustersync_failing_min_secs: u64,
    /// Optional reordering of the named provisioning signals.
    pub signal_order: Vec<String>,
}

impl Thresholds {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let t: Self = serde_yaml::from_str(text)?;
        t.signal_table()?;
        Ok(t)
    }

    /// Load from `path` (if any) and apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut t = match path {
            Some(p) => {
                let text = std::fs::read_to_string(p)
                    .map_err(|source| ConfigError::Read { path: p.to_path_buf(), source })?;
                Self::from_yaml_str(&text)?
            }
            None => Self::default(),
        };
        t.apply_env_from(|k| std::env::var(k).ok());
        debug!(thresholds = ?t, "thresholds loaded");
        Ok(t)
    }

    /// Override from a variable lookup; unparseable values are ignored with a warning.
    pub fn apply_env_from(&mut self, get: impl Fn(&str) -> Option<String>) {
        fn parse<T: std::str::FromStr>(key: &str, raw: Option<String>) -> Option<T> {
            let raw = raw?;
            match raw.trim().parse::<T>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(var = key, value = %raw, "ignoring unparseable threshold override");
                    None
                }
            }
        }
        if let Some(v) = parse(ENV_PROVISION_MIN_SECS, get(ENV_PROVISION_MIN_SECS)) {
            self.provision_underway_min_secs = v;
        }
        if let Some(v) = parse(ENV_PROVISION_RESTARTS_MIN, get(ENV_PROVISION_RESTARTS_MIN)) {
            self.provision_restarts_min = v;
        }
        if let Some(v) = parse(ENV_DEPROVISION_MIN_SECS, get(ENV_DEPROVISION_MIN_SECS)) {
            self.deprovision_underway_min_secs = v;
        }
        if let Some(v) = parse(ENV_CLUSTERSYNC_MIN_SECS, get(ENV_CLUSTERSYNC_MIN_SECS)) {
            self.clustersync_failing_min_secs = v;
        }
    }

    pub fn provision_underway_min(&self) -> Duration {
        Duration::from_secs(self.provision_underway_min_secs)
    }

    pub fn deprovision_underway_min(&self) -> Duration {
        Duration::from_secs(self.deprovision_underway_min_secs)
    }

    pub fn clustersync_failing_min(&self) -> Duration {
        Duration::from_secs(self.clustersync_failing_min_secs)
    }

    pub fn signal_table(&self) -> Result<SignalTable, UnknownSignal> {
        SignalTable::with_order(self.signal_order.as_slice())
    }
}
