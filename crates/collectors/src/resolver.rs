//! Condition resolution for provisioning deployments.
//!
//! Precedence is fixed: hard suppression (`ProvisionFailed` with reason
//! `Initialized`), soft suppression (`ProvisionStopped=False`), then the first
//! matching rule of the [`SignalTable`], then `Unknown/Unknown`.

use fleetmon_core::{condition_types, ConditionStatus, Conditions};
use serde::{Deserialize, Serialize};

pub const UNKNOWN: &str = "Unknown";

/// Which status marks a condition as the problem state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Polarity {
    /// `True` is bad (e.g. `ProvisionFailed`).
    Positive,
    /// `False` is bad (e.g. `RequirementsMet`).
    Negative,
}

impl Polarity {
    pub fn trigger(self) -> ConditionStatus {
        match self {
            Self::Positive => ConditionStatus::True,
            Self::Negative => ConditionStatus::False,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignalRule {
    pub condition: &'static str,
    pub polarity: Polarity,
}

/// The known named signals, in default priority order.
pub const DEFAULT_RULES: [SignalRule; 3] = [
    SignalRule { condition: condition_types::PROVISION_FAILED, polarity: Polarity::Positive },
    SignalRule { condition: condition_types::DNS_NOT_READY, polarity: Polarity::Positive },
    SignalRule { condition: condition_types::REQUIREMENTS_MET, polarity: Polarity::Negative },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppression {
    /// `ProvisionFailed` carries the bootstrap reason.
    Initializing,
    /// `ProvisionStopped=False`: the provision is still being retried.
    Retrying,
}

/// Reported `(condition, reason)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signal<'a> {
    pub condition: &'a str,
    pub reason: &'a str,
}

impl Signal<'static> {
    pub const UNKNOWN: Self = Signal { condition: UNKNOWN, reason: UNKNOWN };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<'a> {
    Suppressed(Suppression),
    Signal(Signal<'a>),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown signal condition {0:?} (known: ProvisionFailed, DNSNotReady, RequirementsMet)")]
pub struct UnknownSignal(pub String);

/// Ordered rule table consulted after suppression checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalTable {
    rules: Vec<SignalRule>,
}

impl Default for SignalTable {
    fn default() -> Self {
        Self { rules: DEFAULT_RULES.to_vec() }
    }
}

impl SignalTable {
    /// Reorder the known rules. Listed conditions come first in the given
    /// order; unlisted ones keep their default relative order after them.
    pub fn with_order<S: AsRef<str>>(order: &[S]) -> Result<Self, UnknownSignal> {
        let mut rules = Vec::with_capacity(DEFAULT_RULES.len());
        for name in order {
            let name = name.as_ref();
            let rule = DEFAULT_RULES
                .iter()
                .find(|r| r.condition == name)
                .ok_or_else(|| UnknownSignal(name.to_string()))?;
            if !rules.contains(rule) {
                rules.push(*rule);
            }
        }
        for rule in DEFAULT_RULES {
            if !rules.contains(&rule) {
                rules.push(rule);
            }
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[SignalRule] {
        &self.rules
    }

    pub fn resolve<'a>(&self, conditions: &'a Conditions) -> Resolution<'a> {
        let find = |kind: &str| conditions.iter().find(|c| c.kind == kind);

        if find(condition_types::PROVISION_FAILED)
            .is_some_and(|c| c.reason == condition_types::REASON_INITIALIZED)
        {
            return Resolution::Suppressed(Suppression::Initializing);
        }
        if find(condition_types::PROVISION_STOPPED).is_some_and(|c| c.status == ConditionStatus::False) {
            return Resolution::Suppressed(Suppression::Retrying);
        }
        for rule in &self.rules {
            if let Some(c) = find(rule.condition) {
                if c.status == rule.polarity.trigger() {
                    return Resolution::Signal(Signal { condition: &c.kind, reason: &c.reason });
                }
            }
        }
        Resolution::Signal(Signal::UNKNOWN)
    }
}
