//! # DatadogAgent Status
//!
//! Status types shared by every served version of the resource, plus the
//! condition bookkeeping used by the reconciler.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of the DatadogAgent resource
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatadogAgentStatus {
    /// Conditions represent the latest available observations, one per condition type
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Generation of the spec that produced these conditions
    #[serde(default)]
    pub observed_generation: Option<i64>,
    /// Token generated for node agent / cluster agent communication when none is configured.
    /// Persisted so the token stays stable across passes.
    #[serde(default)]
    pub cluster_agent_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub r#type: String,
    pub status: String,
    #[serde(default)]
    pub last_transition_time: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Condition types reported by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionType {
    AgentReconcile,
    ClusterAgentReconcile,
    ClusterChecksRunnerReconcile,
    CredentialsSecretReconcile,
    ConfigurationValid,
}

impl ConditionType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AgentReconcile => "AgentReconcile",
            Self::ClusterAgentReconcile => "ClusterAgentReconcile",
            Self::ClusterChecksRunnerReconcile => "ClusterChecksRunnerReconcile",
            Self::CredentialsSecretReconcile => "CredentialsSecretReconcile",
            Self::ConfigurationValid => "ConfigurationValid",
        }
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl ConditionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::True => "True",
            Self::False => "False",
            Self::Unknown => "Unknown",
        }
    }
}

impl DatadogAgentStatus {
    #[must_use]
    pub fn condition(&self, condition_type: ConditionType) -> Option<&Condition> {
        self.conditions
            .iter()
            .find(|c| c.r#type == condition_type.as_str())
    }
}

/// Record a condition on the status.
///
/// Conditions are keyed by type: an existing entry is updated in place, a new
/// type is appended. Conditions are never removed. The transition time moves when
/// the tri-state value changes, or, with `force_transition_update`, when the
/// reason or message changes. An identical call leaves the status untouched.
pub fn update_condition(
    status: &mut DatadogAgentStatus,
    now: &str,
    condition_type: ConditionType,
    value: ConditionStatus,
    reason: &str,
    message: &str,
    force_transition_update: bool,
) {
    let reason = Some(reason.to_string());
    let message = Some(message.to_string());

    if let Some(existing) = status
        .conditions
        .iter_mut()
        .find(|c| c.r#type == condition_type.as_str())
    {
        let status_changed = existing.status != value.as_str();
        let detail_changed = existing.reason != reason || existing.message != message;
        if status_changed || (force_transition_update && detail_changed) {
            existing.last_transition_time = Some(now.to_string());
        }
        existing.status = value.as_str().to_string();
        existing.reason = reason;
        existing.message = message;
        return;
    }

    status.conditions.push(Condition {
        r#type: condition_type.as_str().to_string(),
        status: value.as_str().to_string(),
        last_transition_time: Some(now.to_string()),
        reason,
        message,
    });
}
