//! Access decision produced by the engine

use crate::types::{PolicyId, RuleId};
use serde::{Deserialize, Serialize};

/// Reason given when no rule or policy grants access
pub const NO_APPLICABLE_GRANT: &str = "No applicable policy or rule permits access";

/// Reason given by a matching deny rule without a message
pub const DENIED_BY_RULE: &str = "Access denied by rule";

/// What produced a terminal verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum DecisionSource {
    Rule(RuleId),
    Policy(PolicyId),
}

/// Allow/deny verdict plus the evaluation trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    /// Whether the operation is allowed
    pub allowed: bool,

    /// Human-readable reason. Never empty when `allowed` is true.
    pub reason: String,

    /// Every policy considered, in evaluation order
    pub policies_applied: Vec<PolicyId>,

    /// Every rule considered, in evaluation order
    pub rules_evaluated: Vec<RuleId>,

    /// Wall time spent evaluating, in milliseconds
    pub execution_time: f64,

    /// Rule or policy that settled the verdict; `None` for the default deny
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_by: Option<DecisionSource>,
}

impl Decision {
    /// Verdict from a terminal rule
    pub(crate) fn by_rule(
        allowed: bool,
        rule_id: RuleId,
        reason: String,
        rules_evaluated: Vec<RuleId>,
    ) -> Self {
        Self {
            allowed,
            reason,
            policies_applied: Vec::new(),
            rules_evaluated,
            execution_time: 0.0,
            decided_by: Some(DecisionSource::Rule(rule_id)),
        }
    }

    /// Grant from a matching policy
    pub(crate) fn by_policy(
        policy_id: PolicyId,
        policy_name: &str,
        policies_applied: Vec<PolicyId>,
        rules_evaluated: Vec<RuleId>,
    ) -> Self {
        Self {
            allowed: true,
            reason: format!("Access permitted by policy {}", policy_name),
            policies_applied,
            rules_evaluated,
            execution_time: 0.0,
            decided_by: Some(DecisionSource::Policy(policy_id)),
        }
    }

    /// Deny with no deciding record
    pub(crate) fn deny(
        reason: impl Into<String>,
        policies_applied: Vec<PolicyId>,
        rules_evaluated: Vec<RuleId>,
    ) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
            policies_applied,
            rules_evaluated,
            execution_time: 0.0,
            decided_by: None,
        }
    }

    pub(crate) fn timed(mut self, elapsed: std::time::Duration) -> Self {
        self.execution_time = elapsed.as_secs_f64() * 1000.0;
        self
    }

    /// 1 if a policy settled the verdict, else 0
    pub fn policies_matched(&self) -> u32 {
        matches!(self.decided_by, Some(DecisionSource::Policy(_))) as u32
    }

    /// 1 if a rule settled the verdict, else 0
    pub fn rules_matched(&self) -> u32 {
        matches!(self.decided_by, Some(DecisionSource::Rule(_))) as u32
    }
}
