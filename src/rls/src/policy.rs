//! Table-level access policies and the policy predicate

use crate::error::{Result, RlsError};
use crate::types::{Context, OperationScope, OperationType, OrganizationId, PolicyId};
use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Lowest allowed priority
pub const MIN_PRIORITY: u8 = 1;

/// Highest allowed priority
pub const MAX_PRIORITY: u8 = 10;

/// How a policy condition is expressed. The expression itself is never evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionType {
    #[default]
    Simple,
    Complex,
    Function,
    Template,
}

/// Policy evaluation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyConfiguration {
    /// Operation the policy grants (`ALL` for every operation)
    pub operation: OperationScope,

    pub is_active: bool,

    /// 1-10, higher is evaluated first
    pub priority: u8,

    /// Stored for superuser tooling; not consulted by the engine
    #[serde(default, rename = "bypassRLS")]
    pub bypass_rls: bool,
}

/// SQL-like row filter carried as metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyConditions {
    #[serde(rename = "type", default)]
    pub kind: ConditionType,

    /// Row filter, e.g. `organization_id = $1`
    pub expression: String,

    /// Bound parameters for `expression`
    #[serde(default)]
    pub parameters: Map<String, Value>,

    /// Ids of policies this one builds on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<PolicyId>>,
}

/// Wall-clock window during which a policy applies
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRestrictions {
    /// Inclusive start, `HH:MM`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,

    /// Inclusive end, `HH:MM`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,

    /// 0 = Sunday .. 6 = Saturday
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_of_week: Option<Vec<u8>>,

    /// Declared zone. Checks run against the host clock regardless.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl TimeRestrictions {
    /// Check the window against a local wall-clock reading.
    ///
    /// Comparison is at minute granularity, both bounds inclusive. A bound
    /// that does not parse as `HH:MM` never matches.
    pub fn permits(&self, now: DateTime<FixedOffset>) -> bool {
        let current = (now.hour(), now.minute());

        if let Some(start) = &self.start_time {
            match parse_hhmm(start) {
                Some(start) if current >= start => {}
                _ => return false,
            }
        }

        if let Some(end) = &self.end_time {
            match parse_hhmm(end) {
                Some(end) if current <= end => {}
                _ => return false,
            }
        }

        if let Some(days) = &self.days_of_week {
            let today = now.weekday().num_days_from_sunday();
            if !days.iter().any(|d| u32::from(*d) == today) {
                return false;
            }
        }

        true
    }
}

/// Exact-match address lists
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpRestrictions {
    #[serde(default, rename = "allowedIPs", skip_serializing_if = "Option::is_none")]
    pub allowed_ips: Option<Vec<String>>,

    #[serde(default, rename = "blockedIPs", skip_serializing_if = "Option::is_none")]
    pub blocked_ips: Option<Vec<String>>,

    /// CIDR ranges. Stored only; not enforced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_ranges: Option<Vec<String>>,
}

impl IpRestrictions {
    /// Blocked list wins over the allowed list
    pub fn permits(&self, ip: &str) -> bool {
        if let Some(blocked) = &self.blocked_ips {
            if blocked.iter().any(|b| b == ip) {
                return false;
            }
        }

        if let Some(allowed) = &self.allowed_ips {
            if !allowed.iter().any(|a| a == ip) {
                return false;
            }
        }

        true
    }
}

/// Who may use a policy, and when and from where
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_restrictions: Option<TimeRestrictions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_restrictions: Option<IpRestrictions>,
}

/// Authoring metadata shared by policies and rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMetadata {
    pub created_by: String,
    pub last_modified_by: String,
    pub version: u32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
}

impl RecordMetadata {
    pub fn authored_by(author: impl Into<String>) -> Self {
        let author = author.into();
        Self {
            created_by: author.clone(),
            last_modified_by: author,
            version: 1,
            tags: Vec::new(),
            documentation: None,
        }
    }
}

/// Stored policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub id: PolicyId,
    pub organization_id: OrganizationId,
    pub table_name: String,
    pub policy_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub configuration: PolicyConfiguration,
    pub conditions: PolicyConditions,
    #[serde(default)]
    pub access_rules: AccessRules,
    pub metadata: RecordMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Policy {
    /// Same checks as [`NewPolicy::validate`], applied before a re-save
    pub fn validate(&self) -> Result<()> {
        check_definition(
            &self.organization_id,
            &self.table_name,
            &self.policy_name,
            &self.configuration,
            &self.access_rules,
        )
    }

    /// Policy predicate: role, time window and IP lists must all hold.
    ///
    /// `now` is the evaluating host's wall-clock reading; the declared
    /// timezone of the policy is not applied.
    pub fn permits(&self, context: &Context, now: DateTime<FixedOffset>) -> bool {
        let rules = &self.access_rules;

        if let Some(roles) = &rules.roles {
            if !roles.iter().any(|r| r == &context.role) {
                debug!("Policy {} rejects role {}", self.id, context.role);
                return false;
            }
        }

        if let Some(window) = &rules.time_restrictions {
            if !window.permits(now) {
                debug!("Policy {} outside time window at {}", self.id, now);
                return false;
            }
        }

        if let Some(ips) = &rules.ip_restrictions {
            if !ips.permits(&context.ip_address) {
                debug!("Policy {} rejects address {}", self.id, context.ip_address);
                return false;
            }
        }

        true
    }
}

/// Policy as authored, before the store assigns identity and timestamps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPolicy {
    pub organization_id: OrganizationId,
    pub table_name: String,
    pub policy_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub configuration: PolicyConfiguration,
    pub conditions: PolicyConditions,
    #[serde(default)]
    pub access_rules: AccessRules,
    pub metadata: RecordMetadata,
}

impl NewPolicy {
    /// Reject definitions the engine cannot evaluate meaningfully
    pub fn validate(&self) -> Result<()> {
        check_definition(
            &self.organization_id,
            &self.table_name,
            &self.policy_name,
            &self.configuration,
            &self.access_rules,
        )
    }

    /// Attach identity and timestamps
    pub fn into_policy(self, id: PolicyId, now: DateTime<Utc>) -> Policy {
        Policy {
            id,
            organization_id: self.organization_id,
            table_name: self.table_name,
            policy_name: self.policy_name,
            description: self.description,
            configuration: self.configuration,
            conditions: self.conditions,
            access_rules: self.access_rules,
            metadata: self.metadata,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Filters for listing policies
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyFilter {
    pub table_name: Option<String>,

    /// Matches policies declared for this operation or for `ALL`
    pub operation: Option<OperationType>,

    pub is_active: Option<bool>,

    pub limit: Option<usize>,
}

impl PolicyFilter {
    /// Filter used by the decision engine
    pub fn applicable(table_name: impl Into<String>, operation: OperationType) -> Self {
        Self {
            table_name: Some(table_name.into()),
            operation: Some(operation),
            is_active: Some(true),
            limit: None,
        }
    }

    pub fn matches(&self, policy: &Policy) -> bool {
        if let Some(table) = &self.table_name {
            if &policy.table_name != table {
                return false;
            }
        }
        if let Some(op) = self.operation {
            if !policy.configuration.operation.covers(op) {
                return false;
            }
        }
        if let Some(active) = self.is_active {
            if policy.configuration.is_active != active {
                return false;
            }
        }
        true
    }
}

/// Parse `HH:MM` into `(hour, minute)`
pub(crate) fn parse_hhmm(s: &str) -> Option<(u32, u32)> {
    let (h, m) = s.trim().split_once(':')?;
    let hour: u32 = h.parse().ok()?;
    let minute: u32 = m.parse().ok()?;
    (hour < 24 && minute < 60).then_some((hour, minute))
}

fn check_definition(
    organization_id: &str,
    table_name: &str,
    policy_name: &str,
    configuration: &PolicyConfiguration,
    access_rules: &AccessRules,
) -> Result<()> {
    if organization_id.trim().is_empty() {
        return Err(RlsError::InvalidPolicy("organizationId is required".into()));
    }
    if table_name.trim().is_empty() {
        return Err(RlsError::InvalidPolicy("tableName is required".into()));
    }
    if policy_name.trim().is_empty() {
        return Err(RlsError::InvalidPolicy("policyName is required".into()));
    }
    check_priority(configuration.priority).map_err(RlsError::InvalidPolicy)?;

    if let Some(window) = &access_rules.time_restrictions {
        for bound in [&window.start_time, &window.end_time].into_iter().flatten() {
            if parse_hhmm(bound).is_none() {
                return Err(RlsError::InvalidPolicy(format!(
                    "time '{}' is not HH:MM",
                    bound
                )));
            }
        }
        if let Some(days) = &window.days_of_week {
            if let Some(day) = days.iter().find(|d| **d > 6) {
                return Err(RlsError::InvalidPolicy(format!(
                    "day of week {} is outside 0-6",
                    day
                )));
            }
        }
    }

    Ok(())
}

pub(crate) fn check_priority(priority: u8) -> std::result::Result<(), String> {
    if (MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
        Ok(())
    } else {
        Err(format!(
            "priority {} is outside {}-{}",
            priority, MIN_PRIORITY, MAX_PRIORITY
        ))
    }
}
