//! Ordered rules evaluated ahead of policies

use crate::error::{Result, RlsError};
use crate::policy::{check_priority, RecordMetadata};
use crate::types::{Context, Operation, OperationScope, OrganizationId, RuleId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What a matching rule does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleActionType {
    /// Grant access, ending evaluation
    Allow,
    /// Refuse access, ending evaluation
    Deny,
    Modify,
    Log,
    Redirect,
}

impl RuleActionType {
    /// True for actions that settle the allow/deny outcome
    pub fn is_terminal(&self) -> bool {
        matches!(self, RuleActionType::Allow | RuleActionType::Deny)
    }
}

/// Rule evaluation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleConfiguration {
    pub is_active: bool,

    /// 1-10, higher is evaluated first
    pub priority: u8,

    /// Authoring hint; ordering is by priority
    #[serde(default)]
    pub evaluation_order: i32,

    /// Ends the rule phase once this rule has been evaluated
    #[serde(default)]
    pub stop_on_match: bool,
}

/// Subject constraints
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextConditions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_attributes: Option<Map<String, Value>>,
}

/// Target constraints
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataConditions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_name: Option<String>,

    /// Compared literally: `ALL` here never equals a concrete operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<OperationScope>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub start: String,
    pub end: String,
}

/// Calendar constraints (stored, not evaluated)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeConditions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_of_day: Option<TimeOfDay>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RuleConditions {
    #[serde(default)]
    pub context: ContextConditions,
    #[serde(default)]
    pub data: DataConditions,
    #[serde(default)]
    pub time: TimeConditions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleAction {
    #[serde(rename = "type")]
    pub kind: RuleActionType,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RuleAction {
    pub fn new(kind: RuleActionType) -> Self {
        Self {
            kind,
            parameters: Map::new(),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Stored rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: RuleId,
    pub organization_id: OrganizationId,
    pub rule_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub configuration: RuleConfiguration,
    #[serde(default)]
    pub conditions: RuleConditions,
    pub actions: RuleAction,
    pub metadata: RecordMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rule {
    /// Same checks as [`NewRule::validate`], applied before a re-save
    pub fn validate(&self) -> Result<()> {
        check_definition(&self.organization_id, &self.rule_name, &self.configuration)
    }

    /// Rule predicate. Unset constraints match anything.
    ///
    /// Only the context role and permissions and the data operation and
    /// table take part; user, organization, session, column, value and
    /// calendar constraints are carried but not evaluated.
    pub fn matches(&self, context: &Context, operation: &Operation) -> bool {
        let subject = &self.conditions.context;
        let target = &self.conditions.data;

        if let Some(role) = &subject.role {
            if role != &context.role {
                return false;
            }
        }

        if let Some(required) = &subject.permissions {
            if !context.has_permissions(required) {
                return false;
            }
        }

        if let Some(scope) = target.operation {
            if !scope.is(operation.kind) {
                return false;
            }
        }

        if let Some(table) = &target.table_name {
            if table != &operation.table_name {
                return false;
            }
        }

        true
    }
}

/// Rule as authored, before the store assigns identity and timestamps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRule {
    pub organization_id: OrganizationId,
    pub rule_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub configuration: RuleConfiguration,
    #[serde(default)]
    pub conditions: RuleConditions,
    pub actions: RuleAction,
    pub metadata: RecordMetadata,
}

impl NewRule {
    pub fn validate(&self) -> Result<()> {
        check_definition(&self.organization_id, &self.rule_name, &self.configuration)
    }

    pub fn into_rule(self, id: RuleId, now: DateTime<Utc>) -> Rule {
        Rule {
            id,
            organization_id: self.organization_id,
            rule_name: self.rule_name,
            description: self.description,
            configuration: self.configuration,
            conditions: self.conditions,
            actions: self.actions,
            metadata: self.metadata,
            created_at: now,
            updated_at: now,
        }
    }
}

fn check_definition(
    organization_id: &str,
    rule_name: &str,
    configuration: &RuleConfiguration,
) -> Result<()> {
    if organization_id.trim().is_empty() {
        return Err(RlsError::InvalidRule("organizationId is required".into()));
    }
    if rule_name.trim().is_empty() {
        return Err(RlsError::InvalidRule("ruleName is required".into()));
    }
    check_priority(configuration.priority).map_err(RlsError::InvalidRule)
}

/// Filters for listing rules
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleFilter {
    pub is_active: Option<bool>,

    /// Matches rules for this role and rules with no role constraint
    pub role: Option<String>,

    pub limit: Option<usize>,
}

impl RuleFilter {
    /// Filter used by the decision engine
    pub fn applicable(role: impl Into<String>) -> Self {
        Self {
            is_active: Some(true),
            role: Some(role.into()),
            limit: None,
        }
    }

    pub fn matches(&self, rule: &Rule) -> bool {
        if let Some(active) = self.is_active {
            if rule.configuration.is_active != active {
                return false;
            }
        }
        if let Some(role) = &self.role {
            match &rule.conditions.context.role {
                Some(r) if r != role => return false,
                _ => {}
            }
        }
        true
    }
}
