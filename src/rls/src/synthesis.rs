//! Template-based policy generation
//!
//! Turns a coarse access level into a stored [`Policy`] with a matching row
//! filter expression.

use crate::error::Result;
use crate::policy::{
    AccessRules, ConditionType, NewPolicy, Policy, PolicyConditions, PolicyConfiguration,
    RecordMetadata,
};
use crate::store::PolicyStore;
use crate::types::{OperationScope, OperationType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tracing::info;

/// Author recorded on generated policies
pub const SYSTEM_AUTHOR: &str = "system";

/// Breadth of access a generated policy grants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Public,
    Organization,
    User,
    Admin,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Public => "public",
            AccessLevel::Organization => "organization",
            AccessLevel::User => "user",
            AccessLevel::Admin => "admin",
        }
    }

    /// Row filter for this level
    fn expression(&self) -> &'static str {
        match self {
            AccessLevel::Public => "true",
            AccessLevel::Organization | AccessLevel::Admin => "organization_id = $1",
            AccessLevel::User => "organization_id = $1 AND created_by = $2",
        }
    }

    fn parameters(&self, organization_id: &str) -> Map<String, Value> {
        let mut params = Map::new();
        match self {
            AccessLevel::Public => {}
            AccessLevel::Organization | AccessLevel::Admin => {
                params.insert("organizationId".into(), Value::from(organization_id));
            }
            AccessLevel::User => {
                params.insert("organizationId".into(), Value::from(organization_id));
                params.insert("createdBy".into(), Value::from("current_user_id"));
            }
        }
        params
    }

    fn priority(&self) -> u8 {
        match self {
            AccessLevel::Admin => 10,
            _ => 5,
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccessLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "public" => Ok(AccessLevel::Public),
            "organization" => Ok(AccessLevel::Organization),
            "user" => Ok(AccessLevel::User),
            "admin" => Ok(AccessLevel::Admin),
            other => Err(format!("unknown access level '{}'", other)),
        }
    }
}

/// What a generated policy should allow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRequirements {
    pub access_level: AccessLevel,
    pub operations: Vec<OperationType>,
    #[serde(default)]
    pub roles: Vec<String>,

    /// Extra SQL-like predicate ANDed onto the template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_conditions: Option<String>,
}

impl PolicyRequirements {
    pub fn new(access_level: AccessLevel, operations: Vec<OperationType>) -> Self {
        Self {
            access_level,
            operations,
            roles: Vec::new(),
            additional_conditions: None,
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_conditions(mut self, conditions: impl Into<String>) -> Self {
        self.additional_conditions = Some(conditions.into());
        self
    }

    /// Single requested operation, or `ALL` for any other count
    fn scope(&self) -> OperationScope {
        match self.operations.as_slice() {
            [single] => OperationScope::from(*single),
            _ => OperationScope::All,
        }
    }
}

/// Builds the policy draft for `requirements` without storing it
pub fn draft_policy(
    organization_id: &str,
    table_name: &str,
    requirements: &PolicyRequirements,
) -> NewPolicy {
    let level = requirements.access_level;

    let mut expression = level.expression().to_string();
    if let Some(extra) = requirements
        .additional_conditions
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
    {
        expression = format!("{} AND ({})", expression, extra);
    }

    let mut metadata = RecordMetadata::authored_by(SYSTEM_AUTHOR);
    metadata.tags = vec![
        "auto-generated".to_string(),
        level.to_string(),
        table_name.to_string(),
    ];

    NewPolicy {
        organization_id: organization_id.to_string(),
        table_name: table_name.to_string(),
        policy_name: format!("{}_{}_access", table_name, level),
        description: Some(format!(
            "Auto-generated policy for {} with {} access level",
            table_name, level
        )),
        configuration: PolicyConfiguration {
            operation: requirements.scope(),
            is_active: true,
            priority: level.priority(),
            bypass_rls: false,
        },
        conditions: PolicyConditions {
            kind: ConditionType::Simple,
            expression,
            parameters: level.parameters(organization_id),
            dependencies: None,
        },
        access_rules: AccessRules {
            roles: Some(requirements.roles.clone()),
            ..Default::default()
        },
        metadata,
    }
}

/// Generates and stores policies from templates
#[derive(Clone)]
pub struct PolicySynthesizer {
    policies: PolicyStore,
}

impl PolicySynthesizer {
    pub fn new(policies: PolicyStore) -> Self {
        Self { policies }
    }

    /// Generate a policy for `table_name` and persist it
    pub async fn generate_policy(
        &self,
        organization_id: &str,
        table_name: &str,
        requirements: &PolicyRequirements,
    ) -> Result<Policy> {
        let policy = self
            .policies
            .create(draft_policy(organization_id, table_name, requirements))
            .await?;

        info!(
            "RLS policy generated: id={}, table={}, level={}, operation={:?}",
            policy.id, table_name, requirements.access_level, policy.configuration.operation
        );

        Ok(policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_organization_select_template() {
        let req = PolicyRequirements::new(AccessLevel::Organization, vec![OperationType::Select])
            .with_roles(["user"]);
        let draft = draft_policy("org_1", "invoices", &req);

        assert_eq!(draft.configuration.operation, OperationScope::Select);
        assert_eq!(draft.configuration.priority, 5);
        assert_eq!(draft.conditions.expression, "organization_id = $1");
        assert_eq!(draft.conditions.parameters["organizationId"], "org_1");
        assert_eq!(draft.access_rules.roles, Some(vec!["user".to_string()]));
        assert_eq!(draft.policy_name, "invoices_organization_access");
    }

    #[test]
    fn test_admin_priority_and_multi_op() {
        let req = PolicyRequirements::new(
            AccessLevel::Admin,
            vec![OperationType::Select, OperationType::Delete],
        );
        let draft = draft_policy("org_1", "users", &req);

        assert_eq!(draft.configuration.priority, 10);
        assert_eq!(draft.configuration.operation, OperationScope::All);
        assert_eq!(draft.metadata.tags, vec!["auto-generated", "admin", "users"]);
        assert_eq!(draft.metadata.created_by, SYSTEM_AUTHOR);
    }

    #[test]
    fn test_user_template_and_extra_conditions() {
        let req = PolicyRequirements::new(AccessLevel::User, vec![OperationType::Update])
            .with_conditions("status = 'open'");
        let draft = draft_policy("org_1", "tickets", &req);

        assert_eq!(
            draft.conditions.expression,
            "organization_id = $1 AND created_by = $2 AND (status = 'open')"
        );
        assert_eq!(draft.conditions.parameters["createdBy"], "current_user_id");
    }

    #[test]
    fn test_blank_extra_conditions_skipped() {
        let req = PolicyRequirements::new(AccessLevel::Public, vec![OperationType::Select])
            .with_conditions("   ");
        let draft = draft_policy("org_1", "articles", &req);

        assert_eq!(draft.conditions.expression, "true");
        assert!(draft.conditions.parameters.is_empty());
    }

    #[test]
    fn test_access_level_parse() {
        assert_eq!("Admin".parse::<AccessLevel>().unwrap(), AccessLevel::Admin);
        assert!("owner".parse::<AccessLevel>().is_err());
    }
}
