//! Filtered, priority-ordered access to policies, rules and validations

use super::RlsStore;
use crate::clock::Clock;
use crate::error::{Result, RlsError};
use crate::policy::{NewPolicy, Policy, PolicyFilter};
use crate::rule::{NewRule, Rule, RuleFilter};
use crate::validation::{NewValidation, Validation};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub(crate) fn fresh_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

/// Stable sort by descending priority, then truncate
fn order_and_limit<T>(items: &mut Vec<T>, priority: impl Fn(&T) -> u8, limit: Option<usize>) {
    items.sort_by(|a, b| priority(b).cmp(&priority(a)));
    if let Some(limit) = limit {
        items.truncate(limit);
    }
}

/// Policy access point
#[derive(Clone)]
pub struct PolicyStore {
    backend: Arc<dyn RlsStore>,
    clock: Arc<dyn Clock>,
}

impl PolicyStore {
    pub fn new(backend: Arc<dyn RlsStore>, clock: Arc<dyn Clock>) -> Self {
        Self { backend, clock }
    }

    /// Policies of an organization matching `filter`, highest priority first.
    ///
    /// Equal priorities keep the backend's creation order. `limit` applies
    /// after ordering.
    pub async fn list(&self, organization_id: &str, filter: &PolicyFilter) -> Result<Vec<Policy>> {
        let mut policies: Vec<Policy> = self
            .backend
            .list_policies_by_org(organization_id)
            .await?
            .into_iter()
            .filter(|p| filter.matches(p))
            .collect();

        order_and_limit(&mut policies, |p| p.configuration.priority, filter.limit);
        Ok(policies)
    }

    /// Validate, assign an id, stamp and store a new policy
    pub async fn create(&self, draft: NewPolicy) -> Result<Policy> {
        draft.validate()?;

        let policy = draft.into_policy(fresh_id("policy"), self.clock.now_utc());
        self.backend.insert_policy(policy.clone()).await?;

        info!(
            "RLS policy created: id={}, organization={}, table={}, name={}",
            policy.id, policy.organization_id, policy.table_name, policy.policy_name
        );

        Ok(policy)
    }

    /// Re-save an existing policy, refreshing `updatedAt`
    pub async fn save(&self, mut policy: Policy) -> Result<Policy> {
        policy.validate()?;

        let Some(previous) = self.backend.get_policy(&policy.id).await? else {
            return Err(RlsError::NotFound(format!("policy {}", policy.id)));
        };
        if previous.organization_id != policy.organization_id {
            return Err(RlsError::InvalidPolicy(format!(
                "organizationId of policy {} cannot change",
                policy.id
            )));
        }

        policy.created_at = previous.created_at;
        policy.updated_at = self.clock.now_utc();
        self.backend.insert_policy(policy.clone()).await?;

        info!("RLS policy updated: id={}", policy.id);
        Ok(policy)
    }
}

/// Rule access point
#[derive(Clone)]
pub struct RuleStore {
    backend: Arc<dyn RlsStore>,
    clock: Arc<dyn Clock>,
}

impl RuleStore {
    pub fn new(backend: Arc<dyn RlsStore>, clock: Arc<dyn Clock>) -> Self {
        Self { backend, clock }
    }

    /// Rules of an organization matching `filter`, highest priority first
    pub async fn list(&self, organization_id: &str, filter: &RuleFilter) -> Result<Vec<Rule>> {
        let mut rules: Vec<Rule> = self
            .backend
            .list_rules_by_org(organization_id)
            .await?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();

        order_and_limit(&mut rules, |r| r.configuration.priority, filter.limit);
        Ok(rules)
    }

    pub async fn create(&self, draft: NewRule) -> Result<Rule> {
        draft.validate()?;

        let rule = draft.into_rule(fresh_id("rule"), self.clock.now_utc());
        self.backend.insert_rule(rule.clone()).await?;

        info!(
            "RLS rule created: id={}, organization={}, name={}",
            rule.id, rule.organization_id, rule.rule_name
        );

        Ok(rule)
    }

    /// Re-save an existing rule, refreshing `updatedAt`
    pub async fn save(&self, mut rule: Rule) -> Result<Rule> {
        rule.validate()?;

        let Some(previous) = self.backend.get_rule(&rule.id).await? else {
            return Err(RlsError::NotFound(format!("rule {}", rule.id)));
        };
        if previous.organization_id != rule.organization_id {
            return Err(RlsError::InvalidRule(format!(
                "organizationId of rule {} cannot change",
                rule.id
            )));
        }

        rule.created_at = previous.created_at;
        rule.updated_at = self.clock.now_utc();
        self.backend.insert_rule(rule.clone()).await?;

        info!("RLS rule updated: id={}", rule.id);
        Ok(rule)
    }
}

/// Validation definition access point
#[derive(Clone)]
pub struct ValidationStore {
    backend: Arc<dyn RlsStore>,
    clock: Arc<dyn Clock>,
}

impl ValidationStore {
    pub fn new(backend: Arc<dyn RlsStore>, clock: Arc<dyn Clock>) -> Self {
        Self { backend, clock }
    }

    pub async fn list(&self, organization_id: &str) -> Result<Vec<Validation>> {
        self.backend.list_validations_by_org(organization_id).await
    }

    pub async fn create(&self, draft: NewValidation) -> Result<Validation> {
        draft.validate()?;

        let validation = draft.into_validation(fresh_id("validation"), self.clock.now_utc());
        self.backend.insert_validation(validation.clone()).await?;

        info!(
            "RLS validation created: id={}, organization={}",
            validation.id, validation.organization_id
        );

        Ok(validation)
    }
}
