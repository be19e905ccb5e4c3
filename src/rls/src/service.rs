//! Single entry point wiring every component to one store and clock

use crate::audit::{AuditLogEntry, AuditRecorder, NewAuditEntry};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::context::ContextRegistry;
use crate::engine::{Decision, PolicyEngine};
use crate::error::Result;
use crate::policy::{NewPolicy, Policy, PolicyFilter};
use crate::rule::{NewRule, Rule, RuleFilter};
use crate::stats::{RlsStats, StatsAggregator};
use crate::store::{InMemoryStore, PolicyStore, RlsStore, RuleStore, ValidationStore};
use crate::synthesis::{PolicyRequirements, PolicySynthesizer};
use crate::types::{Context, NewContext, Operation};
use crate::validation::{NewValidation, Validation};
use std::sync::Arc;

/// Row-level security engine
///
/// Cheap to clone; clones share the same store.
#[derive(Clone)]
pub struct RlsEngine {
    contexts: ContextRegistry,
    policies: PolicyStore,
    rules: RuleStore,
    validations: ValidationStore,
    engine: PolicyEngine,
    synthesizer: PolicySynthesizer,
    audit: AuditRecorder,
    stats: StatsAggregator,
}

impl RlsEngine {
    /// Engine over `store` with the system clock and default configuration
    pub fn new(store: Arc<dyn RlsStore>) -> Self {
        Self::with_config(store, Arc::new(SystemClock), EngineConfig::default())
    }

    /// Engine over a fresh in-memory store
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()))
    }

    pub fn with_config(store: Arc<dyn RlsStore>, clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
        let policies = PolicyStore::new(store.clone(), clock.clone());
        let rules = RuleStore::new(store.clone(), clock.clone());

        Self {
            contexts: ContextRegistry::new(store.clone(), clock.clone()),
            validations: ValidationStore::new(store.clone(), clock.clone()),
            engine: PolicyEngine::new(policies.clone(), rules.clone(), clock.clone(), config.clone()),
            synthesizer: PolicySynthesizer::new(policies.clone()),
            audit: AuditRecorder::new(store.clone(), clock.clone()),
            stats: StatsAggregator::new(store, clock, config.top_n),
            policies,
            rules,
        }
    }

    pub async fn register_context(&self, context: NewContext) -> Result<Context> {
        self.contexts.register(context).await
    }

    pub async fn get_context(&self, session_id: &str) -> Result<Option<Context>> {
        self.contexts.get(session_id).await
    }

    pub async fn list_policies(&self, organization_id: &str, filter: &PolicyFilter) -> Result<Vec<Policy>> {
        self.policies.list(organization_id, filter).await
    }

    pub async fn create_policy(&self, policy: NewPolicy) -> Result<Policy> {
        self.policies.create(policy).await
    }

    pub async fn save_policy(&self, policy: Policy) -> Result<Policy> {
        self.policies.save(policy).await
    }

    pub async fn list_rules(&self, organization_id: &str, filter: &RuleFilter) -> Result<Vec<Rule>> {
        self.rules.list(organization_id, filter).await
    }

    pub async fn create_rule(&self, rule: NewRule) -> Result<Rule> {
        self.rules.create(rule).await
    }

    pub async fn save_rule(&self, rule: Rule) -> Result<Rule> {
        self.rules.save(rule).await
    }

    pub async fn list_validations(&self, organization_id: &str) -> Result<Vec<Validation>> {
        self.validations.list(organization_id).await
    }

    pub async fn create_validation(&self, validation: NewValidation) -> Result<Validation> {
        self.validations.create(validation).await
    }

    /// See [`PolicyEngine::evaluate_access`]
    pub async fn evaluate_access(&self, context: &Context, operation: &Operation) -> Result<Decision> {
        self.engine.evaluate_access(context, operation).await
    }

    pub async fn generate_policy(
        &self,
        organization_id: &str,
        table_name: &str,
        requirements: &PolicyRequirements,
    ) -> Result<Policy> {
        self.synthesizer
            .generate_policy(organization_id, table_name, requirements)
            .await
    }

    pub async fn record_audit(&self, entry: NewAuditEntry) -> Result<AuditLogEntry> {
        self.audit.record(entry).await
    }

    pub async fn record_decision(
        &self,
        context: &Context,
        operation: &Operation,
        decision: &Decision,
        request_id: Option<String>,
    ) -> Result<AuditLogEntry> {
        self.audit
            .record_decision(context, operation, decision, request_id)
            .await
    }

    pub async fn audit_entries(&self, organization_id: &str) -> Result<Vec<AuditLogEntry>> {
        self.audit.entries(organization_id).await
    }

    pub async fn get_stats(&self, organization_id: &str) -> Result<RlsStats> {
        self.stats.get_stats(organization_id).await
    }
}
