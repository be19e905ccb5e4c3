//! In-memory keyed store

use super::RlsStore;
use crate::audit::AuditLogEntry;
use crate::error::Result;
use crate::policy::Policy;
use crate::rule::Rule;
use crate::types::Context;
use crate::validation::Validation;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Full dump of a store, used to seed and inspect in-memory instances
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    #[serde(default)]
    pub contexts: Vec<Context>,
    #[serde(default)]
    pub policies: Vec<Policy>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub validations: Vec<Validation>,
    #[serde(default)]
    pub audit_log: Vec<AuditLogEntry>,
}

/// In-memory store.
///
/// Collections are vectors so listings keep creation order; each sits
/// behind its own lock so a reader sees either the old or the new record.
#[derive(Default)]
pub struct InMemoryStore {
    contexts: DashMap<String, Context>,
    policies: RwLock<Vec<Policy>>,
    rules: RwLock<Vec<Rule>>,
    validations: RwLock<Vec<Validation>>,
    audit_log: RwLock<Vec<AuditLogEntry>>,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store from a snapshot
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let contexts = DashMap::new();
        for context in snapshot.contexts {
            contexts.insert(context.session_id.clone(), context);
        }

        Self {
            contexts,
            policies: RwLock::new(snapshot.policies),
            rules: RwLock::new(snapshot.rules),
            validations: RwLock::new(snapshot.validations),
            audit_log: RwLock::new(snapshot.audit_log),
        }
    }

    /// Copy the current contents out
    pub async fn snapshot(&self) -> StoreSnapshot {
        let mut contexts: Vec<Context> = self.contexts.iter().map(|e| e.value().clone()).collect();
        contexts.sort_by(|a, b| a.session_id.cmp(&b.session_id));

        StoreSnapshot {
            contexts,
            policies: self.policies.read().await.clone(),
            rules: self.rules.read().await.clone(),
            validations: self.validations.read().await.clone(),
            audit_log: self.audit_log.read().await.clone(),
        }
    }

    /// Number of audit entries across all organizations
    pub async fn audit_len(&self) -> usize {
        self.audit_log.read().await.len()
    }
}

fn upsert<T>(items: &mut Vec<T>, item: T, same: impl Fn(&T, &T) -> bool) {
    match items.iter_mut().find(|existing| same(existing, &item)) {
        Some(slot) => *slot = item,
        None => items.push(item),
    }
}

#[async_trait]
impl RlsStore for InMemoryStore {
    async fn list_policies_by_org(&self, organization_id: &str) -> Result<Vec<Policy>> {
        let policies = self.policies.read().await;
        Ok(policies
            .iter()
            .filter(|p| p.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn list_rules_by_org(&self, organization_id: &str) -> Result<Vec<Rule>> {
        let rules = self.rules.read().await;
        Ok(rules
            .iter()
            .filter(|r| r.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn list_validations_by_org(&self, organization_id: &str) -> Result<Vec<Validation>> {
        let validations = self.validations.read().await;
        Ok(validations
            .iter()
            .filter(|v| v.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn get_policy(&self, id: &str) -> Result<Option<Policy>> {
        Ok(self.policies.read().await.iter().find(|p| p.id == id).cloned())
    }

    async fn get_rule(&self, id: &str) -> Result<Option<Rule>> {
        Ok(self.rules.read().await.iter().find(|r| r.id == id).cloned())
    }

    async fn insert_policy(&self, policy: Policy) -> Result<()> {
        let mut policies = self.policies.write().await;
        upsert(&mut *policies, policy, |a, b| a.id == b.id);
        Ok(())
    }

    async fn insert_rule(&self, rule: Rule) -> Result<()> {
        let mut rules = self.rules.write().await;
        upsert(&mut *rules, rule, |a, b| a.id == b.id);
        Ok(())
    }

    async fn insert_validation(&self, validation: Validation) -> Result<()> {
        let mut validations = self.validations.write().await;
        upsert(&mut *validations, validation, |a, b| a.id == b.id);
        Ok(())
    }

    async fn append_audit_entry(&self, entry: AuditLogEntry) -> Result<()> {
        self.audit_log.write().await.push(entry);
        Ok(())
    }

    async fn list_audit_entries_by_org(&self, organization_id: &str) -> Result<Vec<AuditLogEntry>> {
        let log = self.audit_log.read().await;
        Ok(log
            .iter()
            .filter(|e| e.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn get_context(&self, session_id: &str) -> Result<Option<Context>> {
        Ok(self.contexts.get(session_id).map(|c| c.value().clone()))
    }

    async fn put_context(&self, context: Context) -> Result<()> {
        self.contexts.insert(context.session_id.clone(), context);
        Ok(())
    }
}
