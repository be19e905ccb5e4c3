//! Keyed store abstraction and backends
//!
//! The engine only ever talks to [`RlsStore`]; filtering, ordering and
//! record stamping live in the [`query`] layer so every backend behaves the
//! same way.

use crate::audit::AuditLogEntry;
use crate::error::Result;
use crate::policy::Policy;
use crate::rule::Rule;
use crate::types::Context;
use crate::validation::Validation;
use async_trait::async_trait;

pub mod memory;
pub mod query;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::{InMemoryStore, StoreSnapshot};
pub use query::{PolicyStore, RuleStore, ValidationStore};

#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;

/// Persistence operations the engine depends on.
///
/// `list_*` methods return records in creation order; re-inserting a record
/// with an existing id replaces it in place. Implementations must never
/// expose a partially written record to a concurrent reader.
#[async_trait]
pub trait RlsStore: Send + Sync {
    /// All policies of an organization
    async fn list_policies_by_org(&self, organization_id: &str) -> Result<Vec<Policy>>;

    /// All rules of an organization
    async fn list_rules_by_org(&self, organization_id: &str) -> Result<Vec<Rule>>;

    /// All validation definitions of an organization
    async fn list_validations_by_org(&self, organization_id: &str) -> Result<Vec<Validation>>;

    /// Policy by id, in any organization
    async fn get_policy(&self, id: &str) -> Result<Option<Policy>>;

    /// Rule by id, in any organization
    async fn get_rule(&self, id: &str) -> Result<Option<Rule>>;

    /// Insert or replace a policy
    async fn insert_policy(&self, policy: Policy) -> Result<()>;

    /// Insert or replace a rule
    async fn insert_rule(&self, rule: Rule) -> Result<()>;

    /// Insert or replace a validation definition
    async fn insert_validation(&self, validation: Validation) -> Result<()>;

    /// Append to the audit trail. Must be a single atomic insert.
    async fn append_audit_entry(&self, entry: AuditLogEntry) -> Result<()>;

    /// Audit trail of an organization, oldest first
    async fn list_audit_entries_by_org(&self, organization_id: &str) -> Result<Vec<AuditLogEntry>>;

    /// Context registered for a session
    async fn get_context(&self, session_id: &str) -> Result<Option<Context>>;

    /// Register a context, replacing any previous one for the session
    async fn put_context(&self, context: Context) -> Result<()>;
}
