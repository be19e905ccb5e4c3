//! Append-only audit trail for access decisions
//!
//! Every evaluation the caller chooses to persist becomes one immutable
//! [`AuditLogEntry`]. Entries are only ever appended; statistics are derived
//! from them on demand.

use crate::clock::Clock;
use crate::engine::Decision;
use crate::error::Result;
use crate::store::query::fresh_id;
use crate::store::RlsStore;
use crate::types::{Context, Operation, OperationType, OrganizationId, PolicyId, RuleId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Operation as recorded in the trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditOperation {
    #[serde(rename = "type")]
    pub kind: OperationType,
    pub table_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
}

impl From<&Operation> for AuditOperation {
    fn from(op: &Operation) -> Self {
        Self {
            kind: op.kind,
            table_name: op.table_name.clone(),
            record_id: op.record_id.clone(),
            columns: op.columns.clone(),
        }
    }
}

/// Subject attributes and evaluation trace at decision time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityContext {
    pub ip_address: String,
    pub user_agent: String,
    pub role: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub policies_applied: Vec<PolicyId>,
    #[serde(default)]
    pub rules_evaluated: Vec<RuleId>,
}

/// Outcome of the evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditResult {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Rows handed back to the caller, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_returned: Option<u64>,

    /// Milliseconds
    pub execution_time: f64,

    #[serde(default)]
    pub policies_matched: u32,
    #[serde(default)]
    pub rules_matched: u32,
}

/// Immutable audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: String,
    pub organization_id: OrganizationId,
    pub user_id: String,
    pub session_id: String,
    pub operation: AuditOperation,
    pub security_context: SecurityContext,
    pub result: AuditResult,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Audit record before the recorder assigns id and timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAuditEntry {
    pub organization_id: OrganizationId,
    pub user_id: String,
    pub session_id: String,
    pub operation: AuditOperation,
    pub security_context: SecurityContext,
    pub result: AuditResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl NewAuditEntry {
    /// Build an entry describing `decision`
    pub fn from_decision(context: &Context, operation: &Operation, decision: &Decision) -> Self {
        Self {
            organization_id: context.organization_id.clone(),
            user_id: context.user_id.clone(),
            session_id: context.session_id.clone(),
            operation: AuditOperation::from(operation),
            security_context: SecurityContext {
                ip_address: context.ip_address.clone(),
                user_agent: context.user_agent.clone(),
                role: context.role.clone(),
                permissions: context.permissions.iter().cloned().collect(),
                policies_applied: decision.policies_applied.clone(),
                rules_evaluated: decision.rules_evaluated.clone(),
            },
            result: AuditResult {
                allowed: decision.allowed,
                reason: Some(decision.reason.clone()),
                data_returned: None,
                execution_time: decision.execution_time,
                policies_matched: decision.policies_matched(),
                rules_matched: decision.rules_matched(),
            },
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_data_returned(mut self, rows: u64) -> Self {
        self.result.data_returned = Some(rows);
        self
    }
}

/// Appends decisions to the audit trail
#[derive(Clone)]
pub struct AuditRecorder {
    backend: Arc<dyn RlsStore>,
    clock: Arc<dyn Clock>,
}

impl AuditRecorder {
    pub fn new(backend: Arc<dyn RlsStore>, clock: Arc<dyn Clock>) -> Self {
        Self { backend, clock }
    }

    /// Stamp and append an entry
    pub async fn record(&self, entry: NewAuditEntry) -> Result<AuditLogEntry> {
        let entry = AuditLogEntry {
            id: fresh_id("audit"),
            organization_id: entry.organization_id,
            user_id: entry.user_id,
            session_id: entry.session_id,
            operation: entry.operation,
            security_context: entry.security_context,
            result: entry.result,
            timestamp: self.clock.now_utc(),
            request_id: entry.request_id,
        };

        self.backend.append_audit_entry(entry.clone()).await?;

        info!(
            "RLS access logged: id={}, user={}, operation={}, table={}, allowed={}",
            entry.id, entry.user_id, entry.operation.kind, entry.operation.table_name, entry.result.allowed
        );

        Ok(entry)
    }

    /// Record the outcome of an evaluation
    pub async fn record_decision(
        &self,
        context: &Context,
        operation: &Operation,
        decision: &Decision,
        request_id: Option<String>,
    ) -> Result<AuditLogEntry> {
        let mut entry = NewAuditEntry::from_decision(context, operation, decision);
        entry.request_id = request_id;
        self.record(entry).await
    }

    /// Trail of an organization, oldest first
    pub async fn entries(&self, organization_id: &str) -> Result<Vec<AuditLogEntry>> {
        self.backend.list_audit_entries_by_org(organization_id).await
    }
}
