//! Core request types: who is asking and what they want to do

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Unique policy identifier
pub type PolicyId = String;

/// Unique rule identifier
pub type RuleId = String;

/// Organization (tenant) identifier
pub type OrganizationId = String;

/// Data operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationType {
    Select,
    Insert,
    Update,
    Delete,
}

impl OperationType {
    /// All operation types, in reporting order
    pub const ALL: [OperationType; 4] = [
        OperationType::Select,
        OperationType::Insert,
        OperationType::Update,
        OperationType::Delete,
    ];

    /// SQL keyword for this operation
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Select => "SELECT",
            OperationType::Insert => "INSERT",
            OperationType::Update => "UPDATE",
            OperationType::Delete => "DELETE",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OperationType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SELECT" => Ok(OperationType::Select),
            "INSERT" => Ok(OperationType::Insert),
            "UPDATE" => Ok(OperationType::Update),
            "DELETE" => Ok(OperationType::Delete),
            other => Err(format!("unknown operation '{}'", other)),
        }
    }
}

/// Operation a policy or rule is declared for. `All` covers every type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationScope {
    Select,
    Insert,
    Update,
    Delete,
    All,
}

impl OperationScope {
    /// True if this scope is exactly `kind` (no wildcard expansion)
    pub fn is(&self, kind: OperationType) -> bool {
        *self == OperationScope::from(kind)
    }

    /// True if this scope is `kind` or `All`
    pub fn covers(&self, kind: OperationType) -> bool {
        *self == OperationScope::All || self.is(kind)
    }
}

impl From<OperationType> for OperationScope {
    fn from(kind: OperationType) -> Self {
        match kind {
            OperationType::Select => OperationScope::Select,
            OperationType::Insert => OperationScope::Insert,
            OperationType::Update => OperationScope::Update,
            OperationType::Delete => OperationScope::Delete,
        }
    }
}

/// Security context for one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    pub user_id: String,
    pub organization_id: OrganizationId,
    pub role: String,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
    pub session_id: String,
    pub ip_address: String,
    pub user_agent: String,

    /// When the context was registered
    pub timestamp: DateTime<Utc>,
}

impl Context {
    /// True if the subject holds every permission in `required`
    pub fn has_permissions<'a, I>(&self, required: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        required.into_iter().all(|p| self.permissions.contains(p))
    }
}

/// Context as supplied by the caller, before the registry stamps it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContext {
    pub user_id: String,
    pub organization_id: OrganizationId,
    pub role: String,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
    pub session_id: String,
    pub ip_address: String,
    pub user_agent: String,
}

impl NewContext {
    pub fn new(
        user_id: impl Into<String>,
        organization_id: impl Into<String>,
        role: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            organization_id: organization_id.into(),
            role: role.into(),
            permissions: BTreeSet::new(),
            session_id: session_id.into(),
            ip_address: String::new(),
            user_agent: String::new(),
        }
    }

    /// Grant a permission
    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.insert(permission.into());
        self
    }

    /// Set the client address
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = ip.into();
        self
    }

    /// Set the client user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Stamp the context with its registration time
    pub fn stamp(self, timestamp: DateTime<Utc>) -> Context {
        Context {
            user_id: self.user_id,
            organization_id: self.organization_id,
            role: self.role,
            permissions: self.permissions,
            session_id: self.session_id,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            timestamp,
        }
    }
}

/// Data-access action being authorized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(rename = "type")]
    pub kind: OperationType,
    pub table_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
}

impl Operation {
    pub fn new(kind: OperationType, table_name: impl Into<String>) -> Self {
        Self {
            kind,
            table_name: table_name.into(),
            record_id: None,
            columns: None,
        }
    }

    pub fn select(table_name: impl Into<String>) -> Self {
        Self::new(OperationType::Select, table_name)
    }

    /// Target a single record
    pub fn with_record(mut self, record_id: impl Into<String>) -> Self {
        self.record_id = Some(record_id.into());
        self
    }

    /// Restrict to a column list
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }
}
