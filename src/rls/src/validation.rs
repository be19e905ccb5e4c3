//! Compliance validation definitions

use crate::error::{Result, RlsError};
use crate::types::OrganizationId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationKind {
    DataIntegrity,
    AccessControl,
    Performance,
    Compliance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationConfiguration {
    pub is_active: bool,
    pub severity: Severity,
    #[serde(default)]
    pub auto_fix: bool,
    #[serde(default)]
    pub notification_enabled: bool,
}

/// One check. `expression` is stored for external runners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationCheck {
    #[serde(rename = "type")]
    pub kind: ValidationKind,
    pub expression: String,
    #[serde(default)]
    pub expected_result: Value,
    pub error_message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationMetadata {
    pub created_by: String,
    pub last_modified_by: String,
    pub version: u32,
}

/// Stored validation definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Validation {
    pub id: String,
    pub organization_id: OrganizationId,
    pub validation_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub configuration: ValidationConfiguration,
    #[serde(default)]
    pub validation_rules: Vec<ValidationCheck>,
    pub metadata: ValidationMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewValidation {
    pub organization_id: OrganizationId,
    pub validation_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub configuration: ValidationConfiguration,
    #[serde(default)]
    pub validation_rules: Vec<ValidationCheck>,
    pub metadata: ValidationMetadata,
}

impl NewValidation {
    pub fn validate(&self) -> Result<()> {
        if self.organization_id.trim().is_empty() {
            return Err(RlsError::InvalidValidation("organizationId is required".into()));
        }
        if self.validation_name.trim().is_empty() {
            return Err(RlsError::InvalidValidation("validationName is required".into()));
        }
        Ok(())
    }

    pub fn into_validation(self, id: String, now: DateTime<Utc>) -> Validation {
        Validation {
            id,
            organization_id: self.organization_id,
            validation_name: self.validation_name,
            description: self.description,
            configuration: self.configuration,
            validation_rules: self.validation_rules,
            metadata: self.metadata,
            created_at: now,
            updated_at: now,
        }
    }
}
