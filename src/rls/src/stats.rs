//! Statistics derived from the audit trail
//!
//! Nothing here is maintained incrementally: every call scans the
//! organization's policies, rules, validations and audit entries.

use crate::audit::AuditLogEntry;
use crate::clock::Clock;
use crate::error::Result;
use crate::policy::Policy;
use crate::rule::Rule;
use crate::store::RlsStore;
use crate::types::{OperationType, PolicyId, RuleId};
use crate::validation::Validation;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Totals over the whole trail
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessStats {
    pub total_access_attempts: usize,
    pub allowed_access: usize,
    pub denied_access: usize,

    /// Mean decision time in milliseconds, 0 when the trail is empty
    pub average_execution_time: f64,
}

impl AccessStats {
    /// Share of attempts that were allowed
    pub fn allow_rate(&self) -> f64 {
        if self.total_access_attempts == 0 {
            0.0
        } else {
            self.allowed_access as f64 / self.total_access_attempts as f64
        }
    }
}

/// Counts for entries inside a trailing window
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowStats {
    pub access_attempts: usize,
    pub allowed_access: usize,
    pub denied_access: usize,
}

impl WindowStats {
    fn count(&mut self, allowed: bool) {
        self.access_attempts += 1;
        if allowed {
            self.allowed_access += 1;
        } else {
            self.denied_access += 1;
        }
    }
}

/// Attempts per operation type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationCounts {
    #[serde(rename = "SELECT")]
    pub select: usize,
    #[serde(rename = "INSERT")]
    pub insert: usize,
    #[serde(rename = "UPDATE")]
    pub update: usize,
    #[serde(rename = "DELETE")]
    pub delete: usize,
}

impl OperationCounts {
    pub fn get(&self, kind: OperationType) -> usize {
        match kind {
            OperationType::Select => self.select,
            OperationType::Insert => self.insert,
            OperationType::Update => self.update,
            OperationType::Delete => self.delete,
        }
    }

    fn bump(&mut self, kind: OperationType) {
        match kind {
            OperationType::Select => self.select += 1,
            OperationType::Insert => self.insert += 1,
            OperationType::Update => self.update += 1,
            OperationType::Delete => self.delete += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyUsage {
    pub policy_id: PolicyId,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleUsage {
    pub rule_id: RuleId,
    pub count: usize,
}

/// Organization statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RlsStats {
    pub total_policies: usize,
    pub active_policies: usize,
    pub total_rules: usize,
    pub active_rules: usize,
    pub total_validations: usize,
    pub active_validations: usize,
    pub access_stats: AccessStats,
    #[serde(rename = "last24Hours")]
    pub last_24_hours: WindowStats,
    #[serde(rename = "last7Days")]
    pub last_7_days: WindowStats,
    pub by_operation: OperationCounts,
    pub by_table: BTreeMap<String, usize>,
    pub by_user: BTreeMap<String, usize>,
    pub top_policies: Vec<PolicyUsage>,
    pub top_rules: Vec<RuleUsage>,
}

impl RlsStats {
    /// Derive statistics from already-fetched records.
    ///
    /// Window membership is `timestamp >= now - window`.
    pub fn from_records(
        policies: &[Policy],
        rules: &[Rule],
        validations: &[Validation],
        entries: &[AuditLogEntry],
        now: DateTime<Utc>,
        top_n: usize,
    ) -> Self {
        let day_ago = now - Duration::hours(24);
        let week_ago = now - Duration::days(7);

        let mut stats = RlsStats {
            total_policies: policies.len(),
            active_policies: policies.iter().filter(|p| p.configuration.is_active).count(),
            total_rules: rules.len(),
            active_rules: rules.iter().filter(|r| r.configuration.is_active).count(),
            total_validations: validations.len(),
            active_validations: validations
                .iter()
                .filter(|v| v.configuration.is_active)
                .count(),
            ..Default::default()
        };

        let mut total_time = 0.0;
        for entry in entries {
            let allowed = entry.result.allowed;

            stats.access_stats.total_access_attempts += 1;
            if allowed {
                stats.access_stats.allowed_access += 1;
            } else {
                stats.access_stats.denied_access += 1;
            }
            total_time += entry.result.execution_time;

            if entry.timestamp >= day_ago {
                stats.last_24_hours.count(allowed);
            }
            if entry.timestamp >= week_ago {
                stats.last_7_days.count(allowed);
            }

            stats.by_operation.bump(entry.operation.kind);
            *stats
                .by_table
                .entry(entry.operation.table_name.clone())
                .or_insert(0) += 1;
            *stats.by_user.entry(entry.user_id.clone()).or_insert(0) += 1;
        }

        if !entries.is_empty() {
            stats.access_stats.average_execution_time = total_time / entries.len() as f64;
        }

        stats.top_policies = rank(
            entries
                .iter()
                .flat_map(|e| e.security_context.policies_applied.iter()),
            top_n,
        )
        .into_iter()
        .map(|(policy_id, count)| PolicyUsage { policy_id, count })
        .collect();

        stats.top_rules = rank(
            entries
                .iter()
                .flat_map(|e| e.security_context.rules_evaluated.iter()),
            top_n,
        )
        .into_iter()
        .map(|(rule_id, count)| RuleUsage { rule_id, count })
        .collect();

        stats
    }
}

/// Count ids, order by count descending, ties kept in first-seen order
fn rank<'a>(ids: impl Iterator<Item = &'a String>, top_n: usize) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut slots: HashMap<&'a str, usize> = HashMap::new();

    for id in ids {
        match slots.get(id.as_str()) {
            Some(&slot) => counts[slot].1 += 1,
            None => {
                slots.insert(id.as_str(), counts.len());
                counts.push((id.clone(), 1));
            }
        }
    }

    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.truncate(top_n);
    counts
}

/// Computes [`RlsStats`] on demand
#[derive(Clone)]
pub struct StatsAggregator {
    backend: Arc<dyn RlsStore>,
    clock: Arc<dyn Clock>,
    top_n: usize,
}

impl StatsAggregator {
    pub fn new(backend: Arc<dyn RlsStore>, clock: Arc<dyn Clock>, top_n: usize) -> Self {
        Self {
            backend,
            clock,
            top_n,
        }
    }

    pub async fn get_stats(&self, organization_id: &str) -> Result<RlsStats> {
        let (policies, rules, validations, entries) = tokio::try_join!(
            self.backend.list_policies_by_org(organization_id),
            self.backend.list_rules_by_org(organization_id),
            self.backend.list_validations_by_org(organization_id),
            self.backend.list_audit_entries_by_org(organization_id),
        )?;

        debug!(
            "Computing stats for {}: {} policies, {} rules, {} audit entries",
            organization_id,
            policies.len(),
            rules.len(),
            entries.len()
        );

        Ok(RlsStats::from_records(
            &policies,
            &rules,
            &validations,
            &entries,
            self.clock.now_utc(),
            self.top_n,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_rank_ties_keep_first_seen_order() {
        let seen = ids(&["p2", "p1", "p1", "p2", "p3"]);
        let ranked = rank(seen.iter(), 10);

        assert_eq!(
            ranked,
            vec![("p2".to_string(), 2), ("p1".to_string(), 2), ("p3".to_string(), 1)]
        );
    }

    #[test]
    fn test_rank_truncates() {
        let seen = ids(&["a", "b", "b", "c", "c", "c"]);
        let ranked = rank(seen.iter(), 2);

        assert_eq!(ranked, vec![("c".to_string(), 3), ("b".to_string(), 2)]);
    }

    #[test]
    fn test_empty_trail() {
        let stats = RlsStats::from_records(&[], &[], &[], &[], Utc::now(), 10);

        assert_eq!(stats.access_stats.total_access_attempts, 0);
        assert_eq!(stats.access_stats.average_execution_time, 0.0);
        assert_eq!(stats.access_stats.allow_rate(), 0.0);
        assert!(stats.top_policies.is_empty());
    }

    #[test]
    fn test_wire_names() {
        let json = serde_json::to_value(RlsStats::default()).unwrap();

        assert!(json.get("last24Hours").is_some());
        assert!(json.get("last7Days").is_some());
        assert_eq!(json["byOperation"]["SELECT"], 0);
        assert_eq!(json["accessStats"]["totalAccessAttempts"], 0);
    }
}
