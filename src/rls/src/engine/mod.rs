//! Two-phase access decision engine
//!
//! Rules are evaluated first, in priority order, and may settle the
//! outcome on their own. Policies scoped to the target table and operation
//! are evaluated next; the first one whose predicate holds grants access.
//! Anything else is denied.

pub mod decision;

pub use decision::{Decision, DecisionSource, DENIED_BY_RULE, NO_APPLICABLE_GRANT};

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::policy::PolicyFilter;
use crate::rule::{RuleActionType, RuleFilter};
use crate::store::{PolicyStore, RuleStore};
use crate::types::{Context, Operation, PolicyId, RuleId};

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Decision engine over the rule and policy stores
///
/// # Pipeline
///
/// ```text
/// Context + Operation
///        ↓
/// RuleStore (active, role-scoped, priority desc)
///        ↓ allow / deny short-circuit, stopOnMatch ends phase
/// PolicyStore (table + operation, active, priority desc)
///        ↓ first matching policy allows
/// default deny
/// ```
#[derive(Clone)]
pub struct PolicyEngine {
    policies: PolicyStore,
    rules: RuleStore,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl PolicyEngine {
    pub fn new(
        policies: PolicyStore,
        rules: RuleStore,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            policies,
            rules,
            clock,
            config,
        }
    }

    /// Decide whether `context` may perform `operation`.
    ///
    /// Every rule and policy looked at is listed in the decision trace,
    /// including the ones that did not match. Store failures propagate as
    /// errors; a store that misses the configured deadline yields a deny.
    pub async fn evaluate_access(&self, context: &Context, operation: &Operation) -> Result<Decision> {
        let start = Instant::now();
        let mut rules_evaluated: Vec<RuleId> = Vec::new();
        let mut policies_applied: Vec<PolicyId> = Vec::new();

        debug!(
            "Access evaluation: organization={}, user={}, role={}, operation={}, table={}",
            context.organization_id, context.user_id, context.role, operation.kind, operation.table_name
        );

        // Step 1: Rules, highest priority first
        let rule_filter = RuleFilter::applicable(context.role.clone());
        let Some(rules) = self
            .bounded(self.rules.list(&context.organization_id, &rule_filter))
            .await?
        else {
            return Ok(self.timed_out(policies_applied, rules_evaluated).timed(start.elapsed()));
        };

        for rule in &rules {
            rules_evaluated.push(rule.id.clone());
            debug!("Evaluating rule: {} (priority={})", rule.id, rule.configuration.priority);

            if rule.matches(context, operation) {
                let message = rule.actions.message.clone().filter(|m| !m.trim().is_empty());

                let kind = rule.actions.kind;

                if kind.is_terminal() {
                    let allowed = kind == RuleActionType::Allow;
                    let reason = match message {
                        Some(message) => message,
                        None if allowed => format!("Access permitted by rule {}", rule.rule_name),
                        None => DENIED_BY_RULE.to_string(),
                    };
                    info!(
                        "Decision: {} by rule '{}' ({})",
                        if allowed { "ALLOW" } else { "DENY" },
                        rule.rule_name,
                        rule.id
                    );
                    return Ok(Decision::by_rule(allowed, rule.id.clone(), reason, rules_evaluated)
                        .timed(start.elapsed()));
                }

                debug!("Rule {} matched with non-terminal action {:?}", rule.id, kind);
            }

            // Ends the phase whether or not this rule matched
            if rule.configuration.stop_on_match {
                debug!("Rule {} has stopOnMatch, leaving rule phase", rule.id);
                break;
            }
        }

        // Step 2: Policies scoped to the table and operation
        let policy_filter = PolicyFilter::applicable(operation.table_name.clone(), operation.kind);
        let Some(policies) = self
            .bounded(self.policies.list(&context.organization_id, &policy_filter))
            .await?
        else {
            return Ok(self.timed_out(policies_applied, rules_evaluated).timed(start.elapsed()));
        };

        let now = self.clock.now();
        for policy in &policies {
            policies_applied.push(policy.id.clone());
            debug!("Evaluating policy: {} (priority={})", policy.id, policy.configuration.priority);

            if policy.permits(context, now) {
                info!("Decision: ALLOW by policy '{}' ({})", policy.policy_name, policy.id);
                return Ok(Decision::by_policy(
                    policy.id.clone(),
                    &policy.policy_name,
                    policies_applied,
                    rules_evaluated,
                )
                .timed(start.elapsed()));
            }
        }

        debug!(
            "No grant after {} rules and {} policies",
            rules_evaluated.len(),
            policies_applied.len()
        );
        info!(
            "Decision: DENY (default) for user={} on {}",
            context.user_id, operation.table_name
        );

        Ok(Decision::deny(NO_APPLICABLE_GRANT, policies_applied, rules_evaluated).timed(start.elapsed()))
    }

    /// Run a store fetch under the configured deadline. `None` means it expired.
    async fn bounded<T, F>(&self, fetch: F) -> Result<Option<T>>
    where
        F: Future<Output = Result<T>>,
    {
        match self.config.store_timeout() {
            Some(limit) => match tokio::time::timeout(limit, fetch).await {
                Ok(result) => result.map(Some),
                Err(_) => Ok(None),
            },
            None => fetch.await.map(Some),
        }
    }

    fn timed_out(&self, policies_applied: Vec<PolicyId>, rules_evaluated: Vec<RuleId>) -> Decision {
        warn!(
            "Store fetch exceeded {}ms, denying access",
            self.config.store_timeout_ms
        );
        Decision::deny(
            format!(
                "Access denied: policy store did not respond within {}ms",
                self.config.store_timeout_ms
            ),
            policies_applied,
            rules_evaluated,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::store::InMemoryStore;
    use crate::types::NewContext;
    use chrono::Utc;

    #[tokio::test]
    async fn test_empty_store_denies() {
        let backend = Arc::new(InMemoryStore::new());
        let clock: Arc<dyn Clock> =
            Arc::new(FixedClock::at_rfc3339("2024-03-04T12:00:00+00:00").unwrap());
        let engine = PolicyEngine::new(
            PolicyStore::new(backend.clone(), clock.clone()),
            RuleStore::new(backend, clock.clone()),
            clock,
            EngineConfig::default(),
        );

        let context = NewContext::new("user_1", "org_1", "admin", "s1").stamp(Utc::now());
        let decision = engine
            .evaluate_access(&context, &Operation::select("invoices"))
            .await
            .unwrap();

        assert!(!decision.allowed);
        assert_eq!(decision.reason, NO_APPLICABLE_GRANT);
        assert!(decision.policies_applied.is_empty());
        assert!(decision.rules_evaluated.is_empty());
    }
}
