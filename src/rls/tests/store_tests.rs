//! Store and query layer tests

use chrono::{DateTime, Duration};
use cretoai_rls::policy::{
    AccessRules, ConditionType, PolicyConditions, PolicyConfiguration, RecordMetadata,
    TimeRestrictions,
};
use cretoai_rls::rule::{RuleAction, RuleConditions, RuleConfiguration};
use cretoai_rls::validation::{
    NewValidation, Severity, ValidationCheck, ValidationConfiguration, ValidationKind,
    ValidationMetadata,
};
use cretoai_rls::{
    EngineConfig, FixedClock, InMemoryStore, NewContext, NewPolicy, NewRule, OperationScope,
    OperationType, PolicyFilter, RlsEngine, RlsError, RuleActionType, RuleFilter, StoreSnapshot,
};
use serde_json::{json, Map};
use std::sync::Arc;

const ORG: &str = "org_1";

fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(
        DateTime::parse_from_rfc3339("2024-03-04T12:00:00+00:00").unwrap(),
    ))
}

fn engine_with(clock: Arc<FixedClock>) -> RlsEngine {
    RlsEngine::with_config(Arc::new(InMemoryStore::new()), clock, EngineConfig::default())
}

fn policy(table: &str, name: &str, operation: OperationScope, priority: u8) -> NewPolicy {
    NewPolicy {
        organization_id: ORG.into(),
        table_name: table.into(),
        policy_name: name.into(),
        description: None,
        configuration: PolicyConfiguration {
            operation,
            is_active: true,
            priority,
            bypass_rls: false,
        },
        conditions: PolicyConditions {
            kind: ConditionType::Simple,
            expression: "true".into(),
            parameters: Map::new(),
            dependencies: None,
        },
        access_rules: AccessRules::default(),
        metadata: RecordMetadata::authored_by("admin@example.com"),
    }
}

fn rule(name: &str, role: Option<&str>, priority: u8) -> NewRule {
    let mut conditions = RuleConditions::default();
    conditions.context.role = role.map(String::from);

    NewRule {
        organization_id: ORG.into(),
        rule_name: name.into(),
        description: None,
        configuration: RuleConfiguration {
            is_active: true,
            priority,
            evaluation_order: 0,
            stop_on_match: false,
        },
        conditions,
        actions: RuleAction::new(RuleActionType::Log),
        metadata: RecordMetadata::authored_by("admin@example.com"),
    }
}

// ============================================================================
// POLICY LISTING
// ============================================================================

#[tokio::test]
async fn test_list_policies_filters() {
    let engine = engine_with(clock());

    engine.create_policy(policy("invoices", "inv_select", OperationScope::Select, 5)).await.unwrap();
    engine.create_policy(policy("invoices", "inv_all", OperationScope::All, 7)).await.unwrap();
    engine.create_policy(policy("invoices", "inv_delete", OperationScope::Delete, 9)).await.unwrap();
    let mut inactive = policy("invoices", "inv_off", OperationScope::Select, 10);
    inactive.configuration.is_active = false;
    engine.create_policy(inactive).await.unwrap();
    engine.create_policy(policy("customers", "cust", OperationScope::All, 10)).await.unwrap();

    let names = |policies: Vec<cretoai_rls::Policy>| -> Vec<String> {
        policies.into_iter().map(|p| p.policy_name).collect()
    };

    let select = engine
        .list_policies(ORG, &PolicyFilter::applicable("invoices", OperationType::Select))
        .await
        .unwrap();
    assert_eq!(names(select), vec!["inv_all", "inv_select"]);

    let all_invoices = engine
        .list_policies(
            ORG,
            &PolicyFilter {
                table_name: Some("invoices".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(names(all_invoices), vec!["inv_off", "inv_delete", "inv_all", "inv_select"]);

    let limited = engine
        .list_policies(
            ORG,
            &PolicyFilter {
                limit: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(names(limited), vec!["inv_off", "cust"]);

    assert!(engine
        .list_policies("org_2", &PolicyFilter::default())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_list_rules_role_filter() {
    let engine = engine_with(clock());

    engine.create_rule(rule("any_role", None, 3)).await.unwrap();
    engine.create_rule(rule("admins", Some("admin"), 8)).await.unwrap();
    engine.create_rule(rule("users", Some("user"), 9)).await.unwrap();

    let for_admin: Vec<String> = engine
        .list_rules(ORG, &RuleFilter::applicable("admin"))
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.rule_name)
        .collect();
    assert_eq!(for_admin, vec!["admins", "any_role"]);

    let everything = engine.list_rules(ORG, &RuleFilter::default()).await.unwrap();
    assert_eq!(everything.len(), 3);
    assert_eq!(everything[0].rule_name, "users");
}

// ============================================================================
// CREATE-TIME VALIDATION
// ============================================================================

#[tokio::test]
async fn test_create_rejects_out_of_range_priority() {
    let engine = engine_with(clock());

    for priority in [0u8, 11] {
        let err = engine
            .create_policy(policy("invoices", "bad", OperationScope::All, priority))
            .await
            .unwrap_err();
        assert!(matches!(err, RlsError::InvalidPolicy(_)));

        let err = engine.create_rule(rule("bad", None, priority)).await.unwrap_err();
        assert!(matches!(err, RlsError::InvalidRule(_)));
    }

    assert!(engine.list_policies(ORG, &PolicyFilter::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_rejects_malformed_time_window() {
    let engine = engine_with(clock());

    let mut bad_time = policy("invoices", "bad_time", OperationScope::All, 5);
    bad_time.access_rules.time_restrictions = Some(TimeRestrictions {
        start_time: Some("25:00".into()),
        ..Default::default()
    });
    assert!(matches!(
        engine.create_policy(bad_time).await,
        Err(RlsError::InvalidPolicy(_))
    ));

    let mut bad_day = policy("invoices", "bad_day", OperationScope::All, 5);
    bad_day.access_rules.time_restrictions = Some(TimeRestrictions {
        days_of_week: Some(vec![7]),
        ..Default::default()
    });
    assert!(engine.create_policy(bad_day).await.is_err());

    let empty_table = policy("", "no_table", OperationScope::All, 5);
    assert!(engine.create_policy(empty_table).await.is_err());
}

#[tokio::test]
async fn test_save_rejects_what_create_rejects() {
    let engine = engine_with(clock());

    let stored = engine
        .create_policy(policy("invoices", "inv", OperationScope::All, 5))
        .await
        .unwrap();

    let mut bad_time = stored.clone();
    bad_time.access_rules.time_restrictions = Some(TimeRestrictions {
        start_time: Some("25:99".into()),
        ..Default::default()
    });
    assert!(matches!(
        engine.save_policy(bad_time).await,
        Err(RlsError::InvalidPolicy(_))
    ));

    let mut no_table = stored.clone();
    no_table.table_name = String::new();
    assert!(matches!(
        engine.save_policy(no_table).await,
        Err(RlsError::InvalidPolicy(_))
    ));

    let listed = engine.list_policies(ORG, &PolicyFilter::default()).await.unwrap();
    assert_eq!(listed, vec![stored]);

    let stored_rule = engine.create_rule(rule("r", None, 5)).await.unwrap();
    let mut nameless = stored_rule.clone();
    nameless.rule_name = " ".into();
    assert!(matches!(
        engine.save_rule(nameless).await,
        Err(RlsError::InvalidRule(_))
    ));
    assert_eq!(
        engine.list_rules(ORG, &RuleFilter::default()).await.unwrap(),
        vec![stored_rule]
    );
}

// ============================================================================
// UPDATES
// ============================================================================

#[tokio::test]
async fn test_save_policy_bumps_updated_at() {
    let clock = clock();
    let engine = engine_with(clock.clone());

    let mut stored = engine
        .create_policy(policy("invoices", "inv", OperationScope::All, 5))
        .await
        .unwrap();
    let created_at = stored.created_at;

    clock.advance(Duration::hours(1));
    stored.configuration.priority = 8;
    let saved = engine.save_policy(stored).await.unwrap();

    assert_eq!(saved.created_at, created_at);
    assert_eq!(saved.updated_at, created_at + Duration::hours(1));

    let listed = engine.list_policies(ORG, &PolicyFilter::default()).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].configuration.priority, 8);
}

#[tokio::test]
async fn test_save_unknown_rule_is_not_found() {
    let engine = engine_with(clock());
    let other = engine_with(clock());

    let foreign = other.create_rule(rule("elsewhere", None, 5)).await.unwrap();
    assert!(matches!(
        engine.save_rule(foreign).await,
        Err(RlsError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_save_cannot_move_records_between_organizations() {
    let engine = engine_with(clock());

    let stored = engine
        .create_policy(policy("invoices", "inv", OperationScope::All, 5))
        .await
        .unwrap();
    let mut moved = stored.clone();
    moved.organization_id = "org_2".into();
    assert!(matches!(
        engine.save_policy(moved).await,
        Err(RlsError::InvalidPolicy(_))
    ));

    let stored_rule = engine.create_rule(rule("r", None, 5)).await.unwrap();
    let mut moved_rule = stored_rule.clone();
    moved_rule.organization_id = "org_2".into();
    assert!(matches!(
        engine.save_rule(moved_rule).await,
        Err(RlsError::InvalidRule(_))
    ));

    assert!(engine
        .list_policies("org_2", &PolicyFilter::default())
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        engine.list_policies(ORG, &PolicyFilter::default()).await.unwrap(),
        vec![stored]
    );
}

// ============================================================================
// CONTEXTS, VALIDATIONS, SNAPSHOTS
// ============================================================================

#[tokio::test]
async fn test_context_registry_through_engine() {
    let engine = engine_with(clock());

    assert!(engine.get_context("missing").await.unwrap().is_none());

    let ctx = engine
        .register_context(NewContext::new("user_1", ORG, "admin", "s1").with_permission("read"))
        .await
        .unwrap();
    assert_eq!(engine.get_context("s1").await.unwrap(), Some(ctx));
}

#[tokio::test]
async fn test_validations_are_stored() {
    let engine = engine_with(clock());

    let draft = NewValidation {
        organization_id: ORG.into(),
        validation_name: "orphan_invoices".into(),
        description: None,
        configuration: ValidationConfiguration {
            is_active: true,
            severity: Severity::High,
            auto_fix: false,
            notification_enabled: true,
        },
        validation_rules: vec![ValidationCheck {
            kind: ValidationKind::DataIntegrity,
            expression: "SELECT COUNT(*) FROM invoices WHERE organization_id IS NULL".into(),
            expected_result: json!(0),
            error_message: "Invoices without an organization exist".into(),
        }],
        metadata: ValidationMetadata {
            created_by: "admin@example.com".into(),
            last_modified_by: "admin@example.com".into(),
            version: 1,
        },
    };

    let stored = engine.create_validation(draft.clone()).await.unwrap();
    assert!(stored.id.starts_with("validation_"));
    assert_eq!(engine.list_validations(ORG).await.unwrap(), vec![stored]);

    let mut nameless = draft;
    nameless.validation_name = " ".into();
    assert!(matches!(
        engine.create_validation(nameless).await,
        Err(RlsError::InvalidValidation(_))
    ));
}

#[tokio::test]
async fn test_snapshot_roundtrip_keeps_order() {
    let raw = include_str!("../fixtures/demo_snapshot.json");
    let snapshot: StoreSnapshot = serde_json::from_str(raw).unwrap();
    let store = InMemoryStore::from_snapshot(snapshot.clone());

    let dumped = store.snapshot().await;
    assert_eq!(dumped.policies, snapshot.policies);
    assert_eq!(dumped.rules, snapshot.rules);
    assert_eq!(dumped.audit_log, snapshot.audit_log);
    assert_eq!(dumped.contexts.len(), 2);
    assert_eq!(dumped.contexts[0].session_id, "session_1");
}

#[tokio::test]
async fn test_demo_snapshot_decisions() {
    let raw = include_str!("../fixtures/demo_snapshot.json");
    let snapshot: StoreSnapshot = serde_json::from_str(raw).unwrap();
    let clock = clock();
    let engine = RlsEngine::with_config(
        Arc::new(InMemoryStore::from_snapshot(snapshot)),
        clock.clone(),
        EngineConfig::default(),
    );

    let admin = engine.get_context("session_1").await.unwrap().unwrap();

    // Monday 12:00: the admin rule's ALL operation never matches, policy_1 grants
    let decision = engine
        .evaluate_access(&admin, &cretoai_rls::Operation::select("invoices"))
        .await
        .unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.rules_evaluated, vec!["rule_1"]);
    assert_eq!(decision.policies_applied, vec!["policy_1"]);

    // Saturday: outside policy_1's weekdays
    clock.set(DateTime::parse_from_rfc3339("2024-03-09T12:00:00+00:00").unwrap());
    let decision = engine
        .evaluate_access(&admin, &cretoai_rls::Operation::select("invoices"))
        .await
        .unwrap();
    assert!(!decision.allowed);
}
