//! Policy generation tests

use cretoai_rls::policy::ConditionType;
use cretoai_rls::{
    AccessLevel, NewContext, Operation, OperationScope, OperationType, PolicyFilter,
    PolicyRequirements, RlsEngine,
};

const ORG: &str = "org_1";

#[tokio::test]
async fn test_generate_organization_select_policy() {
    let engine = RlsEngine::in_memory();

    let policy = engine
        .generate_policy(
            ORG,
            "invoices",
            &PolicyRequirements::new(AccessLevel::Organization, vec![OperationType::Select])
                .with_roles(["user"]),
        )
        .await
        .unwrap();

    assert!(policy.id.starts_with("policy_"));
    assert_eq!(policy.configuration.operation, OperationScope::Select);
    assert_eq!(policy.configuration.priority, 5);
    assert!(policy.configuration.is_active);
    assert!(!policy.configuration.bypass_rls);
    assert_eq!(policy.conditions.expression, "organization_id = $1");
    assert_eq!(policy.conditions.kind, ConditionType::Simple);
    assert_eq!(policy.policy_name, "invoices_organization_access");
    assert_eq!(
        policy.description.as_deref(),
        Some("Auto-generated policy for invoices with organization access level")
    );
    assert_eq!(policy.metadata.created_by, "system");
    assert_eq!(policy.metadata.version, 1);
    assert_eq!(policy.created_at, policy.updated_at);
}

#[tokio::test]
async fn test_generated_policy_is_stored_and_enforced() {
    let engine = RlsEngine::in_memory();

    let policy = engine
        .generate_policy(
            ORG,
            "users",
            &PolicyRequirements::new(
                AccessLevel::Admin,
                vec![OperationType::Select, OperationType::Update],
            )
            .with_roles(["admin"]),
        )
        .await
        .unwrap();

    assert_eq!(policy.configuration.priority, 10);
    assert_eq!(policy.configuration.operation, OperationScope::All);

    let listed = engine
        .list_policies(ORG, &PolicyFilter::default())
        .await
        .unwrap();
    assert_eq!(listed, vec![policy.clone()]);

    let admin = engine
        .register_context(NewContext::new("user_1", ORG, "admin", "s1"))
        .await
        .unwrap();
    let decision = engine
        .evaluate_access(&admin, &Operation::new(OperationType::Delete, "users"))
        .await
        .unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.reason, "Access permitted by policy users_admin_access");

    let viewer = engine
        .register_context(NewContext::new("user_2", ORG, "viewer", "s2"))
        .await
        .unwrap();
    let decision = engine
        .evaluate_access(&viewer, &Operation::select("users"))
        .await
        .unwrap();
    assert!(!decision.allowed);
}

#[tokio::test]
async fn test_no_roles_matches_nobody() {
    let engine = RlsEngine::in_memory();

    engine
        .generate_policy(
            ORG,
            "articles",
            &PolicyRequirements::new(AccessLevel::Public, vec![OperationType::Select]),
        )
        .await
        .unwrap();

    let ctx = engine
        .register_context(NewContext::new("user_1", ORG, "admin", "s1"))
        .await
        .unwrap();
    let decision = engine
        .evaluate_access(&ctx, &Operation::select("articles"))
        .await
        .unwrap();

    assert!(!decision.allowed);
    assert_eq!(decision.policies_applied.len(), 1);
}

#[test]
fn test_requirements_wire_format() {
    let req: PolicyRequirements = serde_json::from_str(
        r#"{"accessLevel":"user","operations":["SELECT","INSERT"],"roles":["user"],"additionalConditions":"archived = false"}"#,
    )
    .unwrap();

    assert_eq!(req.access_level, AccessLevel::User);
    assert_eq!(req.operations.len(), 2);
    assert_eq!(req.additional_conditions.as_deref(), Some("archived = false"));
}
