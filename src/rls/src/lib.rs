//! # CretoAI Row-Level Security Engine
//!
//! Multi-tenant access-control decisions for table operations.
//!
//! ## Features
//!
//! - **Two-phase evaluation**: prioritized rules first, then table policies
//! - **Default deny** when nothing grants access
//! - **Policy templates** for public, organization, user and admin access
//! - **Append-only audit trail** with on-demand statistics
//! - **Pluggable storage**: in-memory, or PostgreSQL with the `postgres` feature
//!
//! ## Example
//!
//! ```rust
//! use cretoai_rls::{AccessLevel, NewContext, Operation, OperationType, PolicyRequirements, RlsEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = RlsEngine::in_memory();
//!
//!     engine
//!         .generate_policy(
//!             "org_1",
//!             "invoices",
//!             &PolicyRequirements::new(AccessLevel::Organization, vec![OperationType::Select])
//!                 .with_roles(["accountant"]),
//!         )
//!         .await?;
//!
//!     let context = engine
//!         .register_context(NewContext::new("alice", "org_1", "accountant", "session_1"))
//!         .await?;
//!
//!     let operation = Operation::select("invoices");
//!     let decision = engine.evaluate_access(&context, &operation).await?;
//!     engine.record_decision(&context, &operation, &decision, None).await?;
//!
//!     if decision.allowed {
//!         println!("Access granted: {}", decision.reason);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod clock;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod policy;
pub mod rule;
pub mod service;
pub mod stats;
pub mod store;
pub mod synthesis;
pub mod types;
pub mod validation;

// Re-export commonly used types
pub use audit::{AuditLogEntry, AuditRecorder, NewAuditEntry};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::EngineConfig;
pub use context::ContextRegistry;
pub use engine::{Decision, DecisionSource, PolicyEngine};
pub use error::{Result, RlsError};
pub use policy::{NewPolicy, Policy, PolicyFilter};
pub use rule::{NewRule, Rule, RuleActionType, RuleFilter};
pub use service::RlsEngine;
pub use stats::{RlsStats, StatsAggregator};
pub use store::{InMemoryStore, PolicyStore, RlsStore, RuleStore, StoreSnapshot};
pub use synthesis::{AccessLevel, PolicyRequirements, PolicySynthesizer};
pub use types::{Context, NewContext, Operation, OperationScope, OperationType};
pub use validation::{NewValidation, Validation};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
