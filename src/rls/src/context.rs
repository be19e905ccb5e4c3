//! Session security context registry

use crate::clock::Clock;
use crate::error::Result;
use crate::store::RlsStore;
use crate::types::{Context, NewContext};
use std::sync::Arc;
use tracing::info;

/// Stores and retrieves security contexts by session id
#[derive(Clone)]
pub struct ContextRegistry {
    backend: Arc<dyn RlsStore>,
    clock: Arc<dyn Clock>,
}

impl ContextRegistry {
    pub fn new(backend: Arc<dyn RlsStore>, clock: Arc<dyn Clock>) -> Self {
        Self { backend, clock }
    }

    /// Stamp and store a context, replacing any earlier one for the session
    pub async fn register(&self, context: NewContext) -> Result<Context> {
        let context = context.stamp(self.clock.now_utc());
        self.backend.put_context(context.clone()).await?;

        info!(
            "RLS context created: session={}, user={}, organization={}, role={}",
            context.session_id, context.user_id, context.organization_id, context.role
        );

        Ok(context)
    }

    /// Context for a session; `None` means no active session
    pub async fn get(&self, session_id: &str) -> Result<Option<Context>> {
        self.backend.get_context(session_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::store::InMemoryStore;
    use chrono::Duration;

    #[tokio::test]
    async fn test_register_and_get() {
        let clock = Arc::new(FixedClock::at_rfc3339("2024-03-04T09:00:00+00:00").unwrap());
        let registry = ContextRegistry::new(Arc::new(InMemoryStore::new()), clock.clone());

        let stored = registry
            .register(NewContext::new("user_1", "org_1", "admin", "session_1").with_permission("read"))
            .await
            .unwrap();
        assert_eq!(stored.timestamp, clock.now_utc());

        let fetched = registry.get("session_1").await.unwrap().unwrap();
        assert_eq!(fetched, stored);
        assert!(registry.get("session_missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reregister_overwrites() {
        let clock = Arc::new(FixedClock::at_rfc3339("2024-03-04T09:00:00+00:00").unwrap());
        let registry = ContextRegistry::new(Arc::new(InMemoryStore::new()), clock.clone());

        registry
            .register(NewContext::new("user_1", "org_1", "user", "session_1"))
            .await
            .unwrap();
        clock.advance(Duration::minutes(5));
        registry
            .register(NewContext::new("user_1", "org_1", "admin", "session_1"))
            .await
            .unwrap();

        let fetched = registry.get("session_1").await.unwrap().unwrap();
        assert_eq!(fetched.role, "admin");
        assert_eq!(fetched.timestamp, clock.now_utc());
    }
}
