// # IsolationPolicy
//
// Applied on handout: compares a session's current transaction-isolation level against a
// declared one and writes only when they differ. Absence of a policy (`Pool.isolation: None`)
// means the pool performs no isolation check at all.

use async_trait::async_trait;

use crate::error::Result;
use crate::pool::session::{IsolationLevel, Session};

/// Enforces a declared transaction-isolation level on handout.
#[async_trait]
pub trait IsolationPolicy<S: Session>: Send + Sync {
    /// The isolation level this policy enforces.
    fn declared_level(&self) -> IsolationLevel;

    /// Ensure `session` sits at `declared_level`, changing it only if it does not already.
    async fn apply(&self, session: &S) -> Result<()> {
        let declared = self.declared_level();
        if session.isolation_level().await? != declared {
            session.set_isolation_level(declared).await?;
        }
        Ok(())
    }
}

/// A policy that always enforces a single fixed level.
pub struct FixedIsolationPolicy {
    level: IsolationLevel,
}

impl FixedIsolationPolicy {
    pub fn new(level: IsolationLevel) -> Self {
        Self { level }
    }
}

#[async_trait]
impl<S: Session> IsolationPolicy<S> for FixedIsolationPolicy {
    fn declared_level(&self) -> IsolationLevel {
        self.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::mock::MockConnector;
    use crate::pool::Connector;

    #[tokio::test]
    async fn apply_writes_only_when_level_differs() {
        let connector = MockConnector::new();
        let session = connector.open().await.unwrap();
        assert_eq!(session.isolation_level().await.unwrap(), IsolationLevel::ReadCommitted);

        let policy = FixedIsolationPolicy::new(IsolationLevel::ReadCommitted);
        policy.apply(&session).await.unwrap();
        assert_eq!(session.isolation_level().await.unwrap(), IsolationLevel::ReadCommitted);

        let policy = FixedIsolationPolicy::new(IsolationLevel::Serializable);
        policy.apply(&session).await.unwrap();
        assert_eq!(session.isolation_level().await.unwrap(), IsolationLevel::Serializable);
    }
}
