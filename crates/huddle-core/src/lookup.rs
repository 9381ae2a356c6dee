//! User lookup collaborator seam.
//!
//! Registration carries a caller-supplied `(userId, email)` pair and the
//! reference behavior trusts it as-is. Deployments that want to harden the
//! register path can implement this trait against their identity service
//! and have the gateway verify the pair before it reaches the router.

use async_trait::async_trait;
use std::collections::HashMap;

/// A user record resolved by the identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// Canonical user id.
    pub id: String,
    /// Email on file for the user.
    pub email: String,
}

/// Capability to resolve a user id against the identity service.
#[async_trait]
pub trait UserLookup: Send + Sync {
    /// Resolve a user id, or `None` if unknown.
    async fn lookup(&self, user_id: &str) -> Option<UserRecord>;
}

/// In-memory lookup backed by a fixed set of users.
#[derive(Debug, Default)]
pub struct StaticLookup {
    users: HashMap<String, UserRecord>,
}

impl StaticLookup {
    /// Create an empty lookup.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a known user.
    #[must_use]
    pub fn with_user(mut self, id: impl Into<String>, email: impl Into<String>) -> Self {
        let id = id.into();
        self.users.insert(
            id.clone(),
            UserRecord {
                id,
                email: email.into(),
            },
        );
        self
    }
}

#[async_trait]
impl UserLookup for StaticLookup {
    async fn lookup(&self, user_id: &str) -> Option<UserRecord> {
        self.users.get(user_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_lookup() {
        let lookup = StaticLookup::new().with_user("u1", "a@x.com");

        let record = lookup.lookup("u1").await.unwrap();
        assert_eq!(record.email, "a@x.com");

        assert!(lookup.lookup("ghost").await.is_none());
    }
}
