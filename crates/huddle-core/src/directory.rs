//! Identity-scoped presence history.
//!
//! The directory remembers every identity that has ever registered, for the
//! lifetime of the process. Entries are never removed; a disconnect only
//! flips the entry to offline and stamps the disconnect time, which is what
//! lets the roster show "last seen" for departed users.

use chrono::{DateTime, Utc};
use huddle_protocol::UserStatus;
use std::collections::HashMap;
use tracing::debug;

/// Most-recently-known presence for one identity.
#[derive(Debug, Clone)]
pub struct IdentityPresence {
    /// The identity.
    pub user_id: String,
    /// Email paired with the identity.
    pub email: String,
    /// Last activity, or disconnect time once offline.
    pub last_seen: DateTime<Utc>,
    /// Online while at least one open connection bears this identity.
    pub status: UserStatus,
}

/// Directory of every identity seen this process lifetime.
#[derive(Debug, Default)]
pub struct IdentityDirectory {
    /// Map of user ID to presence record.
    users: HashMap<String, IdentityPresence>,
}

impl IdentityDirectory {
    /// Create a new directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of known identities.
    #[must_use]
    pub fn count(&self) -> usize {
        self.users.len()
    }

    /// Check if an identity is known.
    #[must_use]
    pub fn contains(&self, user_id: &str) -> bool {
        self.users.contains_key(user_id)
    }

    /// Get the presence record for an identity.
    #[must_use]
    pub fn get(&self, user_id: &str) -> Option<&IdentityPresence> {
        self.users.get(user_id)
    }

    /// Insert or refresh an identity as online.
    ///
    /// Called on every register; a re-registration simply overwrites the
    /// email and refreshes the timestamp.
    pub fn upsert_online(&mut self, user_id: impl Into<String>, email: impl Into<String>) {
        let user_id = user_id.into();
        debug!(user = %user_id, "Directory: identity online");
        self.users.insert(
            user_id.clone(),
            IdentityPresence {
                user_id,
                email: email.into(),
                last_seen: Utc::now(),
                status: UserStatus::Online,
            },
        );
    }

    /// Refresh an identity's last seen timestamp.
    ///
    /// No-op for unknown identities: directory entries only ever come from
    /// registrations, never from activity alone.
    pub fn touch(&mut self, user_id: &str) {
        if let Some(record) = self.users.get_mut(user_id) {
            record.last_seen = Utc::now();
        }
    }

    /// Flip an identity to offline, stamping the disconnect time.
    ///
    /// No-op if the identity is unknown. The entry itself is retained
    /// indefinitely as last-seen history.
    pub fn mark_offline(&mut self, user_id: &str, last_seen: DateTime<Utc>) {
        if let Some(record) = self.users.get_mut(user_id) {
            record.status = UserStatus::Offline;
            record.last_seen = last_seen;
            debug!(user = %user_id, "Directory: identity offline");
        }
    }

    /// Get a copy of every record.
    #[must_use]
    pub fn snapshot(&self) -> Vec<IdentityPresence> {
        self.users.values().cloned().collect()
    }

    /// Check if the directory is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_online() {
        let mut directory = IdentityDirectory::new();
        directory.upsert_online("u1", "a@x.com");

        let record = directory.get("u1").unwrap();
        assert_eq!(record.email, "a@x.com");
        assert_eq!(record.status, UserStatus::Online);
        assert_eq!(directory.count(), 1);
    }

    #[test]
    fn test_reregistration_overwrites() {
        let mut directory = IdentityDirectory::new();
        directory.upsert_online("u1", "old@x.com");
        directory.upsert_online("u1", "new@x.com");

        assert_eq!(directory.count(), 1);
        assert_eq!(directory.get("u1").unwrap().email, "new@x.com");
    }

    #[test]
    fn test_mark_offline_retains_entry() {
        let mut directory = IdentityDirectory::new();
        directory.upsert_online("u1", "a@x.com");

        let departed_at = Utc::now();
        directory.mark_offline("u1", departed_at);

        let record = directory.get("u1").unwrap();
        assert_eq!(record.status, UserStatus::Offline);
        assert_eq!(record.last_seen, departed_at);
        assert!(directory.contains("u1"));
    }

    #[test]
    fn test_mark_offline_unknown_is_noop() {
        let mut directory = IdentityDirectory::new();
        directory.mark_offline("ghost", Utc::now());
        assert!(directory.is_empty());
    }

    #[test]
    fn test_touch_never_fabricates() {
        let mut directory = IdentityDirectory::new();
        directory.touch("ghost");
        assert!(directory.is_empty());

        directory.upsert_online("u1", "a@x.com");
        let before = directory.get("u1").unwrap().last_seen;
        directory.touch("u1");
        assert!(directory.get("u1").unwrap().last_seen >= before);
    }
}
