//! Connection-scoped presence tracking.
//!
//! The registry owns one record per live transport connection. A record
//! exists here iff its connection is currently open: created on connect,
//! mutated on register and message activity, removed on disconnect.

use chrono::{DateTime, Utc};
use huddle_protocol::UserStatus;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Unique identifier for a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    /// Create a new connection ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh connection ID, unique within the process lifetime.
    #[must_use]
    pub fn generate() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        Self(format!("conn_{:x}", timestamp))
    }

    /// Get the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ConnectionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Presence record for a single live connection.
///
/// `user_id` and `email` are absent until the connection registers an
/// identity; they are always set together.
#[derive(Debug, Clone)]
pub struct ConnectionPresence {
    /// Transport-assigned connection handle.
    pub connection_id: ConnectionId,
    /// Identity attached via register, if any.
    pub user_id: Option<String>,
    /// Email paired with `user_id`.
    pub email: Option<String>,
    /// Last inbound activity from this connection.
    pub last_seen: DateTime<Utc>,
    /// Always `online` while the record exists.
    pub status: UserStatus,
}

impl ConnectionPresence {
    /// Create a new anonymous presence record.
    #[must_use]
    pub fn new(connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            user_id: None,
            email: None,
            last_seen: Utc::now(),
            status: UserStatus::Online,
        }
    }

    /// Update the last seen timestamp.
    pub fn touch(&mut self) {
        self.last_seen = Utc::now();
    }

    /// Attach an identity to this connection.
    pub fn set_identity(&mut self, user_id: impl Into<String>, email: impl Into<String>) {
        self.user_id = Some(user_id.into());
        self.email = Some(email.into());
        self.status = UserStatus::Online;
        self.touch();
    }

    /// Check whether this connection has a full identity attached.
    #[must_use]
    pub fn is_identified(&self) -> bool {
        self.user_id.is_some() && self.email.is_some()
    }
}

/// Registry of live connections.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    /// Map of connection ID to presence record.
    connections: HashMap<ConnectionId, ConnectionPresence>,
}

impl ConnectionRegistry {
    /// Create a new registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of open connections.
    #[must_use]
    pub fn count(&self) -> usize {
        self.connections.len()
    }

    /// Check if a connection is present.
    #[must_use]
    pub fn is_connected(&self, connection_id: &ConnectionId) -> bool {
        self.connections.contains_key(connection_id)
    }

    /// Get the presence record for a connection.
    #[must_use]
    pub fn get(&self, connection_id: &ConnectionId) -> Option<&ConnectionPresence> {
        self.connections.get(connection_id)
    }

    /// Insert a record for a newly opened connection.
    ///
    /// A reused ID overwrites the previous record; transports hand out
    /// unique IDs per process lifetime, so this stays idempotent.
    pub fn connect(&mut self, connection_id: ConnectionId) {
        debug!(connection = %connection_id, "Registry: connection opened");
        self.connections
            .insert(connection_id.clone(), ConnectionPresence::new(connection_id));
    }

    /// Remove and return the record for a closed connection.
    ///
    /// No-op returning `None` if the connection is unknown; disconnects can
    /// arrive more than once or before any other event.
    pub fn disconnect(&mut self, connection_id: &ConnectionId) -> Option<ConnectionPresence> {
        let record = self.connections.remove(connection_id);
        if record.is_some() {
            debug!(connection = %connection_id, "Registry: connection closed");
        }
        record
    }

    /// Update a connection's last seen timestamp. No-op if unknown.
    pub fn touch(&mut self, connection_id: &ConnectionId) {
        if let Some(record) = self.connections.get_mut(connection_id) {
            record.touch();
        }
    }

    /// Attach an identity to a connection.
    ///
    /// No-op if the connection is unknown: identity can legitimately arrive
    /// after the connection already disconnected.
    pub fn set_identity(&mut self, connection_id: &ConnectionId, user_id: &str, email: &str) {
        if let Some(record) = self.connections.get_mut(connection_id) {
            record.set_identity(user_id, email);
            debug!(connection = %connection_id, user = %user_id, "Registry: identity attached");
        }
    }

    /// Get the connections that carry a full identity.
    ///
    /// Anonymous pre-registration connections never appear in a roster, so
    /// this is the view the reconciler consumes.
    #[must_use]
    pub fn identified(&self) -> Vec<&ConnectionPresence> {
        self.connections
            .values()
            .filter(|record| record.is_identified())
            .collect()
    }

    /// Get a copy of every record.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ConnectionPresence> {
        self.connections.values().cloned().collect()
    }

    /// Check if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_generation() {
        let id1 = ConnectionId::generate();
        let id2 = ConnectionId::generate();
        assert_ne!(id1, id2);
        assert!(id1.as_str().starts_with("conn_"));
    }

    #[test]
    fn test_connect_disconnect_lifecycle() {
        let mut registry = ConnectionRegistry::new();
        let conn: ConnectionId = "c1".into();

        registry.connect(conn.clone());
        assert!(registry.is_connected(&conn));
        assert_eq!(registry.count(), 1);

        let removed = registry.disconnect(&conn);
        assert!(removed.is_some());
        assert!(!registry.is_connected(&conn));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_disconnect_unknown_is_noop() {
        let mut registry = ConnectionRegistry::new();
        assert!(registry.disconnect(&"ghost".into()).is_none());

        // Double disconnect is equally silent
        registry.connect("c1".into());
        registry.disconnect(&"c1".into());
        assert!(registry.disconnect(&"c1".into()).is_none());
    }

    #[test]
    fn test_set_identity() {
        let mut registry = ConnectionRegistry::new();
        registry.connect("c1".into());

        registry.set_identity(&"c1".into(), "u1", "a@x.com");

        let record = registry.get(&"c1".into()).unwrap();
        assert!(record.is_identified());
        assert_eq!(record.user_id.as_deref(), Some("u1"));
        assert_eq!(record.email.as_deref(), Some("a@x.com"));
        assert_eq!(record.status, UserStatus::Online);
    }

    #[test]
    fn test_set_identity_after_disconnect_is_silent() {
        let mut registry = ConnectionRegistry::new();
        registry.set_identity(&"gone".into(), "u1", "a@x.com");
        assert!(registry.is_empty());
    }

    #[test]
    fn test_identified_excludes_anonymous() {
        let mut registry = ConnectionRegistry::new();
        registry.connect("c1".into());
        registry.connect("c2".into());
        registry.set_identity(&"c2".into(), "u2", "b@x.com");

        let identified = registry.identified();
        assert_eq!(identified.len(), 1);
        assert_eq!(identified[0].user_id.as_deref(), Some("u2"));
    }

    #[test]
    fn test_touch_refreshes_last_seen() {
        let mut registry = ConnectionRegistry::new();
        registry.connect("c1".into());
        let before = registry.get(&"c1".into()).unwrap().last_seen;

        registry.touch(&"c1".into());
        let after = registry.get(&"c1".into()).unwrap().last_seen;
        assert!(after >= before);

        // Touching an unknown connection must not insert anything
        registry.touch(&"ghost".into());
        assert_eq!(registry.count(), 1);
    }
}
