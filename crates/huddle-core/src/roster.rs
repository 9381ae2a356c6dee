//! Roster reconciliation.
//!
//! The reconciler merges the two presence stores into the single
//! deduplicated roster broadcast after every state change. It is a pure
//! function over snapshots: no transport, no locking, no side effects,
//! which is what keeps the merge independently testable.

use crate::directory::IdentityDirectory;
use crate::registry::ConnectionRegistry;
use chrono::{DateTime, SecondsFormat, Utc};
use huddle_protocol::{RosterEntry, UserStatus};
use std::collections::HashMap;

/// Merged view of one identity before wire formatting.
struct MergedPresence {
    email: String,
    last_seen: DateTime<Utc>,
    status: UserStatus,
}

/// Format a timestamp the way roster entries carry it: ISO-8601 with
/// millisecond precision and a `Z` suffix.
#[must_use]
pub fn iso8601(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Merge the two stores into the broadcast roster.
///
/// The directory is the base: every identity ever seen, online or offline.
/// Identified live connections overlay it keyed by user ID - a live
/// connection's state is always fresher than stored identity history, so
/// the registry wins on conflict. The result carries online entries first,
/// then offline entries by descending last seen.
#[must_use]
pub fn merge_roster(directory: &IdentityDirectory, registry: &ConnectionRegistry) -> Vec<RosterEntry> {
    let mut merged: HashMap<String, MergedPresence> = HashMap::new();

    for identity in directory.snapshot() {
        merged.insert(
            identity.user_id,
            MergedPresence {
                email: identity.email,
                last_seen: identity.last_seen,
                status: identity.status,
            },
        );
    }

    for connection in registry.identified() {
        let (Some(user_id), Some(email)) = (&connection.user_id, &connection.email) else {
            continue;
        };
        merged.insert(
            user_id.clone(),
            MergedPresence {
                email: email.clone(),
                last_seen: connection.last_seen,
                status: connection.status,
            },
        );
    }

    let (online, mut offline): (Vec<_>, Vec<_>) = merged
        .into_iter()
        .partition(|(_, presence)| presence.status.is_online());

    offline.sort_by(|(_, a), (_, b)| b.last_seen.cmp(&a.last_seen));

    online
        .into_iter()
        .chain(offline)
        .map(|(user_id, presence)| {
            RosterEntry::new(
                user_id,
                presence.email,
                iso8601(presence.last_seen),
                presence.status,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_iso8601_matches_reference_format() {
        let timestamp = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        assert_eq!(iso8601(timestamp), "2024-01-15T10:30:00.000Z");
    }

    #[test]
    fn test_empty_stores_produce_empty_roster() {
        let roster = merge_roster(&IdentityDirectory::new(), &ConnectionRegistry::new());
        assert!(roster.is_empty());
    }

    #[test]
    fn test_anonymous_connections_are_excluded() {
        let mut registry = ConnectionRegistry::new();
        registry.connect("c1".into());

        let roster = merge_roster(&IdentityDirectory::new(), &registry);
        assert!(roster.is_empty());
    }

    #[test]
    fn test_registry_overlays_directory() {
        let mut directory = IdentityDirectory::new();
        directory.upsert_online("u1", "stale@x.com");
        directory.mark_offline("u1", Utc::now());

        let mut registry = ConnectionRegistry::new();
        registry.connect("c1".into());
        registry.set_identity(&"c1".into(), "u1", "fresh@x.com");

        let roster = merge_roster(&directory, &registry);
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].email, "fresh@x.com");
        assert_eq!(roster[0].status, UserStatus::Online);
    }

    #[test]
    fn test_offline_history_survives() {
        let mut directory = IdentityDirectory::new();
        directory.upsert_online("u1", "a@x.com");
        directory.mark_offline("u1", Utc::now());

        let roster = merge_roster(&directory, &ConnectionRegistry::new());
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].status, UserStatus::Offline);
    }

    #[test]
    fn test_online_group_comes_first() {
        let mut directory = IdentityDirectory::new();
        directory.upsert_online("departed", "d@x.com");
        directory.mark_offline("departed", Utc::now());

        let mut registry = ConnectionRegistry::new();
        registry.connect("c1".into());
        registry.set_identity(&"c1".into(), "present", "p@x.com");

        let roster = merge_roster(&directory, &registry);
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[0].user_id, "present");
        assert_eq!(roster[1].user_id, "departed");
    }

    #[test]
    fn test_offline_ordered_by_most_recently_seen() {
        let mut directory = IdentityDirectory::new();
        for user in ["u1", "u2", "u3"] {
            directory.upsert_online(user, format!("{user}@x.com"));
        }
        directory.mark_offline("u1", Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 1).unwrap());
        directory.mark_offline("u2", Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 3).unwrap());
        directory.mark_offline("u3", Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 2).unwrap());

        let roster = merge_roster(&directory, &ConnectionRegistry::new());
        let order: Vec<&str> = roster.iter().map(|e| e.user_id.as_str()).collect();
        assert_eq!(order, vec!["u2", "u3", "u1"]);
    }

    #[test]
    fn test_one_entry_per_user_id() {
        let mut directory = IdentityDirectory::new();
        directory.upsert_online("u1", "a@x.com");

        let mut registry = ConnectionRegistry::new();
        registry.connect("c1".into());
        registry.set_identity(&"c1".into(), "u1", "a@x.com");
        registry.connect("c2".into());
        registry.set_identity(&"c2".into(), "u1", "a@x.com");

        let roster = merge_roster(&directory, &registry);
        assert_eq!(roster.len(), 1);
    }
}
