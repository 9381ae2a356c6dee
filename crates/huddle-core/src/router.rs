//! Event router for the presence engine.
//!
//! The router receives the inbound events (connect, register, message,
//! messageLiked, disconnect), mutates the two presence stores through their
//! operations, and fans results out to every open connection. Both stores
//! sit behind one lock held for the mutation plus the roster computation,
//! so a broadcast never reflects a partially-applied state; the fan-out
//! itself happens after the lock is released.

use crate::directory::IdentityDirectory;
use crate::registry::{ConnectionId, ConnectionRegistry};
use crate::roster;
use chrono::Utc;
use huddle_protocol::{RosterEntry, ServerEvent};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Router configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Outbound broadcast channel capacity.
    pub outbound_capacity: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: 1024,
        }
    }
}

/// The two presence stores, mutated only inside one critical section.
#[derive(Debug, Default)]
struct PresenceStores {
    registry: ConnectionRegistry,
    directory: IdentityDirectory,
}

/// The central event router.
///
/// One instance serves the whole process; connection tasks obtain outbound
/// receivers via [`EventRouter::subscribe`] and write to their own sockets,
/// so a dead socket never stalls anyone else's fan-out.
pub struct EventRouter {
    /// Registry and directory behind a single lock.
    stores: Mutex<PresenceStores>,
    /// Fan-out channel; every connection task holds a receiver.
    outbound: broadcast::Sender<ServerEvent>,
}

impl EventRouter {
    /// Create a new router with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RouterConfig::default())
    }

    /// Create a new router with custom configuration.
    #[must_use]
    pub fn with_config(config: RouterConfig) -> Self {
        let (outbound, _) = broadcast::channel(config.outbound_capacity);
        Self {
            stores: Mutex::new(PresenceStores::default()),
            outbound,
        }
    }

    /// Obtain a receiver for everything the router fans out.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.outbound.subscribe()
    }

    /// Get the number of open connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.lock().registry.count()
    }

    /// Compute the current roster without broadcasting it.
    #[must_use]
    pub fn roster(&self) -> Vec<RosterEntry> {
        let stores = self.lock();
        roster::merge_roster(&stores.directory, &stores.registry)
    }

    /// A new connection opened.
    pub fn connect(&self, connection_id: &ConnectionId) {
        let roster = {
            let mut stores = self.lock();
            stores.registry.connect(connection_id.clone());
            roster::merge_roster(&stores.directory, &stores.registry)
        };

        info!(connection = %connection_id, "Client connected");
        self.broadcast_roster(roster);
    }

    /// A connection registered an identity.
    ///
    /// Identity arriving for an already-closed connection touches neither
    /// store; the pair is only recorded against a live connection.
    pub fn register(&self, connection_id: &ConnectionId, user_id: &str, email: &str) {
        let roster = {
            let mut stores = self.lock();
            if stores.registry.is_connected(connection_id) {
                stores.registry.set_identity(connection_id, user_id, email);
                stores.directory.upsert_online(user_id, email);
                info!(connection = %connection_id, user = %user_id, email = %email, "User registered");
            }
            roster::merge_roster(&stores.directory, &stores.registry)
        };

        self.broadcast_roster(roster);
    }

    /// A connection sent a chat message.
    ///
    /// The payload is opaque: it is relayed verbatim to every connection as
    /// `messageFromBack`, and the sender's presence is refreshed, which in
    /// turn rebroadcasts the roster.
    pub fn message(&self, connection_id: &ConnectionId, payload: String) {
        let roster = {
            let mut stores = self.lock();
            stores.registry.touch(connection_id);

            let user_id = stores
                .registry
                .get(connection_id)
                .and_then(|record| record.user_id.clone());
            if let Some(user_id) = user_id {
                stores.directory.touch(&user_id);
            }

            roster::merge_roster(&stores.directory, &stores.registry)
        };

        debug!(connection = %connection_id, "Relaying message");
        self.send(ServerEvent::MessageFromBack(payload));
        self.broadcast_roster(roster);
    }

    /// A message was liked or unliked.
    ///
    /// Pure relay: the router does not interpret the message id or verify
    /// the like; it only tells every connection to refresh. Presence state
    /// is untouched, so no roster broadcast follows.
    pub fn message_liked(&self, message_id: String) {
        debug!(message = %message_id, "Relaying like update");
        self.send(ServerEvent::MessageUpdateLikes(message_id));
    }

    /// A connection closed.
    ///
    /// Safe to call at any time, any number of times; an unknown connection
    /// id leaves both stores untouched.
    pub fn disconnect(&self, connection_id: &ConnectionId) {
        let roster = {
            let mut stores = self.lock();
            if let Some(record) = stores.registry.disconnect(connection_id) {
                if let (Some(user_id), Some(email)) = (&record.user_id, &record.email) {
                    info!(user = %user_id, email = %email, "User offline");
                    let user_id = user_id.clone();
                    stores.directory.mark_offline(&user_id, Utc::now());
                }
            }
            roster::merge_roster(&stores.directory, &stores.registry)
        };

        info!(connection = %connection_id, "Client disconnected");
        self.broadcast_roster(roster);
    }

    fn broadcast_roster(&self, roster: Vec<RosterEntry>) {
        debug!(users = roster.len(), "Sending user list");
        self.send(ServerEvent::ConnectedUsers(roster));
    }

    fn send(&self, event: ServerEvent) {
        // Err only means no connection is listening right now
        let _ = self.outbound.send(event);
    }

    fn lock(&self) -> MutexGuard<'_, PresenceStores> {
        // Presence is best-effort, in-memory state; recover the guard
        // rather than propagate poisoning from an unrelated panic.
        self.stores.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new()
    }
}
