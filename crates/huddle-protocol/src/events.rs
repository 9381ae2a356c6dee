//! Event types for the huddle wire protocol.
//!
//! Events are the discrete named messages exchanged between clients and the
//! gateway. Each event is a JSON object with an `event` name and a `data`
//! payload, mirroring the socket-style protocol the chat frontend speaks.

use serde::{Deserialize, Serialize};

/// Online/offline state of an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Online,
    Offline,
}

impl UserStatus {
    /// Check whether this status is `online`.
    #[must_use]
    pub fn is_online(self) -> bool {
        matches!(self, UserStatus::Online)
    }
}

/// One entry in the broadcast roster.
///
/// Entries are derived per broadcast and never stored; `last_seen` is an
/// ISO-8601 string with millisecond precision and a `Z` suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    /// Identity this entry describes.
    pub user_id: String,
    /// Email paired with the identity.
    pub email: String,
    /// Last activity timestamp, ISO-8601.
    pub last_seen: String,
    /// Whether the identity currently has an open connection.
    pub status: UserStatus,
}

impl RosterEntry {
    /// Create a new roster entry.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        email: impl Into<String>,
        last_seen: impl Into<String>,
        status: UserStatus,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            last_seen: last_seen.into(),
            status,
        }
    }
}

/// Events accepted from clients.
///
/// Connection open and close are transport lifecycle, not wire events, so
/// they have no variant here; the gateway feeds them to the router directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Attach an authenticated identity to the sending connection.
    #[serde(rename = "register", rename_all = "camelCase")]
    Register {
        /// Identity to attach.
        user_id: String,
        /// Email paired with the identity.
        email: String,
    },

    /// A chat message. The payload is opaque to the presence core.
    #[serde(rename = "message")]
    Message(String),

    /// A message was liked or unliked. Pure relay; persistence of the like
    /// happens elsewhere.
    #[serde(rename = "messageLiked", rename_all = "camelCase")]
    MessageLiked {
        /// Identifier of the affected message.
        message_id: String,
    },
}

impl ClientEvent {
    /// Get the wire name of this event.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Register { .. } => "register",
            ClientEvent::Message(_) => "message",
            ClientEvent::MessageLiked { .. } => "messageLiked",
        }
    }

    /// Create a new register event.
    #[must_use]
    pub fn register(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        ClientEvent::Register {
            user_id: user_id.into(),
            email: email.into(),
        }
    }

    /// Create a new message event.
    #[must_use]
    pub fn message(payload: impl Into<String>) -> Self {
        ClientEvent::Message(payload.into())
    }

    /// Create a new message-liked event.
    #[must_use]
    pub fn message_liked(message_id: impl Into<String>) -> Self {
        ClientEvent::MessageLiked {
            message_id: message_id.into(),
        }
    }
}

/// Events emitted to every open connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// The merged roster, sent after every state-changing transition.
    #[serde(rename = "connectedUsers")]
    ConnectedUsers(Vec<RosterEntry>),

    /// A relayed chat message, verbatim.
    #[serde(rename = "messageFromBack")]
    MessageFromBack(String),

    /// A relayed like notification carrying the message id, verbatim.
    #[serde(rename = "messageUpdateLikes")]
    MessageUpdateLikes(String),
}

impl ServerEvent {
    /// Get the wire name of this event.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::ConnectedUsers(_) => "connectedUsers",
            ServerEvent::MessageFromBack(_) => "messageFromBack",
            ServerEvent::MessageUpdateLikes(_) => "messageUpdateLikes",
        }
    }

    /// Create a new roster broadcast event.
    #[must_use]
    pub fn roster(entries: Vec<RosterEntry>) -> Self {
        ServerEvent::ConnectedUsers(entries)
    }
}
