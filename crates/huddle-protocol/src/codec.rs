//! Codec for encoding and decoding huddle events.
//!
//! Events travel as JSON text frames. Decoding is fallible by design: a
//! malformed inbound event is reported to the caller, who drops it for that
//! connection without touching shared state.

use thiserror::Error;

use crate::events::{ClientEvent, ServerEvent};

/// Maximum inbound event size (64 KiB).
pub const MAX_EVENT_SIZE: usize = 64 * 1024;

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Inbound event exceeds maximum size.
    #[error("Event size {0} exceeds maximum {MAX_EVENT_SIZE}")]
    EventTooLarge(usize),

    /// Event JSON is malformed or missing required fields.
    #[error("Malformed event: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Encode a server event to a JSON text frame.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode(event: &ServerEvent) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(event)?)
}

/// Decode a client event from a JSON text frame.
///
/// # Errors
///
/// Returns an error if the frame is oversized, is not valid JSON, names an
/// unknown event, or is missing a required payload field.
pub fn decode(text: &str) -> Result<ClientEvent, ProtocolError> {
    if text.len() > MAX_EVENT_SIZE {
        return Err(ProtocolError::EventTooLarge(text.len()));
    }

    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{RosterEntry, UserStatus};

    #[test]
    fn test_decode_register() {
        let event =
            decode(r#"{"event":"register","data":{"userId":"u1","email":"a@x.com"}}"#).unwrap();

        assert_eq!(event, ClientEvent::register("u1", "a@x.com"));
    }

    #[test]
    fn test_decode_message_and_like() {
        let msg = decode(r#"{"event":"message","data":"hello"}"#).unwrap();
        assert_eq!(msg, ClientEvent::message("hello"));

        let like = decode(r#"{"event":"messageLiked","data":{"messageId":"m1"}}"#).unwrap();
        assert_eq!(like, ClientEvent::message_liked("m1"));
    }

    #[test]
    fn test_decode_rejects_unknown_event() {
        assert!(decode(r#"{"event":"shutdown","data":null}"#).is_err());
    }

    #[test]
    fn test_decode_rejects_missing_field() {
        // register without an email must not produce a partial identity
        let result = decode(r#"{"event":"register","data":{"userId":"u1"}}"#);
        assert!(matches!(result, Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn test_decode_rejects_oversized_frame() {
        let huge = format!(
            r#"{{"event":"message","data":"{}"}}"#,
            "x".repeat(MAX_EVENT_SIZE + 1)
        );
        assert!(matches!(
            decode(&huge),
            Err(ProtocolError::EventTooLarge(_))
        ));
    }

    #[test]
    fn test_encode_roster() {
        let event = ServerEvent::roster(vec![RosterEntry::new(
            "u1",
            "a@x.com",
            "2024-01-01T00:00:00.000Z",
            UserStatus::Online,
        )]);

        let encoded = encode(&event).unwrap();
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();

        assert_eq!(value["event"], "connectedUsers");
        assert_eq!(value["data"][0]["userId"], "u1");
        assert_eq!(value["data"][0]["status"], "online");
    }
}
