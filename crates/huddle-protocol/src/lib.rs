//! # huddle-protocol
//!
//! Wire event definitions for the huddle presence backend.
//!
//! This crate defines the JSON event protocol spoken between chat clients
//! and the gateway: inbound events that mutate presence state, and outbound
//! events fanned out to every open connection.
//!
//! ## Events
//!
//! - `register` / `message` / `messageLiked` - inbound from clients
//! - `connectedUsers` - the merged roster, sent after every state change
//! - `messageFromBack` / `messageUpdateLikes` - relayed notifications
//!
//! ## Example
//!
//! ```rust
//! use huddle_protocol::{codec, ClientEvent};
//!
//! let event = codec::decode(
//!     r#"{"event":"register","data":{"userId":"u1","email":"a@x.com"}}"#,
//! ).unwrap();
//!
//! assert_eq!(event, ClientEvent::register("u1", "a@x.com"));
//! ```

pub mod codec;
pub mod events;

pub use codec::{decode, encode, ProtocolError};
pub use events::{ClientEvent, RosterEntry, ServerEvent, UserStatus};
