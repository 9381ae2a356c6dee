//! # huddle-core
//!
//! Presence tracking and broadcast engine for the huddle chat backend.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **ConnectionRegistry** - one presence record per live connection
//! - **IdentityDirectory** - last-known presence per identity, kept forever
//! - **roster** - pure reconciliation of the two stores into one roster
//! - **EventRouter** - the state machine driving both stores and fan-out
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌────────────────────┐
//! │  Transport  │────▶│ EventRouter  │────▶│ ConnectionRegistry │
//! └─────────────┘     └──────────────┘     └────────────────────┘
//!                            │                       │
//!                            ▼                       ▼
//!                     ┌──────────────┐     ┌────────────────────┐
//!                     │   fan-out    │◀────│ IdentityDirectory  │
//!                     └──────────────┘     └────────────────────┘
//! ```
//!
//! Presence is ephemeral: both stores live in memory for the process
//! lifetime only.

pub mod directory;
pub mod lookup;
pub mod registry;
pub mod roster;
pub mod router;

pub use directory::{IdentityDirectory, IdentityPresence};
pub use lookup::{StaticLookup, UserLookup, UserRecord};
pub use registry::{ConnectionId, ConnectionPresence, ConnectionRegistry};
pub use roster::merge_roster;
pub use router::{EventRouter, RouterConfig};
