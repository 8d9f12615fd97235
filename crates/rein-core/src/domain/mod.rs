//! Domain layer: small pieces of pure, clock-injected state.
//!
//! # What belongs here?
//!
//! - Per-connection bookkeeping that has rules of its own (rate limiting)
//! - The clipboard record with its TTL and loop suppression
//! - The host platform profile
//!
//! # What does NOT belong here?
//!
//! - Sockets, files, environment reads or OS calls
//! - Anything async

pub mod clipboard;
pub mod platform;
pub mod rate_limit;

/// Identifies one WebSocket connection for its whole lifetime.
pub type ConnectionId = uuid::Uuid;
