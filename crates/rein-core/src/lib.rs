//! # rein-core
//!
//! Shared, I/O-free foundation of the Rein remote input server.
//!
//! Rein turns a phone into a trackpad, keyboard and clipboard for a desktop
//! machine.  The phone sends small JSON messages (`move`, `click`, `text`, …)
//! over a WebSocket; the server replays them as real OS input.  Everything
//! that arrives from the network is untrusted, so before any message reaches
//! the operating system it passes through three gates that live in this
//! crate:
//!
//! ```text
//! raw JSON ──► RateLimiter ──► validate() ──► sanitize() ──► executor
//!              (per kind)      (shape gate)   (clamp/trim)
//! ```
//!
//! # Architecture overview (for beginners)
//!
//! - **`protocol`** – The wire vocabulary.  Inbound messages are converted
//!   into the closed [`InputMessage`] enum by [`validate`]; outbound messages
//!   are the serialisable [`ServerMessage`] enum.  Numeric and length bounds
//!   live in [`protocol::limits`].
//!
//! - **`domain`** – Small pieces of pure state: the per-connection
//!   [`RateLimiter`], the [`ClipboardTracker`] with its loop suppression, and
//!   the [`PlatformProfile`] that captures host-OS differences once at startup.
//!
//! - **`keymap`** – Logical key names (`"enter"`, `"ctrl"`, `"vol+"`) and the
//!   per-platform code tables used by the OS adapters.
//!
//! Nothing here touches sockets, files, clocks beyond `Instant`, or OS APIs,
//! which keeps every rule unit-testable.

pub mod domain;
pub mod keymap;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `rein_core::InputMessage` instead of `rein_core::protocol::messages::InputMessage`.
pub use domain::clipboard::{ClipboardOrigin, ClipboardRecord, ClipboardTracker};
pub use domain::platform::{DisplayServer, HostOs, PlatformProfile};
pub use domain::rate_limit::RateLimiter;
pub use domain::ConnectionId;
pub use keymap::{KeyName, LogicalKey};
pub use protocol::messages::{
    AdminRequest, InputKind, InputMessage, MouseButton, PairingSummary, ServerMessage,
};
pub use protocol::sanitize::sanitize;
pub use protocol::validate::{validate, Rejection};
