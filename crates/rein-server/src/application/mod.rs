//! Application layer use cases for the server.
//!
//! # What use cases does the server have?
//!
//! - **`admission`** – Decides, during the WebSocket handshake, whether a peer
//!   is local, token-authenticated, unauthenticated, or refused outright.
//!
//! - **`dispatch`** – Owns one connection's private state and routes each
//!   inbound frame: admin requests (pairing, tokens, config, mirror) are
//!   handled directly; input goes through rate limit → validate → sanitize
//!   and on to the executor.
//!
//! - **`execute_input`** – Replays sanitized messages as desktop input through
//!   the `Automation` and `ClipboardAccess` traits, including combo safety,
//!   zoom, clipboard copy/paste and move coalescing.
//!
//! - **`cursor_fallback`** – Moves the pointer through the primary backend and
//!   falls back to `ydotool` behind a small circuit breaker.
//!
//! - **`mirror`** – Captures, downscales and JPEG-encodes one frame per
//!   request, and reports the pointer position as a screen fraction.
//!
//! - **`clipboard_sync`** – Watches the desktop clipboard and publishes
//!   changes to authorized devices, without echoing a device's own paste.
//!
//! - **`update_config`** – Validates, persists and applies live configuration
//!   changes from a local operator.
//!
//! # Locks
//!
//! The state shared between connections lives behind `std::sync` locks and is
//! only ever held for short, non-async sections.  A panic while one is held
//! must not take every other connection down with it, so all locking goes
//! through [`lock`], [`read`] and [`write`], which recover from poisoning.

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub mod admission;
pub mod clipboard_sync;
pub mod cursor_fallback;
pub mod dispatch;
pub mod execute_input;
pub mod mirror;
pub mod update_config;

pub use admission::{decide_upgrade, is_loopback, UpgradeDecision};
pub use cursor_fallback::{CursorController, FallbackPointer, MoveMethod, MoveOutcome};
pub use dispatch::{ConnectionHandler, Outbound, ServerContext, Services};
pub use execute_input::{Automation, AutomationError, ClipboardAccess, InputExecutor};
pub use mirror::{CaptureError, CaptureSlot, MirrorPipeline, RawFrame, ScreenCapture};
pub use update_config::ConfigStore;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
