//! Infrastructure layer for the server.
//!
//! Contains OS-facing adapters: input injection, screen capture, the
//! clipboard, the ydotool fallback, config file storage and the WebSocket
//! server itself.
//!
//! **Dependency rule**: this layer may depend on `application`, `domain` and
//! `rein_core`, but MUST NOT be imported by the `application` or `domain`
//! layers outside of tests.
//!
//! # Sub-modules
//!
//! - **`automation`** – OS-specific implementations of `Automation`.  The
//!   correct one is selected at compile time with `#[cfg(target_os)]`.  A
//!   `RecordingAutomation` is also provided for tests and `--dry-run`.
//!
//! - **`capture`** – OS-specific implementations of `ScreenCapture`.
//!
//! - **`clipboard`** – `arboard`-backed and in-memory `ClipboardAccess`.
//!
//! - **`ydotool`** – The Linux pointer fallback (`FallbackPointer`).
//!
//! - **`storage`** – JSON persistence of the runtime configuration.
//!
//! - **`net`** – LAN address discovery.
//!
//! - **`ws_server`** – TCP accept loop, upgrade-time admission and the
//!   per-connection reader/writer tasks.

pub mod automation;
pub mod capture;
pub mod clipboard;
pub mod net;
pub mod storage;
pub mod ws_server;
pub mod ydotool;

#[cfg(target_os = "linux")]
pub mod x11_display;
