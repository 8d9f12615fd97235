//! rein-server library crate.
//!
//! The server side of Rein: phones and tablets on the LAN connect over
//! WebSocket and drive this machine's pointer, keyboard and clipboard, and
//! can pull JPEG snapshots of the screen.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Device (JSON + binary frames over WebSocket)
//!         ↕
//! [rein-server]
//!   ├── domain/           Pure state: config, sessions, admission, runtime config
//!   ├── application/      Use cases: admission, dispatch, input, mirror, clipboard
//!   └── infrastructure/
//!         ├── ws_server/  WebSocket accept loop (tokio-tungstenite)
//!         ├── automation/ OS input injection (Xlib/XTest, SendInput, CGEvent)
//!         ├── capture/    OS screen capture
//!         ├── ydotool/    Wayland pointer fallback
//!         └── storage/    JSON runtime config file
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain` and `rein-core`; OS access goes
//!   through the traits it defines (`Automation`, `ScreenCapture`, ...).
//! - `infrastructure` implements those traits and owns the network.
//!
//! # For beginners: why this structure?
//!
//! The interesting rules (who may connect, which inputs are dropped, how
//! moves are merged) live in code that never touches a real display or
//! socket, so the tests can drive them with recording fakes.  Porting to a
//! new OS means adding one `infrastructure` module, not editing the rules.

/// Domain layer: pure state and rules (no I/O).
pub mod domain;

/// Application layer: use cases wired through OS-facing traits.
pub mod application;

/// Infrastructure layer: WebSocket server and OS adapters.
pub mod infrastructure;
