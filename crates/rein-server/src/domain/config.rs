//! Server configuration types.
//!
//! [`ServerConfig`] holds every startup-time setting.  It is built once in
//! `main` from CLI arguments (or from [`Default`] in tests) and shared through
//! the server context.  Settings that can change while the server runs live in
//! [`RuntimeConfig`](super::runtime_config::RuntimeConfig) instead.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use rein_core::protocol::limits::MAX_PAYLOAD_BYTES;

/// All startup configuration for the server.
///
/// # Example
///
/// ```rust
/// use rein_server::domain::ServerConfig;
///
/// let cfg = ServerConfig::default();
/// assert_eq!(cfg.bind_addr.port(), 3000);
/// assert_eq!(cfg.ws_path, "/ws");
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: SocketAddr,

    /// The only URL path accepted for upgrades.
    pub ws_path: String,

    /// Text frames larger than this are dropped unparsed.
    pub max_payload_bytes: usize,

    /// Identical raw payloads closer together than this are dropped.
    pub duplicate_window: Duration,

    /// Tokens unused for this long are purged.
    pub token_idle_ttl: Duration,

    /// Tokens older than this are purged regardless of use.
    pub token_max_age: Duration,

    /// Minimum spacing between two last-used refreshes of one token.
    pub token_touch_interval: Duration,

    /// Unresolved pairing requests expire after this long.
    pub pairing_ttl: Duration,

    /// Upper bound on one screen capture.
    pub capture_timeout: Duration,

    /// Frames wider than this are downscaled.
    pub max_frame_width: u32,

    /// JPEG quality, 1–100.
    pub jpeg_quality: u8,

    /// Period of the `cursor-pos` stream while mirroring.
    pub cursor_interval: Duration,

    /// A cursor tick is skipped while more than this many messages are queued.
    pub cursor_backlog_limit: usize,

    /// Capacity of each connection's outbound queue.
    pub outbound_capacity: usize,

    /// Whether desktop clipboard changes are pushed to devices.
    pub clipboard_sync: bool,

    /// Poll period of the desktop clipboard watcher.
    pub clipboard_poll_interval: Duration,

    /// Location of the JSON runtime configuration file.
    pub runtime_config_path: PathBuf,
}

impl Default for ServerConfig {
    /// | Field                    | Default                  |
    /// |--------------------------|--------------------------|
    /// | bind_addr                | `0.0.0.0:3000`           |
    /// | ws_path                  | `/ws`                    |
    /// | max_payload_bytes        | 10 KiB                   |
    /// | duplicate_window         | 30 ms                    |
    /// | token_idle_ttl           | 12 hours                 |
    /// | token_max_age            | 12 hours                 |
    /// | token_touch_interval     | 1 second                 |
    /// | pairing_ttl              | 5 minutes                |
    /// | capture_timeout          | 2 seconds                |
    /// | max_frame_width          | 1280                     |
    /// | jpeg_quality             | 60                       |
    /// | cursor_interval          | 100 ms                   |
    /// | cursor_backlog_limit     | 2                        |
    /// | outbound_capacity        | 64                       |
    /// | clipboard_sync           | `true`                   |
    /// | clipboard_poll_interval  | 300 ms                   |
    /// | runtime_config_path      | `server-config.json`     |
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            ws_path: "/ws".to_string(),
            max_payload_bytes: MAX_PAYLOAD_BYTES,
            duplicate_window: Duration::from_millis(30),
            token_idle_ttl: Duration::from_secs(12 * 60 * 60),
            token_max_age: Duration::from_secs(12 * 60 * 60),
            token_touch_interval: Duration::from_secs(1),
            pairing_ttl: Duration::from_secs(5 * 60),
            capture_timeout: Duration::from_secs(2),
            max_frame_width: 1280,
            jpeg_quality: 60,
            cursor_interval: Duration::from_millis(100),
            cursor_backlog_limit: 2,
            outbound_capacity: 64,
            clipboard_sync: true,
            clipboard_poll_interval: Duration::from_millis(300),
            runtime_config_path: PathBuf::from("server-config.json"),
        }
    }
}
