//! JSON message types for the device-facing WebSocket protocol.
//!
//! # JSON discriminant
//!
//! Every text frame is a JSON object whose `"type"` field names the message
//! kind; the remaining fields sit next to it in the same object:
//!
//! ```json
//! {"type":"move","dx":12,"dy":-3}
//! {"type":"click","button":"left","press":true}
//! {"type":"request-pairing","deviceName":"Pixel 8","userAgent":"Mozilla/5.0 …"}
//! ```
//!
//! # Three families of messages
//!
//! - [`InputMessage`] – things that end up as OS input.  These are *never*
//!   deserialised directly with serde; the only way to build one from network
//!   data is [`crate::validate`], which checks every field by hand so that
//!   `NaN`, wrong types and unknown buttons are rejected with a reason.
//! - [`AdminRequest`] – session, pairing, config and mirror control.  These
//!   are handled by the connection manager and never reach the executor.
//! - [`ServerMessage`] – everything the server sends back.
//!
//! Binary frames are used only server → device, for JPEG mirror frames.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Input messages ────────────────────────────────────────────────────────────

/// Mouse buttons a device may press or release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    /// Parses the wire name (`"left"`, `"right"`, `"middle"`).
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "middle" => Some(Self::Middle),
            _ => None,
        }
    }
}

/// The closed set of input kinds.
///
/// Used as the rate-limiter domain and for log-safe names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    Move,
    Click,
    Scroll,
    Zoom,
    Key,
    Combo,
    Text,
    ClipboardCopy,
    ClipboardPaste,
}

impl InputKind {
    /// Every input kind, in wire order.
    pub const ALL: [InputKind; 9] = [
        InputKind::Move,
        InputKind::Click,
        InputKind::Scroll,
        InputKind::Zoom,
        InputKind::Key,
        InputKind::Combo,
        InputKind::Text,
        InputKind::ClipboardCopy,
        InputKind::ClipboardPaste,
    ];

    /// Maps a `"type"` value to its kind.
    ///
    /// The legacy names `copy` and `paste` are accepted as aliases for the
    /// clipboard kinds.
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "move" => Some(Self::Move),
            "click" => Some(Self::Click),
            "scroll" => Some(Self::Scroll),
            "zoom" => Some(Self::Zoom),
            "key" => Some(Self::Key),
            "combo" => Some(Self::Combo),
            "text" => Some(Self::Text),
            "clipboard-copy" | "copy" => Some(Self::ClipboardCopy),
            "clipboard-paste" | "paste" => Some(Self::ClipboardPaste),
            _ => None,
        }
    }

    /// Canonical wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Move => "move",
            Self::Click => "click",
            Self::Scroll => "scroll",
            Self::Zoom => "zoom",
            Self::Key => "key",
            Self::Combo => "combo",
            Self::Text => "text",
            Self::ClipboardCopy => "clipboard-copy",
            Self::ClipboardPaste => "clipboard-paste",
        }
    }
}

/// A structurally valid input message.
///
/// Constructed only by [`crate::validate`].  Field values may still be out of
/// range until [`crate::sanitize`] has run.
#[derive(Debug, Clone, PartialEq)]
pub enum InputMessage {
    /// Relative pointer motion in pixels.
    Move { dx: f64, dy: f64 },
    /// Press (`press = true`) or release of a single button.
    Click { button: MouseButton, press: bool },
    /// Scroll amounts; an axis that was absent on the wire is `0.0`.
    /// Positive `dy` scrolls content down.
    Scroll { dx: f64, dy: f64 },
    /// Pinch zoom; positive deltas zoom in.
    Zoom { delta: f64 },
    /// A single logical key such as `"enter"` or `"a"`.
    Key { key: String },
    /// Keys held together, pressed in order.
    Combo { keys: Vec<String> },
    /// Literal text to type.
    Text { text: String },
    /// Copy the desktop selection and report the clipboard back.
    ClipboardCopy,
    /// Optionally set the clipboard, then paste.
    ClipboardPaste { text: Option<String> },
}

impl InputMessage {
    /// The kind of this message.
    pub fn kind(&self) -> InputKind {
        match self {
            Self::Move { .. } => InputKind::Move,
            Self::Click { .. } => InputKind::Click,
            Self::Scroll { .. } => InputKind::Scroll,
            Self::Zoom { .. } => InputKind::Zoom,
            Self::Key { .. } => InputKind::Key,
            Self::Combo { .. } => InputKind::Combo,
            Self::Text { .. } => InputKind::Text,
            Self::ClipboardCopy => InputKind::ClipboardCopy,
            Self::ClipboardPaste { .. } => InputKind::ClipboardPaste,
        }
    }
}

// ── Administrative requests ───────────────────────────────────────────────────

/// Control messages handled by the connection manager.
///
/// ```json
/// {"type":"approve-pairing","requestId":"5f0c…"}
/// {"type":"update-config","config":{"inputThrottleMs":12}}
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AdminRequest {
    GetIp,
    GenerateToken,
    RequestPairing {
        #[serde(rename = "deviceName", default)]
        device_name: Option<String>,
        #[serde(rename = "userAgent", default)]
        user_agent: Option<String>,
    },
    ApprovePairing {
        #[serde(rename = "requestId")]
        request_id: String,
    },
    RejectPairing {
        #[serde(rename = "requestId")]
        request_id: String,
    },
    GetPendingPairings,
    UpdateConfig {
        config: Map<String, Value>,
    },
    RequestFrame,
    StartMirror,
    StopMirror,
}

impl AdminRequest {
    /// All administrative `"type"` values.
    pub const KINDS: [&'static str; 10] = [
        "get-ip",
        "generate-token",
        "request-pairing",
        "approve-pairing",
        "reject-pairing",
        "get-pending-pairings",
        "update-config",
        "request-frame",
        "start-mirror",
        "stop-mirror",
    ];

    /// Returns `true` if `name` is an administrative message kind.
    pub fn is_admin_kind(name: &str) -> bool {
        Self::KINDS.contains(&name)
    }

    /// Returns a short type-name string for logging.
    ///
    /// Never includes field values, so request ids and config contents stay
    /// out of the logs.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::GetIp => "get-ip",
            Self::GenerateToken => "generate-token",
            Self::RequestPairing { .. } => "request-pairing",
            Self::ApprovePairing { .. } => "approve-pairing",
            Self::RejectPairing { .. } => "reject-pairing",
            Self::GetPendingPairings => "get-pending-pairings",
            Self::UpdateConfig { .. } => "update-config",
            Self::RequestFrame => "request-frame",
            Self::StartMirror => "start-mirror",
            Self::StopMirror => "stop-mirror",
        }
    }
}

// ── Server → device messages ──────────────────────────────────────────────────

/// A pending pairing request as listed to the local operator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingSummary {
    pub request_id: String,
    pub device_name: String,
    pub user_agent: String,
    /// Seconds since the request was opened.
    pub age_secs: u64,
}

/// Every text message the server sends.
///
/// ```json
/// {"type":"connected","serverIp":"192.168.1.20"}
/// {"type":"mirror-error","message":"capture timed out"}
/// {"type":"cursor-pos","fx":0.5,"fy":0.25}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    Connected {
        server_ip: String,
    },
    ServerIp {
        ip: String,
    },
    TokenGenerated {
        token: String,
    },
    PairingRequested {
        request_id: String,
    },
    /// Sent to local connections so an operator console can approve.
    PairingPending {
        request_id: String,
        device_name: String,
        user_agent: String,
    },
    PendingPairings {
        requests: Vec<PairingSummary>,
    },
    PairingApproved {
        request_id: String,
        token: String,
    },
    PairingRejected {
        request_id: String,
    },
    PairingError {
        error: String,
    },
    AuthError {
        error: String,
    },
    MirrorError {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_wayland: Option<bool>,
    },
    CursorPos {
        fx: f64,
        fy: f64,
    },
    ClipboardText {
        text: String,
    },
    ConfigUpdated {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl ServerMessage {
    /// Returns a short type-name string for logging.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::ServerIp { .. } => "server-ip",
            Self::TokenGenerated { .. } => "token-generated",
            Self::PairingRequested { .. } => "pairing-requested",
            Self::PairingPending { .. } => "pairing-pending",
            Self::PendingPairings { .. } => "pending-pairings",
            Self::PairingApproved { .. } => "pairing-approved",
            Self::PairingRejected { .. } => "pairing-rejected",
            Self::PairingError { .. } => "pairing-error",
            Self::AuthError { .. } => "auth-error",
            Self::MirrorError { .. } => "mirror-error",
            Self::CursorPos { .. } => "cursor-pos",
            Self::ClipboardText { .. } => "clipboard-text",
            Self::ConfigUpdated { .. } => "config-updated",
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_input_kind_wire_names_round_trip_through_from_wire() {
        for kind in InputKind::ALL {
            assert_eq!(InputKind::from_wire(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn test_legacy_clipboard_aliases_are_accepted() {
        assert_eq!(InputKind::from_wire("copy"), Some(InputKind::ClipboardCopy));
        assert_eq!(InputKind::from_wire("paste"), Some(InputKind::ClipboardPaste));
    }

    #[test]
    fn test_admin_kinds_do_not_overlap_input_kinds() {
        for name in AdminRequest::KINDS {
            assert!(InputKind::from_wire(name).is_none(), "{name}");
        }
    }

    #[test]
    fn test_request_pairing_fields_are_optional() {
        // Arrange
        let raw = json!({"type": "request-pairing"});

        // Act
        let parsed: AdminRequest = serde_json::from_value(raw).unwrap();

        // Assert
        assert_eq!(
            parsed,
            AdminRequest::RequestPairing {
                device_name: None,
                user_agent: None
            }
        );
    }

    #[test]
    fn test_approve_pairing_reads_camel_case_request_id() {
        let raw = json!({"type": "approve-pairing", "requestId": "abc"});
        let parsed: AdminRequest = serde_json::from_value(raw).unwrap();
        assert_eq!(
            parsed,
            AdminRequest::ApprovePairing {
                request_id: "abc".to_string()
            }
        );
    }

    #[test]
    fn test_update_config_requires_object() {
        let raw = json!({"type": "update-config", "config": 5});
        assert!(serde_json::from_value::<AdminRequest>(raw).is_err());
    }

    #[test]
    fn test_connected_serialises_with_camel_case_field() {
        let msg = ServerMessage::Connected {
            server_ip: "10.0.0.2".to_string(),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value, json!({"type": "connected", "serverIp": "10.0.0.2"}));
    }

    #[test]
    fn test_mirror_error_omits_absent_wayland_flag() {
        let msg = ServerMessage::MirrorError {
            message: "capture timed out".to_string(),
            is_wayland: None,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({"type": "mirror-error", "message": "capture timed out"})
        );
    }

    #[test]
    fn test_mirror_error_includes_wayland_flag_when_set() {
        let msg = ServerMessage::MirrorError {
            message: "unsupported".to_string(),
            is_wayland: Some(true),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["isWayland"], json!(true));
    }

    #[test]
    fn test_pairing_approved_field_names() {
        let msg = ServerMessage::PairingApproved {
            request_id: "r1".to_string(),
            token: "t1".to_string(),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({"type": "pairing-approved", "requestId": "r1", "token": "t1"})
        );
    }

    #[test]
    fn test_kind_name_never_contains_token() {
        let msg = ServerMessage::TokenGenerated {
            token: "secret-token".to_string(),
        };
        assert_eq!(msg.kind_name(), "token-generated");
    }
}
