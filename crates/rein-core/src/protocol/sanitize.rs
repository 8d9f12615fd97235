//! Narrowing of validated messages to safe bounds.
//!
//! [`sanitize`] never fails and never rejects: it clamps numbers and trims
//! strings to the limits in [`super::limits`].  It is idempotent, so running
//! it twice is the same as running it once.
//!
//! Truncation counts Unicode scalar values (`char`s), not bytes, so a
//! multi-byte character is never split in half.

use super::limits::{
    MAX_CLIPBOARD_CHARS, MAX_COMBO_KEYS, MAX_KEY_CHARS, MAX_POINTER_DELTA, MAX_TEXT_CHARS,
    MAX_ZOOM_DELTA,
};
use super::messages::InputMessage;

/// Clamps and truncates every field of `msg` to its configured bound.
///
/// # Example
///
/// ```rust
/// use rein_core::{sanitize, InputMessage};
///
/// let msg = sanitize(InputMessage::Move { dx: 999_999.0, dy: -999_999.0 });
/// assert_eq!(msg, InputMessage::Move { dx: 5000.0, dy: -5000.0 });
/// ```
pub fn sanitize(msg: InputMessage) -> InputMessage {
    match msg {
        InputMessage::Move { dx, dy } => InputMessage::Move {
            dx: clamp_symmetric(dx, MAX_POINTER_DELTA),
            dy: clamp_symmetric(dy, MAX_POINTER_DELTA),
        },
        InputMessage::Scroll { dx, dy } => InputMessage::Scroll {
            dx: clamp_symmetric(dx, MAX_POINTER_DELTA),
            dy: clamp_symmetric(dy, MAX_POINTER_DELTA),
        },
        InputMessage::Zoom { delta } => InputMessage::Zoom {
            delta: clamp_symmetric(delta, MAX_ZOOM_DELTA),
        },
        InputMessage::Text { text } => InputMessage::Text {
            text: truncate_chars(text, MAX_TEXT_CHARS),
        },
        InputMessage::Key { key } => InputMessage::Key {
            key: truncate_chars(key, MAX_KEY_CHARS),
        },
        InputMessage::Combo { mut keys } => {
            keys.truncate(MAX_COMBO_KEYS);
            let keys = keys
                .into_iter()
                .map(|k| truncate_chars(k, MAX_KEY_CHARS))
                .collect();
            InputMessage::Combo { keys }
        }
        InputMessage::ClipboardPaste { text } => InputMessage::ClipboardPaste {
            text: text.map(|t| truncate_chars(t, MAX_CLIPBOARD_CHARS)),
        },
        other @ (InputMessage::Click { .. } | InputMessage::ClipboardCopy) => other,
    }
}

fn clamp_symmetric(value: f64, bound: f64) -> f64 {
    value.clamp(-bound, bound)
}

/// Keeps at most `max` characters of `s`.
pub fn truncate_chars(s: String, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((byte_idx, _)) => {
            let mut s = s;
            s.truncate(byte_idx);
            s
        }
        None => s,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
