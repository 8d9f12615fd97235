//! Numeric bounds, length caps and per-kind dispatch intervals.
//!
//! These values are the contract between the device client and the server.
//! The sanitizer narrows borderline values to these bounds; the rate limiter
//! reads the intervals; the connection manager enforces the payload cap.

use std::time::Duration;

/// Largest accepted pointer or scroll delta on either axis, in pixels.
pub const MAX_POINTER_DELTA: f64 = 5000.0;

/// Largest accepted pinch-zoom delta magnitude.
pub const MAX_ZOOM_DELTA: f64 = 100.0;

/// Maximum characters in a `text` message.
pub const MAX_TEXT_CHARS: usize = 1000;

/// Maximum characters in a `key` name.
pub const MAX_KEY_CHARS: usize = 50;

/// Maximum number of keys in a `combo`.
pub const MAX_COMBO_KEYS: usize = 10;

/// Maximum characters the device may push into the desktop clipboard.
pub const MAX_CLIPBOARD_CHARS: usize = 10_000;

/// Frames larger than this are dropped without being parsed.
pub const MAX_PAYLOAD_BYTES: usize = 10 * 1024;

/// Interval used for kinds that have no dedicated entry in [`min_interval`].
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(33);

/// Returns the minimum spacing between two processed messages of `kind` on
/// one connection.
///
/// | Kind                                   | Interval |
/// |----------------------------------------|----------|
/// | `move`, `scroll`                       | 16 ms    |
/// | `click`, `zoom`, `combo`               | 50 ms    |
/// | `clipboard-copy`, `clipboard-paste`    | 50 ms    |
/// | `text`, `key`                          | 100 ms   |
/// | anything else                          | 33 ms    |
pub fn min_interval(kind: &str) -> Duration {
    match kind {
        "move" | "scroll" => Duration::from_millis(16),
        "click" | "zoom" | "combo" | "clipboard-copy" | "clipboard-paste" => {
            Duration::from_millis(50)
        }
        "text" | "key" => Duration::from_millis(100),
        _ => DEFAULT_INTERVAL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pointer_kinds_have_tightest_interval() {
        assert_eq!(min_interval("move"), Duration::from_millis(16));
        assert_eq!(min_interval("scroll"), Duration::from_millis(16));
    }

    #[test]
    fn test_discrete_kinds_are_looser_than_pointer_kinds() {
        for kind in ["click", "zoom", "combo", "clipboard-copy", "clipboard-paste"] {
            assert!(min_interval(kind) > min_interval("move"), "{kind}");
        }
        assert_eq!(min_interval("key"), Duration::from_millis(100));
    }

    #[test]
    fn test_unlisted_kind_uses_default_interval() {
        assert_eq!(min_interval("request-frame"), DEFAULT_INTERVAL);
    }
}
