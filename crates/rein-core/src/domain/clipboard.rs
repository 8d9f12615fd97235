//! Clipboard record with TTL and echo suppression.
//!
//! The server watches the desktop clipboard and forwards changes to connected
//! devices.  The device can also push text into the desktop clipboard.  Without
//! care, a device write would be observed by the watcher a moment later and
//! echoed straight back to the device as if the desktop had copied it.
//!
//! [`ClipboardTracker`] remembers the last record and its origin:
//!
//! - A record is forgotten once it is older than the TTL (2 minutes, the
//!   same window "universal clipboard" features use).
//! - A change observed within the echo window (1 second) after a device
//!   write is not reported as a desktop copy.

use std::time::{Duration, Instant};

/// Default lifetime of a clipboard record.
pub const CLIPBOARD_TTL: Duration = Duration::from_secs(120);

/// Default loop-suppression window after a device write.
pub const ECHO_WINDOW: Duration = Duration::from_secs(1);

/// Where a clipboard value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardOrigin {
    Desktop,
    Device,
}

/// One clipboard value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardRecord {
    pub text: String,
    pub at: Instant,
    pub origin: ClipboardOrigin,
}

/// Tracks the most recent clipboard record.
#[derive(Debug)]
pub struct ClipboardTracker {
    last: Option<ClipboardRecord>,
    ttl: Duration,
    echo_window: Duration,
}

impl Default for ClipboardTracker {
    fn default() -> Self {
        Self::new(CLIPBOARD_TTL, ECHO_WINDOW)
    }
}

impl ClipboardTracker {
    pub fn new(ttl: Duration, echo_window: Duration) -> Self {
        Self {
            last: None,
            ttl,
            echo_window,
        }
    }

    /// Stores `text` as the current record.
    pub fn record(&mut self, text: impl Into<String>, origin: ClipboardOrigin, now: Instant) {
        self.last = Some(ClipboardRecord {
            text: text.into(),
            at: now,
            origin,
        });
    }

    /// Feeds a value read from the desktop clipboard.
    ///
    /// Returns the new record when it should be broadcast to devices, or
    /// `None` when the value is empty, unchanged, or an echo of a recent
    /// device write.
    pub fn observe_desktop(&mut self, text: &str, now: Instant) -> Option<ClipboardRecord> {
        self.expire(now);

        if text.is_empty() {
            return None;
        }
        if let Some(last) = &self.last {
            if last.text == text {
                return None;
            }
            if last.origin == ClipboardOrigin::Device
                && now.saturating_duration_since(last.at) < self.echo_window
            {
                return None;
            }
        }

        let record = ClipboardRecord {
            text: text.to_string(),
            at: now,
            origin: ClipboardOrigin::Desktop,
        };
        self.last = Some(record.clone());
        Some(record)
    }

    /// Returns the live record, dropping it first if the TTL has passed.
    pub fn current(&mut self, now: Instant) -> Option<&ClipboardRecord> {
        self.expire(now);
        self.last.as_ref()
    }

    fn expire(&mut self, now: Instant) {
        if let Some(last) = &self.last {
            if now.saturating_duration_since(last.at) > self.ttl {
                self.last = None;
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_desktop_value_is_reported() {
        let mut tracker = ClipboardTracker::default();
        let rec = tracker.observe_desktop("hello", Instant::now()).unwrap();
        assert_eq!(rec.origin, ClipboardOrigin::Desktop);
        assert_eq!(rec.text, "hello");
    }

    #[test]
    fn test_unchanged_value_is_not_reported_twice() {
        let mut tracker = ClipboardTracker::default();
        let t0 = Instant::now();
        assert!(tracker.observe_desktop("a", t0).is_some());
        assert!(tracker
            .observe_desktop("a", t0 + Duration::from_millis(300))
            .is_none());
    }

    #[test]
    fn test_empty_value_is_ignored() {
        let mut tracker = ClipboardTracker::default();
        assert!(tracker.observe_desktop("", Instant::now()).is_none());
    }

    #[test]
    fn test_change_right_after_device_write_is_suppressed() {
        // Arrange: the device just pushed text.
        let mut tracker = ClipboardTracker::default();
        let t0 = Instant::now();
        tracker.record("from phone", ClipboardOrigin::Device, t0);

        // Act: a different value shows up 200 ms later (e.g. a rich-text
        // normalisation of the same paste).
        let seen = tracker.observe_desktop("from phone\n", t0 + Duration::from_millis(200));

        // Assert
        assert!(seen.is_none());
    }

    #[test]
    fn test_device_write_is_not_echoed_back() {
        let mut tracker = ClipboardTracker::default();
        let t0 = Instant::now();
        tracker.record("from phone", ClipboardOrigin::Device, t0);
        assert!(tracker
            .observe_desktop("from phone", t0 + Duration::from_secs(5))
            .is_none());
    }

    #[test]
    fn test_change_after_echo_window_is_reported() {
        let mut tracker = ClipboardTracker::default();
        let t0 = Instant::now();
        tracker.record("from phone", ClipboardOrigin::Device, t0);
        assert!(tracker
            .observe_desktop("desktop copy", t0 + Duration::from_secs(2))
            .is_some());
    }

    #[test]
    fn test_record_expires_after_ttl() {
        let mut tracker = ClipboardTracker::default();
        let t0 = Instant::now();
        tracker.record("old", ClipboardOrigin::Desktop, t0);
        assert!(tracker.current(t0 + Duration::from_secs(60)).is_some());
        assert!(tracker.current(t0 + Duration::from_secs(121)).is_none());
    }
}
