//! Per-connection state that does not touch the network.
//!
//! # Admission states
//!
//! ```text
//!                      ┌──────────────► Local               (loopback peer)
//!   Unauthenticated ───┼──────────────► TokenAuthenticated  (?token= / ?pin=)
//!                      └─ request-pairing ─► PairingPending ─ approve ─► TokenAuthenticated
//! ```
//!
//! Only `Local` and `TokenAuthenticated` connections may send input or use
//! the mirror.  A token connection whose token disappears (expired or
//! revoked) drops back to `Unauthenticated`.

use std::time::{Duration, Instant};

/// Where a connection stands with respect to authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionState {
    Unauthenticated,
    Local,
    TokenAuthenticated,
    PairingPending,
}

impl AdmissionState {
    /// Whether input and mirror messages from this connection are executed.
    pub fn is_authorized(self) -> bool {
        matches!(self, Self::Local | Self::TokenAuthenticated)
    }
}

/// The admission state plus the token the connection authenticated with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub state: AdmissionState,
    pub token: Option<String>,
}

impl Admission {
    pub fn local() -> Self {
        Self {
            state: AdmissionState::Local,
            token: None,
        }
    }

    pub fn unauthenticated() -> Self {
        Self {
            state: AdmissionState::Unauthenticated,
            token: None,
        }
    }

    pub fn with_token(token: String) -> Self {
        Self {
            state: AdmissionState::TokenAuthenticated,
            token: Some(token),
        }
    }

    pub fn is_local(&self) -> bool {
        self.state == AdmissionState::Local
    }

    /// Moves to `PairingPending` unless the connection is already authorized.
    pub fn begin_pairing(&mut self) {
        if !self.state.is_authorized() {
            self.state = AdmissionState::PairingPending;
        }
    }

    /// Drops back to `Unauthenticated` after the token stopped validating.
    pub fn revoke(&mut self) {
        *self = Self::unauthenticated();
    }
}

/// Drops a raw payload identical to the previous one when it arrives too soon.
///
/// Some clients fire the same event from two listeners (touch and mouse); the
/// second copy lands within a few milliseconds of the first.
#[derive(Debug)]
pub struct DuplicateFilter {
    window: Duration,
    last: Option<(String, Instant)>,
}

impl DuplicateFilter {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Returns `true` if `raw` is a duplicate and should be dropped.
    ///
    /// Every payload, duplicate or not, becomes the new reference point.
    pub fn is_duplicate(&mut self, raw: &str, now: Instant) -> bool {
        let dup = match &self.last {
            Some((prev, at)) => prev == raw && now.saturating_duration_since(*at) < self.window,
            None => false,
        };
        self.last = Some((raw.to_string(), now));
        dup
    }
}

/// Limits how often a connection refreshes its token's last-used time.
#[derive(Debug)]
pub struct TouchThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl TouchThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Returns `true` (and records `now`) if a touch is due.
    pub fn due(&mut self, now: Instant) -> bool {
        match self.last {
            Some(at) if now.saturating_duration_since(at) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_local_and_token_are_authorized() {
        assert!(AdmissionState::Local.is_authorized());
        assert!(AdmissionState::TokenAuthenticated.is_authorized());
        assert!(!AdmissionState::Unauthenticated.is_authorized());
        assert!(!AdmissionState::PairingPending.is_authorized());
    }

    #[test]
    fn test_begin_pairing_does_not_demote_authorized() {
        let mut local = Admission::local();
        local.begin_pairing();
        assert_eq!(local.state, AdmissionState::Local);

        let mut anon = Admission::unauthenticated();
        anon.begin_pairing();
        assert_eq!(anon.state, AdmissionState::PairingPending);
    }

    #[test]
    fn test_revoke_clears_token() {
        let mut adm = Admission::with_token("t".into());
        adm.revoke();
        assert_eq!(adm, Admission::unauthenticated());
    }

    #[test]
    fn test_duplicate_within_window_is_dropped() {
        // Arrange
        let mut filter = DuplicateFilter::new(Duration::from_millis(30));
        let t0 = Instant::now();
        let raw = r#"{"type":"click","button":"left","press":true}"#;

        // Act / Assert
        assert!(!filter.is_duplicate(raw, t0));
        assert!(filter.is_duplicate(raw, t0 + Duration::from_millis(10)));
        assert!(!filter.is_duplicate(raw, t0 + Duration::from_millis(50)));
    }

    #[test]
    fn test_different_payload_is_not_duplicate() {
        let mut filter = DuplicateFilter::new(Duration::from_millis(30));
        let t0 = Instant::now();
        assert!(!filter.is_duplicate("a", t0));
        assert!(!filter.is_duplicate("b", t0));
        assert!(!filter.is_duplicate("a", t0));
    }

    #[test]
    fn test_touch_throttle() {
        let mut throttle = TouchThrottle::new(Duration::from_secs(1));
        let t0 = Instant::now();
        assert!(throttle.due(t0));
        assert!(!throttle.due(t0 + Duration::from_millis(999)));
        assert!(throttle.due(t0 + Duration::from_secs(1)));
    }
}
