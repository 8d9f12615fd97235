//! Per-connection, per-kind minimum-interval gate.
//!
//! Each connection gets its own table of "last processed" instants, one per
//! message kind.  A message is processed only if at least
//! [`min_interval(kind)`](crate::protocol::limits::min_interval) has passed
//! since the last processed message of the same kind on the same connection.
//!
//! Kinds are independent budgets: a burst of `move` never delays a `click`.
//! Connections are independent too: one device saturating its budget has no
//! effect on another.
//!
//! Over any window of length `t`, at most `ceil(t / interval) + 1` messages of
//! one kind pass, regardless of how many arrive.

use std::collections::HashMap;
use std::time::Instant;

use crate::domain::ConnectionId;
use crate::protocol::limits::min_interval;

/// Minimum-interval limiter keyed by connection and message kind.
#[derive(Debug, Default)]
pub struct RateLimiter {
    last: HashMap<ConnectionId, HashMap<&'static str, Instant>>,
}

impl RateLimiter {
    /// Creates an empty limiter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` and records the attempt if a `kind` message from
    /// `connection` may be processed now.
    pub fn should_process(&mut self, connection: ConnectionId, kind: &'static str) -> bool {
        self.should_process_at(connection, kind, Instant::now())
    }

    /// Same as [`should_process`](Self::should_process) with an explicit clock.
    pub fn should_process_at(
        &mut self,
        connection: ConnectionId,
        kind: &'static str,
        now: Instant,
    ) -> bool {
        let per_kind = self.last.entry(connection).or_default();
        match per_kind.get(kind) {
            Some(prev) if now.saturating_duration_since(*prev) < min_interval(kind) => false,
            _ => {
                per_kind.insert(kind, now);
                true
            }
        }
    }

    /// Releases every entry belonging to `connection`.
    pub fn cleanup(&mut self, connection: ConnectionId) {
        self.last.remove(&connection);
    }

    /// Number of connections currently holding state.
    pub fn active_connections(&self) -> usize {
        self.last.len()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use uuid::Uuid;

    #[test]
    fn test_first_message_always_passes() {
        let mut limiter = RateLimiter::new();
        assert!(limiter.should_process_at(Uuid::new_v4(), "move", Instant::now()));
    }

    #[test]
    fn test_burst_is_bounded_by_elapsed_over_interval() {
        // Arrange: 1000 moves spread evenly over 100 ms.
        let mut limiter = RateLimiter::new();
        let conn = Uuid::new_v4();
        let start = Instant::now();
        let elapsed = Duration::from_millis(100);
        let n = 1000u32;

        // Act
        let passed = (0..n)
            .filter(|i| {
                let now = start + elapsed * *i / n;
                limiter.should_process_at(conn, "move", now)
            })
            .count();

        // Assert: ceil(100 / 16) + 1 = 8
        assert!(passed <= 8, "passed {passed}");
        assert!(passed >= 6, "passed {passed}");
    }

    #[test]
    fn test_kinds_do_not_share_a_budget() {
        let mut limiter = RateLimiter::new();
        let conn = Uuid::new_v4();
        let now = Instant::now();

        assert!(limiter.should_process_at(conn, "move", now));
        assert!(!limiter.should_process_at(conn, "move", now));

        // Move is saturated; click and text are still fresh.
        assert!(limiter.should_process_at(conn, "click", now));
        assert!(limiter.should_process_at(conn, "text", now));
    }

    #[test]
    fn test_connections_do_not_share_a_budget() {
        let mut limiter = RateLimiter::new();
        let now = Instant::now();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        assert!(limiter.should_process_at(a, "move", now));
        assert!(!limiter.should_process_at(a, "move", now));
        assert!(limiter.should_process_at(b, "move", now));
    }

    #[test]
    fn test_message_passes_once_interval_has_elapsed() {
        let mut limiter = RateLimiter::new();
        let conn = Uuid::new_v4();
        let t0 = Instant::now();

        assert!(limiter.should_process_at(conn, "click", t0));
        assert!(!limiter.should_process_at(conn, "click", t0 + Duration::from_millis(49)));
        assert!(limiter.should_process_at(conn, "click", t0 + Duration::from_millis(50)));
    }

    #[test]
    fn test_cleanup_releases_connection_state() {
        // Arrange
        let mut limiter = RateLimiter::new();
        let conn = Uuid::new_v4();
        limiter.should_process(conn, "move");
        limiter.should_process(conn, "click");
        assert_eq!(limiter.active_connections(), 1);

        // Act
        limiter.cleanup(conn);

        // Assert
        assert_eq!(limiter.active_connections(), 0);
    }
}
