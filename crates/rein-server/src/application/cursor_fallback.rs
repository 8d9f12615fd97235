//! Pointer movement with a secondary backend and a circuit breaker.
//!
//! On some desktops (notably Wayland sessions) the primary automation backend
//! cannot move the pointer.  Linux hosts may have `ydotool` installed, which
//! goes through the kernel's uinput device instead and works everywhere.
//!
//! ```text
//!   move ──► primary ──ok──► done (breaker reset)
//!              │
//!              └─err──► in cooldown? ──yes──► give up
//!                          │no
//!                       errors >= 5? ──yes──► give up until reset()
//!                          │no
//!                       fallback ──ok──► done (breaker reset)
//!                          └─err──► errors += 1, start cooldown
//! ```
//!
//! The controller never returns an error.  Every attempt resolves to a
//! [`MoveOutcome`] describing what happened.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::application::execute_input::{Automation, AutomationError};
use crate::application::lock;

/// Fallback failures tolerated before the fallback is switched off.
pub const MAX_CONSECUTIVE_ERRORS: u32 = 5;

/// After a fallback failure, no fallback is attempted for this long.
pub const ERROR_COOLDOWN: Duration = Duration::from_secs(1);

/// Which backend carried out a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveMethod {
    Primary,
    Fallback,
    None,
}

/// Result of a move attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveOutcome {
    pub success: bool,
    pub method: MoveMethod,
    pub message: String,
}

impl MoveOutcome {
    fn ok(method: MoveMethod, message: String) -> Self {
        Self {
            success: true,
            method,
            message,
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            method: MoveMethod::None,
            message: message.into(),
        }
    }
}

/// Whether a fallback backend can be used, and why not if it cannot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackAvailability {
    pub available: bool,
    pub reason: String,
}

/// A secondary pointer backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FallbackPointer: Send + Sync {
    fn availability(&self) -> FallbackAvailability;
    async fn move_absolute(&self, x: i32, y: i32) -> Result<(), AutomationError>;
    async fn move_relative(&self, dx: i32, dy: i32) -> Result<(), AutomationError>;
}

/// Diagnostic snapshot returned by [`CursorController::status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorStatus {
    pub primary_available: bool,
    pub fallback_available: bool,
    pub fallback_reason: String,
    pub consecutive_errors: u32,
}

#[derive(Debug, Default)]
struct Breaker {
    consecutive_errors: u32,
    last_error: Option<Instant>,
}

/// Target of a move, in whole pixels.
#[derive(Debug, Clone, Copy)]
enum Target {
    Absolute(i32, i32),
    Relative(i32, i32),
}

/// Moves the pointer, falling back to a secondary backend when needed.
pub struct CursorController {
    primary: Arc<dyn Automation>,
    fallback: Option<Arc<dyn FallbackPointer>>,
    breaker: Mutex<Breaker>,
}

impl CursorController {
    pub fn new(primary: Arc<dyn Automation>, fallback: Option<Arc<dyn FallbackPointer>>) -> Self {
        Self {
            primary,
            fallback,
            breaker: Mutex::new(Breaker::default()),
        }
    }

    /// Moves the pointer to `(x, y)` in screen pixels.
    pub async fn move_absolute(&self, x: f64, y: f64) -> MoveOutcome {
        if !x.is_finite() || !y.is_finite() {
            return MoveOutcome::failed(format!("invalid coordinates ({x}, {y})"));
        }
        let (x, y) = (x.round() as i32, y.round() as i32);
        let primary = self.primary.set_pointer_position(x, y);
        self.finish(primary, Target::Absolute(x, y)).await
    }

    /// Moves the pointer by `(dx, dy)` pixels.
    pub async fn move_relative(&self, dx: f64, dy: f64) -> MoveOutcome {
        if !dx.is_finite() || !dy.is_finite() {
            return MoveOutcome::failed(format!("invalid offset ({dx}, {dy})"));
        }
        let primary = self.primary.pointer_position().and_then(|(x, y)| {
            let tx = (f64::from(x) + dx).round() as i32;
            let ty = (f64::from(y) + dy).round() as i32;
            self.primary.set_pointer_position(tx, ty)
        });
        self.finish(primary, Target::Relative(dx.round() as i32, dy.round() as i32))
            .await
    }

    /// Pointer position according to the primary backend.
    pub fn current_position(&self) -> Option<(i32, i32)> {
        self.primary.pointer_position().ok()
    }

    pub fn status(&self) -> CursorStatus {
        let fallback = match &self.fallback {
            Some(f) => f.availability(),
            None => FallbackAvailability {
                available: false,
                reason: "no fallback backend on this platform".into(),
            },
        };
        CursorStatus {
            primary_available: self.primary.pointer_position().is_ok(),
            fallback_available: fallback.available,
            fallback_reason: fallback.reason,
            consecutive_errors: lock(&self.breaker).consecutive_errors,
        }
    }

    /// Clears the breaker so the fallback is tried again.
    pub fn reset(&self) {
        *lock(&self.breaker) = Breaker::default();
    }

    async fn finish(&self, primary: Result<(), AutomationError>, target: Target) -> MoveOutcome {
        let primary_err = match primary {
            Ok(()) => {
                self.reset();
                return MoveOutcome::ok(MoveMethod::Primary, format!("{target:?}"));
            }
            Err(e) => e,
        };

        let now = Instant::now();
        {
            let breaker = lock(&self.breaker);
            if let Some(at) = breaker.last_error {
                if now.saturating_duration_since(at) < ERROR_COOLDOWN {
                    return MoveOutcome::failed("error cooldown active, fallback skipped");
                }
            }
            if breaker.consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                return MoveOutcome::failed("too many consecutive errors");
            }
        }

        debug!("primary pointer backend failed: {primary_err}");
        let fallback = match &self.fallback {
            Some(f) if f.availability().available => Arc::clone(f),
            _ => {
                self.record_failure(now);
                return MoveOutcome::failed(format!(
                    "primary failed ({primary_err}) and no fallback is available"
                ));
            }
        };

        let result = match target {
            Target::Absolute(x, y) => fallback.move_absolute(x, y).await,
            Target::Relative(dx, dy) => fallback.move_relative(dx, dy).await,
        };
        match result {
            Ok(()) => {
                self.reset();
                MoveOutcome::ok(MoveMethod::Fallback, format!("{target:?} via fallback"))
            }
            Err(e) => {
                self.record_failure(now);
                warn!("fallback pointer backend failed: {e}");
                MoveOutcome::failed(format!("fallback failed: {e}"))
            }
        }
    }

    fn record_failure(&self, at: Instant) {
        let mut breaker = lock(&self.breaker);
        breaker.consecutive_errors += 1;
        breaker.last_error = Some(at);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::automation::mock::{Action, RecordingAutomation};

    fn available() -> FallbackAvailability {
        FallbackAvailability {
            available: true,
            reason: "ydotool detected".into(),
        }
    }

    fn broken_primary() -> Arc<RecordingAutomation> {
        let automation = Arc::new(RecordingAutomation::new());
        automation.fail_pointer(true);
        automation
    }

    #[tokio::test]
    async fn test_primary_success_uses_primary() {
        let automation = Arc::new(RecordingAutomation::new());
        let ctl = CursorController::new(automation.clone(), None);

        let out = ctl.move_absolute(12.4, 7.6).await;

        assert!(out.success);
        assert_eq!(out.method, MoveMethod::Primary);
        assert_eq!(automation.actions(), vec![Action::MoveTo(12, 8)]);
    }

    #[tokio::test]
    async fn test_non_finite_coordinates_are_rejected() {
        let automation = Arc::new(RecordingAutomation::new());
        let ctl = CursorController::new(automation.clone(), None);

        let out = ctl.move_absolute(f64::NAN, 0.0).await;

        assert!(!out.success);
        assert_eq!(out.method, MoveMethod::None);
        assert!(automation.actions().is_empty());
    }

    #[tokio::test]
    async fn test_primary_failure_uses_fallback() {
        // Arrange
        let mut fallback = MockFallbackPointer::new();
        fallback.expect_availability().returning(available);
        fallback
            .expect_move_relative()
            .withf(|dx, dy| *dx == 3 && *dy == -2)
            .times(1)
            .returning(|_, _| Ok(()));
        let ctl = CursorController::new(broken_primary(), Some(Arc::new(fallback)));

        // Act
        let out = ctl.move_relative(3.0, -2.0).await;

        // Assert
        assert!(out.success);
        assert_eq!(out.method, MoveMethod::Fallback);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_skips_fallback() {
        let mut fallback = MockFallbackPointer::new();
        fallback.expect_availability().returning(available);
        fallback
            .expect_move_absolute()
            .times(1)
            .returning(|_, _| Err(AutomationError::Platform("daemon down".into())));
        let ctl = CursorController::new(broken_primary(), Some(Arc::new(fallback)));

        let first = ctl.move_absolute(1.0, 1.0).await;
        let second = ctl.move_absolute(1.0, 1.0).await;

        assert!(!first.success);
        assert!(!second.success);
        assert!(second.message.contains("cooldown"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_opens_after_threshold_until_reset() {
        // Arrange: the fallback always fails.
        let mut fallback = MockFallbackPointer::new();
        fallback.expect_availability().returning(available);
        fallback
            .expect_move_absolute()
            .times(MAX_CONSECUTIVE_ERRORS as usize + 1)
            .returning(|_, _| Err(AutomationError::Platform("no uinput".into())));
        let ctl = CursorController::new(broken_primary(), Some(Arc::new(fallback)));

        // Act: fail five times, waiting out each cooldown.
        for _ in 0..MAX_CONSECUTIVE_ERRORS {
            ctl.move_absolute(0.0, 0.0).await;
            tokio::time::advance(ERROR_COOLDOWN).await;
        }
        let tripped = ctl.move_absolute(0.0, 0.0).await;

        // Assert
        assert!(tripped.message.contains("too many"));
        assert_eq!(ctl.status().consecutive_errors, MAX_CONSECUTIVE_ERRORS);

        ctl.reset();
        let retried = ctl.move_absolute(0.0, 0.0).await;
        assert!(retried.message.contains("fallback failed"));
    }

    #[tokio::test]
    async fn test_missing_fallback_reports_failure() {
        let ctl = CursorController::new(broken_primary(), None);
        let out = ctl.move_relative(1.0, 1.0).await;
        assert!(!out.success);
        assert!(!ctl.status().fallback_available);
        assert!(!ctl.status().primary_available);
    }

    #[tokio::test]
    async fn test_fallback_success_resets_breaker() {
        let mut fallback = MockFallbackPointer::new();
        fallback.expect_availability().returning(available);
        fallback.expect_move_relative().returning(|_, _| Ok(()));
        let ctl = CursorController::new(broken_primary(), Some(Arc::new(fallback)));
        ctl.record_failure(Instant::now() - ERROR_COOLDOWN * 2);

        let out = ctl.move_relative(1.0, 0.0).await;

        assert!(out.success);
        assert_eq!(ctl.status().consecutive_errors, 0);
    }
}
