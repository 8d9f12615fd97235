//! Recording automation backend for tests and `--dry-run`.
//!
//! # Why a recording backend?
//!
//! The real backends (`X11Automation`, `WindowsAutomation`,
//! `MacosAutomation`) make OS calls that:
//!
//! - Require a desktop session to run.
//! - Actually move the pointer or press keys on the machine running the tests.
//! - Cannot be observed directly from Rust test code.
//!
//! `RecordingAutomation` replaces every OS call with an in-memory record.
//! Each successful action is pushed into a `Mutex<Vec<Action>>` so assertions
//! can inspect exactly what was injected and in what order.
//!
//! # Usage in tests
//!
//! ```ignore
//! let automation = Arc::new(RecordingAutomation::new());
//! automation.set_position(100, 100);
//! // ... drive the executor ...
//! assert_eq!(automation.actions(), vec![Action::MoveTo(110, 79)]);
//! ```
//!
//! # Failure injection
//!
//! `fail_pointer`, `fail_scroll` and `fail_key` make the matching calls return
//! `AutomationError::Platform`.  Failed calls are not recorded.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use rein_core::{LogicalKey, MouseButton};

use crate::application::execute_input::{Automation, AutomationError};
use crate::application::lock;

/// One recorded automation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    MoveTo(i32, i32),
    ButtonDown(MouseButton),
    ButtonUp(MouseButton),
    Scroll(i32, i32),
    Type(String),
    KeyDown(LogicalKey),
    KeyUp(LogicalKey),
}

type Hook = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct State {
    position: (i32, i32),
    actions: Vec<Action>,
    fail_pointer: bool,
    fail_scroll: bool,
    failing_keys: HashSet<LogicalKey>,
    key_hooks: HashMap<LogicalKey, Hook>,
}

/// An automation backend that records calls instead of performing them.
#[derive(Default)]
pub struct RecordingAutomation {
    state: Mutex<State>,
}

impl RecordingAutomation {
    /// Creates a recorder with the pointer at (0, 0) and nothing recorded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the simulated pointer without recording an action.
    pub fn set_position(&self, x: i32, y: i32) {
        lock(&self.state).position = (x, y);
    }

    /// Everything recorded so far, in order.
    pub fn actions(&self) -> Vec<Action> {
        lock(&self.state).actions.clone()
    }

    pub fn fail_pointer(&self, fail: bool) {
        lock(&self.state).fail_pointer = fail;
    }

    pub fn fail_scroll(&self, fail: bool) {
        lock(&self.state).fail_scroll = fail;
    }

    /// Makes every `press_key(key)` fail.
    pub fn fail_key(&self, key: LogicalKey) {
        lock(&self.state).failing_keys.insert(key);
    }

    /// Runs `hook` after each successful `press_key(key)`.
    pub fn on_key_down(&self, key: LogicalKey, hook: impl Fn() + Send + Sync + 'static) {
        lock(&self.state).key_hooks.insert(key, Arc::new(hook));
    }

    fn record(&self, action: Action) {
        lock(&self.state).actions.push(action);
    }
}

fn injected(what: &str) -> AutomationError {
    AutomationError::Platform(format!("injected {what} failure"))
}

impl Automation for RecordingAutomation {
    fn pointer_position(&self) -> Result<(i32, i32), AutomationError> {
        let state = lock(&self.state);
        if state.fail_pointer {
            return Err(injected("pointer"));
        }
        Ok(state.position)
    }

    fn set_pointer_position(&self, x: i32, y: i32) -> Result<(), AutomationError> {
        let mut state = lock(&self.state);
        if state.fail_pointer {
            return Err(injected("pointer"));
        }
        state.position = (x, y);
        state.actions.push(Action::MoveTo(x, y));
        Ok(())
    }

    fn press_button(&self, button: MouseButton) -> Result<(), AutomationError> {
        self.record(Action::ButtonDown(button));
        Ok(())
    }

    fn release_button(&self, button: MouseButton) -> Result<(), AutomationError> {
        self.record(Action::ButtonUp(button));
        Ok(())
    }

    fn scroll(&self, dx: i32, dy: i32) -> Result<(), AutomationError> {
        let mut state = lock(&self.state);
        if state.fail_scroll {
            return Err(injected("scroll"));
        }
        state.actions.push(Action::Scroll(dx, dy));
        Ok(())
    }

    fn type_text(&self, text: &str) -> Result<(), AutomationError> {
        self.record(Action::Type(text.to_string()));
        Ok(())
    }

    fn press_key(&self, key: LogicalKey) -> Result<(), AutomationError> {
        let hook = {
            let mut state = lock(&self.state);
            if state.failing_keys.contains(&key) {
                return Err(injected("key"));
            }
            state.actions.push(Action::KeyDown(key));
            state.key_hooks.get(&key).cloned()
        };
        // Outside the lock: hooks may touch other shared test fixtures.
        if let Some(hook) = hook {
            hook();
        }
        Ok(())
    }

    fn release_key(&self, key: LogicalKey) -> Result<(), AutomationError> {
        self.record(Action::KeyUp(key));
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_calls_are_not_recorded() {
        // Arrange
        let automation = RecordingAutomation::new();
        automation.fail_key(LogicalKey::Char('x'));
        automation.fail_scroll(true);

        // Act
        let key = automation.press_key(LogicalKey::Char('x'));
        let scroll = automation.scroll(0, 1);
        automation.press_key(LogicalKey::Char('y')).unwrap();

        // Assert
        assert!(key.is_err());
        assert!(scroll.is_err());
        assert_eq!(automation.actions(), vec![Action::KeyDown(LogicalKey::Char('y'))]);
    }

    #[test]
    fn test_pointer_tracks_moves() {
        let automation = RecordingAutomation::new();
        automation.set_position(5, 6);
        assert_eq!(automation.pointer_position().unwrap(), (5, 6));

        automation.set_pointer_position(7, 8).unwrap();
        assert_eq!(automation.pointer_position().unwrap(), (7, 8));
        assert_eq!(automation.actions(), vec![Action::MoveTo(7, 8)]);
    }
}
