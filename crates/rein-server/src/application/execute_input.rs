//! InputExecutor: replays sanitized device messages as desktop input.
//!
//! This use case sits at the application layer.  It never talks to the OS
//! directly; every action goes through two traits implemented in the
//! infrastructure layer:
//!
//! - [`Automation`]: pointer, buttons, wheel, keys and text
//! - [`ClipboardAccess`]: read and write the desktop clipboard
//!
//! # Failure policy
//!
//! Input replay is best-effort.  An OS call that fails is logged with
//! `warn!` and the message is considered handled; the device is not told.
//! The one exception is `clipboard-copy`, whose result text goes back to the
//! device.
//!
//! # Held keys
//!
//! Combos and zoom press modifiers and must release them no matter what
//! happens next: a later key failing, or the whole future being dropped when
//! the connection closes.  Held keys are owned by a [`HeldKeys`] guard that
//! releases them in reverse order from its `Drop` impl.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use rein_core::keymap::parse_key_name;
use rein_core::{
    ClipboardOrigin, ClipboardTracker, InputMessage, KeyName, LogicalKey, MouseButton,
    PlatformProfile,
};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::application::cursor_fallback::CursorController;
use crate::application::{lock, read};
use crate::domain::RuntimeConfig;

/// Pause between pressing the last combo key and releasing the first.
pub const COMBO_SETTLE: Duration = Duration::from_millis(10);

/// How many times `clipboard-copy` re-reads the clipboard after the shortcut.
pub const COPY_POLL_ATTEMPTS: usize = 10;

/// Spacing of those re-reads.
pub const COPY_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Upper bound on wheel notches for one zoom message.
pub const MAX_ZOOM_NOTCHES: i32 = 5;

/// Zoom delta that corresponds to one wheel notch.
const ZOOM_UNITS_PER_NOTCH: f64 = 10.0;

/// Error type for OS automation operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AutomationError {
    #[error("platform error: {0}")]
    Platform(String),
    #[error("not supported on this platform: {0}")]
    Unsupported(String),
    #[error("no native mapping for key {0:?}")]
    UnmappedKey(LogicalKey),
    #[error("clipboard error: {0}")]
    Clipboard(String),
}

/// Platform-agnostic desktop automation.
///
/// Each supported OS provides an implementation in the infrastructure layer.
/// Methods are synchronous; each one is a single cheap OS call.
pub trait Automation: Send + Sync {
    /// Current pointer position in screen pixels.
    fn pointer_position(&self) -> Result<(i32, i32), AutomationError>;

    /// Warps the pointer to an absolute position in screen pixels.
    fn set_pointer_position(&self, x: i32, y: i32) -> Result<(), AutomationError>;

    fn press_button(&self, button: MouseButton) -> Result<(), AutomationError>;

    fn release_button(&self, button: MouseButton) -> Result<(), AutomationError>;

    /// Scrolls by whole wheel notches.  Positive `dy` scrolls the content
    /// down, positive `dx` scrolls it right.  A zero axis is left alone.
    fn scroll(&self, dx: i32, dy: i32) -> Result<(), AutomationError>;

    /// Types `text` literally, independent of keyboard layout.
    fn type_text(&self, text: &str) -> Result<(), AutomationError>;

    fn press_key(&self, key: LogicalKey) -> Result<(), AutomationError>;

    fn release_key(&self, key: LogicalKey) -> Result<(), AutomationError>;

    /// Presses and releases `key`.
    fn tap_key(&self, key: LogicalKey) -> Result<(), AutomationError> {
        self.press_key(key)?;
        self.release_key(key)
    }
}

/// Desktop clipboard access.
pub trait ClipboardAccess: Send + Sync {
    fn read_text(&self) -> Result<String, AutomationError>;
    fn write_text(&self, text: &str) -> Result<(), AutomationError>;
}

/// Keys currently held down; released in reverse order on drop.
struct HeldKeys<'a> {
    automation: &'a dyn Automation,
    keys: Vec<LogicalKey>,
}

impl<'a> HeldKeys<'a> {
    fn new(automation: &'a dyn Automation) -> Self {
        Self {
            automation,
            keys: Vec::new(),
        }
    }

    /// Presses `key` and takes ownership of releasing it.
    fn press(&mut self, key: LogicalKey) -> Result<(), AutomationError> {
        self.automation.press_key(key)?;
        self.keys.push(key);
        Ok(())
    }
}

impl Drop for HeldKeys<'_> {
    fn drop(&mut self) {
        while let Some(key) = self.keys.pop() {
            if let Err(e) = self.automation.release_key(key) {
                warn!(?key, "failed to release held key: {e}");
            }
        }
    }
}

/// The Execute Input use case.
pub struct InputExecutor {
    automation: Arc<dyn Automation>,
    clipboard: Arc<dyn ClipboardAccess>,
    cursor: Arc<CursorController>,
    profile: PlatformProfile,
    clipboard_log: Arc<Mutex<ClipboardTracker>>,
    tuning: Arc<RwLock<RuntimeConfig>>,
}

impl InputExecutor {
    pub fn new(
        automation: Arc<dyn Automation>,
        clipboard: Arc<dyn ClipboardAccess>,
        cursor: Arc<CursorController>,
        profile: PlatformProfile,
        clipboard_log: Arc<Mutex<ClipboardTracker>>,
        tuning: Arc<RwLock<RuntimeConfig>>,
    ) -> Self {
        Self {
            automation,
            clipboard,
            cursor,
            profile,
            clipboard_log,
            tuning,
        }
    }

    pub fn cursor(&self) -> &Arc<CursorController> {
        &self.cursor
    }

    /// The current move-coalescing interval.
    pub fn move_interval(&self) -> Duration {
        read(&self.tuning).input_throttle()
    }

    /// Executes one sanitized message.
    ///
    /// Returns the clipboard text for `clipboard-copy`, `None` otherwise.
    pub async fn execute(&self, msg: InputMessage) -> Option<String> {
        let kind = msg.kind().as_str();
        let result = match msg {
            InputMessage::Move { dx, dy } => {
                self.apply_move(dx, dy).await;
                Ok(())
            }
            InputMessage::Click { button, press } => {
                if press {
                    self.automation.press_button(button)
                } else {
                    self.automation.release_button(button)
                }
            }
            InputMessage::Scroll { dx, dy } => self.scroll(dx, dy),
            InputMessage::Zoom { delta } => self.zoom(delta),
            InputMessage::Key { key } => self.key(&key),
            InputMessage::Combo { keys } => self.combo(&keys).await,
            InputMessage::Text { text } => self.automation.type_text(&text),
            InputMessage::ClipboardCopy => return Some(self.copy().await),
            InputMessage::ClipboardPaste { text } => self.paste(text),
        };
        if let Err(e) = result {
            warn!(kind, "input action failed: {e}");
        }
        None
    }

    /// Moves the pointer by a relative offset scaled by `mouseSensitivity`.
    pub async fn apply_move(&self, dx: f64, dy: f64) {
        let sensitivity = read(&self.tuning).mouse_sensitivity;
        let outcome = self
            .cursor
            .move_relative(dx * sensitivity, dy * sensitivity)
            .await;
        if !outcome.success {
            warn!(method = ?outcome.method, "pointer move failed: {}", outcome.message);
        }
    }

    fn scroll(&self, dx: f64, dy: f64) -> Result<(), AutomationError> {
        let sign = if read(&self.tuning).invert_scroll { -1.0 } else { 1.0 };
        let (x, y) = ((dx * sign).round() as i32, (dy * sign).round() as i32);
        if x == 0 && y == 0 {
            return Ok(());
        }
        self.automation.scroll(x, y)
    }

    fn zoom(&self, delta: f64) -> Result<(), AutomationError> {
        let notches = zoom_notches(delta);
        if notches == 0 {
            return Ok(());
        }
        let mut held = HeldKeys::new(self.automation.as_ref());
        held.press(self.profile.zoom_modifier)?;
        // Positive delta zooms in, which is a wheel-up.
        self.automation.scroll(0, -notches)
    }

    fn key(&self, name: &str) -> Result<(), AutomationError> {
        match parse_key_name(name) {
            KeyName::Named(key) => self.automation.tap_key(key),
            KeyName::Literal(c) => self.automation.type_text(c.encode_utf8(&mut [0; 4])),
            KeyName::Unknown => {
                warn!(chars = name.chars().count(), "unmapped key name dropped");
                Ok(())
            }
        }
    }

    async fn combo(&self, names: &[String]) -> Result<(), AutomationError> {
        let mut held = HeldKeys::new(self.automation.as_ref());
        for name in names {
            match parse_key_name(name) {
                KeyName::Named(key) => held.press(self.profile.translate_modifier(key))?,
                KeyName::Literal(c) => match LogicalKey::for_char(c) {
                    Some(key) => held.press(key)?,
                    None => self.automation.type_text(c.encode_utf8(&mut [0; 4]))?,
                },
                KeyName::Unknown => {
                    warn!(chars = name.chars().count(), "unmapped combo key skipped");
                }
            }
        }
        sleep(COMBO_SETTLE).await;
        drop(held);
        Ok(())
    }

    /// Sends the copy shortcut and waits briefly for the clipboard to change.
    ///
    /// Returns the new clipboard text, or the previous text if nothing
    /// changed in time.
    async fn copy(&self) -> String {
        let before = self.clipboard.read_text().unwrap_or_default();
        if let Err(e) = self.shortcut('c') {
            warn!("copy shortcut failed: {e}");
        }

        let mut text = before.clone();
        for _ in 0..COPY_POLL_ATTEMPTS {
            sleep(COPY_POLL_INTERVAL).await;
            match self.clipboard.read_text() {
                Ok(now) if now != before => {
                    text = now;
                    break;
                }
                Ok(_) => {}
                Err(e) => debug!("clipboard read failed while polling: {e}"),
            }
        }

        if !text.is_empty() {
            lock(&self.clipboard_log).record(
                text.clone(),
                ClipboardOrigin::Desktop,
                std::time::Instant::now(),
            );
        }
        text
    }

    fn paste(&self, text: Option<String>) -> Result<(), AutomationError> {
        if let Some(text) = text {
            self.clipboard.write_text(&text)?;
            lock(&self.clipboard_log).record(
                text,
                ClipboardOrigin::Device,
                std::time::Instant::now(),
            );
        }
        self.shortcut('v')
    }

    /// Platform copy/paste style shortcut: command modifier + `letter`.
    fn shortcut(&self, letter: char) -> Result<(), AutomationError> {
        let mut held = HeldKeys::new(self.automation.as_ref());
        held.press(self.profile.command_modifier)?;
        self.automation.tap_key(LogicalKey::Char(letter))
    }
}

/// Wheel notches for a zoom delta: `min(ceil(|delta| / 10), 5)`, signed.
pub fn zoom_notches(delta: f64) -> i32 {
    if delta == 0.0 || !delta.is_finite() {
        return 0;
    }
    let n = (delta.abs() / ZOOM_UNITS_PER_NOTCH).ceil().min(MAX_ZOOM_NOTCHES as f64) as i32;
    if delta > 0.0 {
        n
    } else {
        -n
    }
}

// ── Move coalescing ───────────────────────────────────────────────────────────

#[derive(Default)]
struct CoalesceState {
    last_flush: Option<Instant>,
    pending: Option<(f64, f64)>,
    timer: Option<JoinHandle<()>>,
}

/// Per-connection trailing-edge coalescing of pointer moves.
///
/// The first move of a burst is applied immediately.  Moves that arrive
/// within `inputThrottleMs` of it overwrite a single pending delta, and one
/// timer applies the most recent pending delta when the interval ends.
pub struct MoveCoalescer {
    executor: Arc<InputExecutor>,
    state: Arc<Mutex<CoalesceState>>,
}

impl MoveCoalescer {
    pub fn new(executor: Arc<InputExecutor>) -> Self {
        Self {
            executor,
            state: Arc::new(Mutex::new(CoalesceState::default())),
        }
    }

    pub async fn submit(&self, dx: f64, dy: f64) {
        let interval = self.executor.move_interval();
        let now = Instant::now();

        let apply_now = {
            let mut st = lock(&self.state);
            let quiet = st.timer.is_none()
                && st
                    .last_flush
                    .map_or(true, |at| now.saturating_duration_since(at) >= interval);
            if quiet {
                st.last_flush = Some(now);
                true
            } else {
                st.pending = Some((dx, dy));
                if st.timer.is_none() {
                    let due = st.last_flush.map_or(now, |at| at + interval);
                    st.timer = Some(self.spawn_flush(due));
                }
                false
            }
        };

        if apply_now {
            self.executor.apply_move(dx, dy).await;
        }
    }

    fn spawn_flush(&self, due: Instant) -> JoinHandle<()> {
        let state = Arc::clone(&self.state);
        let executor = Arc::clone(&self.executor);
        tokio::spawn(async move {
            tokio::time::sleep_until(due).await;
            let pending = {
                let mut st = lock(&state);
                st.timer = None;
                st.last_flush = Some(Instant::now());
                st.pending.take()
            };
            if let Some((dx, dy)) = pending {
                executor.apply_move(dx, dy).await;
            }
        })
    }

    /// Cancels the pending flush, if any.  Called when the connection closes.
    pub fn cancel(&self) {
        let mut st = lock(&self.state);
        st.pending = None;
        if let Some(timer) = st.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for MoveCoalescer {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::cursor_fallback::CursorController;
    use crate::infrastructure::automation::mock::{Action, RecordingAutomation};
    use crate::infrastructure::clipboard::MemoryClipboard;
    use rein_core::domain::clipboard::{CLIPBOARD_TTL, ECHO_WINDOW};
    use rein_core::HostOs;

    struct Rig {
        automation: Arc<RecordingAutomation>,
        clipboard: Arc<MemoryClipboard>,
        tuning: Arc<RwLock<RuntimeConfig>>,
        log: Arc<Mutex<ClipboardTracker>>,
        executor: Arc<InputExecutor>,
    }

    fn rig(os: HostOs) -> Rig {
        let automation = Arc::new(RecordingAutomation::new());
        let clipboard = Arc::new(MemoryClipboard::default());
        let tuning = Arc::new(RwLock::new(RuntimeConfig::default()));
        let log = Arc::new(Mutex::new(ClipboardTracker::new(CLIPBOARD_TTL, ECHO_WINDOW)));
        let cursor = Arc::new(CursorController::new(automation.clone(), None));
        let executor = Arc::new(InputExecutor::new(
            automation.clone(),
            clipboard.clone(),
            cursor,
            PlatformProfile::for_os(os, false),
            log.clone(),
            tuning.clone(),
        ));
        Rig {
            automation,
            clipboard,
            tuning,
            log,
            executor,
        }
    }

    #[tokio::test]
    async fn test_move_is_relative_to_current_position() {
        // Arrange
        let r = rig(HostOs::Linux);
        r.automation.set_position(100, 100);

        // Act
        r.executor.execute(InputMessage::Move { dx: 10.4, dy: -20.6 }).await;

        // Assert
        assert_eq!(r.automation.actions(), vec![Action::MoveTo(110, 79)]);
    }

    #[tokio::test]
    async fn test_move_applies_sensitivity() {
        let r = rig(HostOs::Linux);
        r.tuning.write().unwrap().mouse_sensitivity = 2.0;
        r.executor.execute(InputMessage::Move { dx: 5.0, dy: 0.0 }).await;
        assert_eq!(r.automation.actions(), vec![Action::MoveTo(10, 0)]);
    }

    #[tokio::test]
    async fn test_click_press_and_release_are_independent() {
        let r = rig(HostOs::Linux);
        r.executor
            .execute(InputMessage::Click { button: MouseButton::Right, press: true })
            .await;
        r.executor
            .execute(InputMessage::Click { button: MouseButton::Right, press: false })
            .await;
        assert_eq!(
            r.automation.actions(),
            vec![
                Action::ButtonDown(MouseButton::Right),
                Action::ButtonUp(MouseButton::Right)
            ]
        );
    }

    #[tokio::test]
    async fn test_scroll_zero_is_noop_and_invert_flips() {
        let r = rig(HostOs::Linux);
        r.executor.execute(InputMessage::Scroll { dx: 0.0, dy: 0.2 }).await;
        assert!(r.automation.actions().is_empty());

        r.tuning.write().unwrap().invert_scroll = true;
        r.executor.execute(InputMessage::Scroll { dx: 0.0, dy: 3.0 }).await;
        assert_eq!(r.automation.actions(), vec![Action::Scroll(0, -3)]);
    }

    #[test]
    fn test_zoom_notches() {
        assert_eq!(zoom_notches(0.0), 0);
        assert_eq!(zoom_notches(1.0), 1);
        assert_eq!(zoom_notches(10.0), 1);
        assert_eq!(zoom_notches(11.0), 2);
        assert_eq!(zoom_notches(-35.0), -4);
        assert_eq!(zoom_notches(100.0), 5);
    }

    #[tokio::test]
    async fn test_zoom_in_holds_modifier_and_scrolls_up() {
        // Arrange
        let r = rig(HostOs::MacOs);

        // Act
        r.executor.execute(InputMessage::Zoom { delta: 25.0 }).await;

        // Assert
        assert_eq!(
            r.automation.actions(),
            vec![
                Action::KeyDown(LogicalKey::Meta),
                Action::Scroll(0, -3),
                Action::KeyUp(LogicalKey::Meta),
            ]
        );
    }

    #[tokio::test]
    async fn test_zoom_releases_modifier_when_scroll_fails() {
        let r = rig(HostOs::Linux);
        r.automation.fail_scroll(true);
        r.executor.execute(InputMessage::Zoom { delta: -5.0 }).await;
        assert_eq!(
            r.automation.actions(),
            vec![Action::KeyDown(LogicalKey::Control), Action::KeyUp(LogicalKey::Control)]
        );
    }

    #[tokio::test]
    async fn test_key_named_literal_and_unknown() {
        let r = rig(HostOs::Linux);
        r.executor.execute(InputMessage::Key { key: "ENTER".into() }).await;
        r.executor.execute(InputMessage::Key { key: "é".into() }).await;
        r.executor.execute(InputMessage::Key { key: "hyperdrive".into() }).await;
        assert_eq!(
            r.automation.actions(),
            vec![
                Action::KeyDown(LogicalKey::Enter),
                Action::KeyUp(LogicalKey::Enter),
                Action::Type("é".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_combo_releases_in_reverse_order() {
        let r = rig(HostOs::Linux);
        r.executor
            .execute(InputMessage::Combo { keys: vec!["ctrl".into(), "shift".into(), "t".into()] })
            .await;
        assert_eq!(
            r.automation.actions(),
            vec![
                Action::KeyDown(LogicalKey::Control),
                Action::KeyDown(LogicalKey::Shift),
                Action::KeyDown(LogicalKey::Char('t')),
                Action::KeyUp(LogicalKey::Char('t')),
                Action::KeyUp(LogicalKey::Shift),
                Action::KeyUp(LogicalKey::Control),
            ]
        );
    }

    #[tokio::test]
    async fn test_combo_failure_releases_only_pressed_keys() {
        // Arrange: pressing `x` fails.
        let r = rig(HostOs::Linux);
        r.automation.fail_key(LogicalKey::Char('x'));

        // Act
        r.executor
            .execute(InputMessage::Combo { keys: vec!["ctrl".into(), "shift".into(), "x".into()] })
            .await;

        // Assert: shift then ctrl are released, x never was pressed.
        assert_eq!(
            r.automation.actions(),
            vec![
                Action::KeyDown(LogicalKey::Control),
                Action::KeyDown(LogicalKey::Shift),
                Action::KeyUp(LogicalKey::Shift),
                Action::KeyUp(LogicalKey::Control),
            ]
        );
    }

    #[tokio::test]
    async fn test_combo_translates_ctrl_on_macos_and_types_symbols() {
        let r = rig(HostOs::MacOs);
        r.executor
            .execute(InputMessage::Combo { keys: vec!["ctrl".into(), "+".into()] })
            .await;
        assert_eq!(
            r.automation.actions(),
            vec![
                Action::KeyDown(LogicalKey::Meta),
                Action::Type("+".into()),
                Action::KeyUp(LogicalKey::Meta),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_copy_returns_new_clipboard_text() {
        // Arrange: the "application" puts text on the clipboard when it sees ctrl+c.
        let r = rig(HostOs::Linux);
        r.clipboard.set("old");
        let clip = r.clipboard.clone();
        r.automation.on_key_down(LogicalKey::Char('c'), move || clip.set("fresh"));

        // Act
        let text = r.executor.execute(InputMessage::ClipboardCopy).await;

        // Assert
        assert_eq!(text.as_deref(), Some("fresh"));
        let mut log = r.log.lock().unwrap();
        let rec = log.current(std::time::Instant::now()).cloned().unwrap();
        assert_eq!(rec.origin, ClipboardOrigin::Desktop);
    }

    #[tokio::test(start_paused = true)]
    async fn test_copy_falls_back_to_previous_text() {
        let r = rig(HostOs::Linux);
        r.clipboard.set("unchanged");
        let text = r.executor.execute(InputMessage::ClipboardCopy).await;
        assert_eq!(text.as_deref(), Some("unchanged"));
    }

    #[tokio::test]
    async fn test_paste_writes_then_sends_shortcut() {
        let r = rig(HostOs::MacOs);
        r.executor
            .execute(InputMessage::ClipboardPaste { text: Some("hello".into()) })
            .await;

        assert_eq!(r.clipboard.get(), "hello");
        assert_eq!(
            r.automation.actions(),
            vec![
                Action::KeyDown(LogicalKey::Meta),
                Action::KeyDown(LogicalKey::Char('v')),
                Action::KeyUp(LogicalKey::Char('v')),
                Action::KeyUp(LogicalKey::Meta),
            ]
        );
        let mut log = r.log.lock().unwrap();
        let rec = log.current(std::time::Instant::now()).cloned().unwrap();
        assert_eq!(rec.origin, ClipboardOrigin::Device);
    }

    // ── Coalescing ────────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_to_leading_and_trailing_move() {
        // Arrange
        let r = rig(HostOs::Linux);
        r.tuning.write().unwrap().input_throttle_ms = 20;
        let coalescer = MoveCoalescer::new(r.executor.clone());

        // Act: five moves 2 ms apart, then let the timer fire.
        for _ in 0..5 {
            coalescer.submit(10.0, 0.0).await;
            tokio::time::advance(Duration::from_millis(2)).await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Assert: the leading move plus one flush of the latest delta.
        assert_eq!(
            r.automation.actions(),
            vec![Action::MoveTo(10, 0), Action::MoveTo(20, 0)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending_move() {
        let r = rig(HostOs::Linux);
        r.tuning.write().unwrap().input_throttle_ms = 20;
        let coalescer = MoveCoalescer::new(r.executor.clone());

        coalescer.submit(1.0, 1.0).await;
        coalescer.submit(5.0, 5.0).await;
        coalescer.cancel();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(r.automation.actions(), vec![Action::MoveTo(1, 1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spaced_moves_are_not_delayed() {
        let r = rig(HostOs::Linux);
        let coalescer = MoveCoalescer::new(r.executor.clone());

        coalescer.submit(1.0, 0.0).await;
        tokio::time::advance(Duration::from_millis(30)).await;
        coalescer.submit(1.0, 0.0).await;

        assert_eq!(
            r.automation.actions(),
            vec![Action::MoveTo(1, 0), Action::MoveTo(2, 0)]
        );
    }
}
