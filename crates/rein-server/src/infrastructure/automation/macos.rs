//! macOS CoreGraphics automation.
//!
//! Every action is a synthesized `CGEvent` posted at the HID tap, the same
//! level physical devices feed.
//!
//! # What is CoreGraphics event injection? (for beginners)
//!
//! The sequence for one key press is:
//!
//! 1. `CGEventSource::new(HIDSystemState)`: an event source that mirrors the
//!    real modifier state, so a held Command key applies to later events.
//! 2. `CGEvent::new_keyboard_event(source, keycode, down)`: build the event.
//! 3. `event.post(CGEventTapLocation::HID)`: inject it.
//!
//! # Coordinates
//!
//! CGEvent locations are global display coordinates with the origin at the
//! top-left of the main display, the same convention devices use.
//!
//! # Accessibility permission
//!
//! Posting at the HID tap requires the **Accessibility** permission
//! (System Settings → Privacy & Security → Accessibility).  Without it the
//! events are silently dropped.

#![cfg(target_os = "macos")]

use core_graphics::display::CGDisplay;
use core_graphics::event::{
    CGEvent, CGEventTapLocation, CGEventType, CGMouseButton, ScrollEventUnit,
};
use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};
use core_graphics::geometry::CGPoint;
use rein_core::{LogicalKey, MouseButton};

use crate::application::execute_input::{Automation, AutomationError};

/// macOS implementation of [`Automation`].
#[derive(Default)]
pub struct MacosAutomation;

impl MacosAutomation {
    pub fn new() -> Self {
        Self
    }
}

fn source() -> Result<CGEventSource, AutomationError> {
    CGEventSource::new(CGEventSourceStateID::HIDSystemState)
        .map_err(|()| AutomationError::Platform("CGEventSourceCreate failed".into()))
}

fn created(what: &str) -> impl FnOnce(()) -> AutomationError + '_ {
    move |()| AutomationError::Platform(format!("failed to create {what} event"))
}

impl MacosAutomation {
    fn mouse_event(&self, kind: CGEventType, button: CGMouseButton) -> Result<(), AutomationError> {
        let (x, y) = self.pointer_position()?;
        let point = CGPoint::new(f64::from(x), f64::from(y));
        let event =
            CGEvent::new_mouse_event(source()?, kind, point, button).map_err(created("mouse"))?;
        event.post(CGEventTapLocation::HID);
        Ok(())
    }

    fn key_event(&self, key: LogicalKey, down: bool) -> Result<(), AutomationError> {
        let code = rein_core::keymap::macos::keycode(key).ok_or(AutomationError::UnmappedKey(key))?;
        let event =
            CGEvent::new_keyboard_event(source()?, code, down).map_err(created("keyboard"))?;
        event.post(CGEventTapLocation::HID);
        Ok(())
    }
}

fn button_events(button: MouseButton) -> (CGEventType, CGEventType, CGMouseButton) {
    match button {
        MouseButton::Left => (
            CGEventType::LeftMouseDown,
            CGEventType::LeftMouseUp,
            CGMouseButton::Left,
        ),
        MouseButton::Right => (
            CGEventType::RightMouseDown,
            CGEventType::RightMouseUp,
            CGMouseButton::Right,
        ),
        MouseButton::Middle => (
            CGEventType::OtherMouseDown,
            CGEventType::OtherMouseUp,
            CGMouseButton::Center,
        ),
    }
}

impl Automation for MacosAutomation {
    fn pointer_position(&self) -> Result<(i32, i32), AutomationError> {
        let event = CGEvent::new(source()?).map_err(created("null"))?;
        let point = event.location();
        Ok((point.x.round() as i32, point.y.round() as i32))
    }

    fn set_pointer_position(&self, x: i32, y: i32) -> Result<(), AutomationError> {
        let point = CGPoint::new(f64::from(x), f64::from(y));
        CGDisplay::warp_mouse_cursor_position(point)
            .map_err(|e| AutomationError::Platform(format!("CGWarpMouseCursorPosition: {e}")))?;
        // A warp does not generate a move event; post one so hover state updates.
        let event = CGEvent::new_mouse_event(
            source()?,
            CGEventType::MouseMoved,
            point,
            CGMouseButton::Left,
        )
        .map_err(created("mouse"))?;
        event.post(CGEventTapLocation::HID);
        Ok(())
    }

    fn press_button(&self, button: MouseButton) -> Result<(), AutomationError> {
        let (down, _, cg) = button_events(button);
        self.mouse_event(down, cg)
    }

    fn release_button(&self, button: MouseButton) -> Result<(), AutomationError> {
        let (_, up, cg) = button_events(button);
        self.mouse_event(up, cg)
    }

    fn scroll(&self, dx: i32, dy: i32) -> Result<(), AutomationError> {
        // Positive wheel values move the content up / left.
        let event = CGEvent::new_scroll_event(source()?, ScrollEventUnit::LINE, 2, -dy, -dx, 0)
            .map_err(created("scroll"))?;
        event.post(CGEventTapLocation::HID);
        Ok(())
    }

    fn type_text(&self, text: &str) -> Result<(), AutomationError> {
        for c in text.chars() {
            let mut buf = [0u8; 4];
            let s = c.encode_utf8(&mut buf);
            for down in [true, false] {
                let event =
                    CGEvent::new_keyboard_event(source()?, 0, down).map_err(created("keyboard"))?;
                event.set_string(s);
                event.post(CGEventTapLocation::HID);
            }
        }
        Ok(())
    }

    fn press_key(&self, key: LogicalKey) -> Result<(), AutomationError> {
        self.key_event(key, true)
    }

    fn release_key(&self, key: LogicalKey) -> Result<(), AutomationError> {
        self.key_event(key, false)
    }
}
