//! Linux X11 automation.
//!
//! Pointer queries and warps use plain Xlib (`XQueryPointer`,
//! `XWarpPointer`), which every X server supports.  Buttons, keys, wheel and
//! text go through the XTest extension (`libXtst`).
//!
//! # What is XTest? (for beginners)
//!
//! XTest is an X11 protocol extension that lets a process synthesize keyboard
//! and mouse events as if the user had physically interacted with the
//! hardware.  The receiving application cannot tell them apart from real
//! input.
//!
//! # Key code translation
//!
//! `XTestFakeKeyEvent` takes a hardware *keycode*, not a KeySym:
//!
//! ```text
//! LogicalKey → X11 KeySym (rein_core::keymap::x11) → XKeysymToKeycode → keycode
//! ```
//!
//! # Wheel as buttons
//!
//! X11 has no scroll API.  One wheel notch is a press+release of a button:
//!
//! | Button | Direction                 |
//! |--------|---------------------------|
//! | 4      | up (content moves down)   |
//! | 5      | down (content moves up)   |
//! | 6      | left                      |
//! | 7      | right                     |
//!
//! # Wayland
//!
//! Under Wayland this backend only reaches XWayland windows; pointer warps
//! usually fail, which is what the ydotool fallback exists for.

use std::sync::Mutex;

use rein_core::{LogicalKey, MouseButton};
use x11::xlib;

use crate::application::execute_input::{Automation, AutomationError};
use crate::application::lock;
use crate::infrastructure::x11_display::XDisplay;

/// X11 implementation of [`Automation`].
pub struct X11Automation {
    display: Mutex<XDisplay>,
}

impl X11Automation {
    /// Connects to the X display.
    ///
    /// # Errors
    ///
    /// Returns `AutomationError::Platform` if the display cannot be opened.
    pub fn new() -> Result<Self, AutomationError> {
        let display = XDisplay::open().map_err(AutomationError::Platform)?;
        Ok(Self {
            display: Mutex::new(display),
        })
    }
}

impl Automation for X11Automation {
    fn pointer_position(&self) -> Result<(i32, i32), AutomationError> {
        let display = lock(&self.display);
        let (mut root_ret, mut child) = (0, 0);
        let (mut root_x, mut root_y, mut win_x, mut win_y) = (0, 0, 0, 0);
        let mut mask = 0;
        // SAFETY: every out-pointer refers to a live local.
        let on_screen = unsafe {
            xlib::XQueryPointer(
                display.raw(),
                display.root(),
                &mut root_ret,
                &mut child,
                &mut root_x,
                &mut root_y,
                &mut win_x,
                &mut win_y,
                &mut mask,
            )
        };
        if on_screen == xlib::False {
            return Err(AutomationError::Platform(
                "pointer is not on the default screen".into(),
            ));
        }
        Ok((root_x, root_y))
    }

    fn set_pointer_position(&self, x: i32, y: i32) -> Result<(), AutomationError> {
        let display = lock(&self.display);
        // SAFETY: `display` is a live connection; src window 0 means "anywhere".
        unsafe {
            xlib::XWarpPointer(display.raw(), 0, display.root(), 0, 0, 0, 0, x, y);
        }
        display.flush();
        Ok(())
    }

    fn press_button(&self, button: MouseButton) -> Result<(), AutomationError> {
        xtest::button(&lock(&self.display), button_number(button), true)
    }

    fn release_button(&self, button: MouseButton) -> Result<(), AutomationError> {
        xtest::button(&lock(&self.display), button_number(button), false)
    }

    fn scroll(&self, dx: i32, dy: i32) -> Result<(), AutomationError> {
        let display = lock(&self.display);
        if dy != 0 {
            let button = if dy > 0 { 5 } else { 4 };
            for _ in 0..dy.unsigned_abs() {
                xtest::button(&display, button, true)?;
                xtest::button(&display, button, false)?;
            }
        }
        if dx != 0 {
            let button = if dx > 0 { 7 } else { 6 };
            for _ in 0..dx.unsigned_abs() {
                xtest::button(&display, button, true)?;
                xtest::button(&display, button, false)?;
            }
        }
        Ok(())
    }

    fn type_text(&self, text: &str) -> Result<(), AutomationError> {
        let display = lock(&self.display);
        for c in text.chars() {
            xtest::type_char(&display, c)?;
        }
        Ok(())
    }

    fn press_key(&self, key: LogicalKey) -> Result<(), AutomationError> {
        let sym = rein_core::keymap::x11::keysym(key).ok_or(AutomationError::UnmappedKey(key))?;
        xtest::key(&lock(&self.display), sym, true)
    }

    fn release_key(&self, key: LogicalKey) -> Result<(), AutomationError> {
        let sym = rein_core::keymap::x11::keysym(key).ok_or(AutomationError::UnmappedKey(key))?;
        xtest::key(&lock(&self.display), sym, false)
    }
}

fn button_number(button: MouseButton) -> u32 {
    match button {
        MouseButton::Left => 1,
        MouseButton::Middle => 2,
        MouseButton::Right => 3,
    }
}

/// KeySym for a character: Latin-1 maps directly, the rest use the
/// `0x0100_0000 + code point` Unicode range.
fn char_keysym(c: char) -> u32 {
    match c {
        '\n' => 0xFF0D,
        '\t' => 0xFF09,
        ' '..='~' | '\u{A0}'..='\u{FF}' => c as u32,
        _ => 0x0100_0000 + c as u32,
    }
}

mod xtest {
    use std::os::raw::c_ulong;

    use x11::{xlib, xtest as ffi};

    use super::char_keysym;
    use crate::application::execute_input::AutomationError;
    use crate::infrastructure::x11_display::XDisplay;

    /// `CurrentTime`: deliver immediately.
    const NO_DELAY: c_ulong = 0;

    const XK_SHIFT_L: u32 = 0xFFE1;

    fn bool_arg(pressed: bool) -> i32 {
        if pressed {
            xlib::True
        } else {
            xlib::False
        }
    }

    pub fn button(display: &XDisplay, number: u32, pressed: bool) -> Result<(), AutomationError> {
        // SAFETY: `display` is a live connection.
        let ok = unsafe {
            ffi::XTestFakeButtonEvent(display.raw(), number, bool_arg(pressed), NO_DELAY)
        };
        display.flush();
        if ok == 0 {
            return Err(AutomationError::Platform(format!(
                "XTestFakeButtonEvent failed for button {number}"
            )));
        }
        Ok(())
    }

    fn keycode(display: &XDisplay, sym: u32) -> Result<u8, AutomationError> {
        // SAFETY: `display` is a live connection.
        let code = unsafe { xlib::XKeysymToKeycode(display.raw(), c_ulong::from(sym)) };
        if code == 0 {
            return Err(AutomationError::Platform(format!(
                "no keycode for keysym {sym:#x} in the current layout"
            )));
        }
        Ok(code)
    }

    fn raw_key(display: &XDisplay, code: u8, pressed: bool) -> Result<(), AutomationError> {
        // SAFETY: `display` is a live connection.
        let ok = unsafe {
            ffi::XTestFakeKeyEvent(display.raw(), u32::from(code), bool_arg(pressed), NO_DELAY)
        };
        display.flush();
        if ok == 0 {
            return Err(AutomationError::Platform(format!(
                "XTestFakeKeyEvent failed for keycode {code}"
            )));
        }
        Ok(())
    }

    pub fn key(display: &XDisplay, sym: u32, pressed: bool) -> Result<(), AutomationError> {
        let code = keycode(display, sym)?;
        raw_key(display, code, pressed)
    }

    pub fn type_char(display: &XDisplay, c: char) -> Result<(), AutomationError> {
        let sym = char_keysym(c);
        let code = keycode(display, sym)?;
        // SAFETY: `display` is a live connection; index 0 is the unshifted level.
        let base = unsafe { xlib::XKeycodeToKeysym(display.raw(), code, 0) };
        let shifted = base != c_ulong::from(sym);

        if shifted {
            key(display, XK_SHIFT_L, true)?;
        }
        let result = raw_key(display, code, true).and_then(|()| raw_key(display, code, false));
        if shifted {
            key(display, XK_SHIFT_L, false)?;
        }
        result
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
