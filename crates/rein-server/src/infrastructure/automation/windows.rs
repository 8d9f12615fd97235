//! Windows automation via `SendInput`.
//!
//! Keys are injected as Virtual-Key codes from
//! `rein_core::keymap::windows_vk`; text is injected one UTF-16 unit at a
//! time with `KEYEVENTF_UNICODE`, so it does not depend on the active
//! keyboard layout.  Pointer reads and warps use `GetCursorPos` /
//! `SetCursorPos`.
//!
//! One wheel notch is `WHEEL_DELTA` (120) units; positive vertical data
//! scrolls the content up, so the sign is flipped from [`Automation::scroll`].

#![cfg(target_os = "windows")]

use std::mem;

use rein_core::{LogicalKey, MouseButton};
use windows::Win32::Foundation::POINT;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT, KEYBD_EVENT_FLAGS,
    KEYEVENTF_EXTENDEDKEY, KEYEVENTF_KEYUP, KEYEVENTF_UNICODE, MOUSEEVENTF_HWHEEL,
    MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MIDDLEDOWN, MOUSEEVENTF_MIDDLEUP,
    MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP, MOUSEEVENTF_WHEEL, MOUSEINPUT, MOUSE_EVENT_FLAGS,
    VIRTUAL_KEY,
};
use windows::Win32::UI::WindowsAndMessaging::{GetCursorPos, SetCursorPos};

use crate::application::execute_input::{Automation, AutomationError};

const WHEEL_DELTA: i32 = 120;

/// Windows implementation of [`Automation`].
#[derive(Default)]
pub struct WindowsAutomation;

impl WindowsAutomation {
    pub fn new() -> Self {
        Self
    }
}

impl Automation for WindowsAutomation {
    fn pointer_position(&self) -> Result<(i32, i32), AutomationError> {
        let mut point = POINT::default();
        // SAFETY: `point` is a valid out-pointer.
        unsafe { GetCursorPos(&mut point) }
            .map_err(|e| AutomationError::Platform(format!("GetCursorPos: {e}")))?;
        Ok((point.x, point.y))
    }

    fn set_pointer_position(&self, x: i32, y: i32) -> Result<(), AutomationError> {
        // SAFETY: plain value arguments.
        unsafe { SetCursorPos(x, y) }
            .map_err(|e| AutomationError::Platform(format!("SetCursorPos: {e}")))
    }

    fn press_button(&self, button: MouseButton) -> Result<(), AutomationError> {
        let flags = match button {
            MouseButton::Left => MOUSEEVENTF_LEFTDOWN,
            MouseButton::Right => MOUSEEVENTF_RIGHTDOWN,
            MouseButton::Middle => MOUSEEVENTF_MIDDLEDOWN,
        };
        send(&[mouse_input(flags, 0)])
    }

    fn release_button(&self, button: MouseButton) -> Result<(), AutomationError> {
        let flags = match button {
            MouseButton::Left => MOUSEEVENTF_LEFTUP,
            MouseButton::Right => MOUSEEVENTF_RIGHTUP,
            MouseButton::Middle => MOUSEEVENTF_MIDDLEUP,
        };
        send(&[mouse_input(flags, 0)])
    }

    fn scroll(&self, dx: i32, dy: i32) -> Result<(), AutomationError> {
        if dy != 0 {
            send(&[mouse_input(MOUSEEVENTF_WHEEL, -dy * WHEEL_DELTA)])?;
        }
        if dx != 0 {
            send(&[mouse_input(MOUSEEVENTF_HWHEEL, dx * WHEEL_DELTA)])?;
        }
        Ok(())
    }

    fn type_text(&self, text: &str) -> Result<(), AutomationError> {
        let inputs: Vec<INPUT> = text
            .encode_utf16()
            .flat_map(|unit| {
                [
                    key_input(VIRTUAL_KEY(0), unit, KEYEVENTF_UNICODE),
                    key_input(VIRTUAL_KEY(0), unit, KEYEVENTF_UNICODE | KEYEVENTF_KEYUP),
                ]
            })
            .collect();
        if inputs.is_empty() {
            return Ok(());
        }
        send(&inputs)
    }

    fn press_key(&self, key: LogicalKey) -> Result<(), AutomationError> {
        send(&[vk_input(key, false)?])
    }

    fn release_key(&self, key: LogicalKey) -> Result<(), AutomationError> {
        send(&[vk_input(key, true)?])
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn mouse_input(flags: MOUSE_EVENT_FLAGS, data: i32) -> INPUT {
    INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx: 0,
                dy: 0,
                mouseData: data as u32,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn key_input(vk: VIRTUAL_KEY, scan: u16, flags: KEYBD_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: vk,
                wScan: scan,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn vk_input(key: LogicalKey, key_up: bool) -> Result<INPUT, AutomationError> {
    use rein_core::keymap::windows_vk;

    let vk = windows_vk::vk(key).ok_or(AutomationError::UnmappedKey(key))?;
    let mut flags = KEYBD_EVENT_FLAGS(0);
    if windows_vk::is_extended(key) {
        flags |= KEYEVENTF_EXTENDEDKEY;
    }
    if key_up {
        flags |= KEYEVENTF_KEYUP;
    }
    Ok(key_input(VIRTUAL_KEY(vk), 0, flags))
}

fn send(inputs: &[INPUT]) -> Result<(), AutomationError> {
    // SAFETY: every INPUT is fully initialised on the stack or heap.
    let sent = unsafe { SendInput(inputs, mem::size_of::<INPUT>() as i32) };
    if sent as usize != inputs.len() {
        return Err(AutomationError::Platform(format!(
            "SendInput injected {sent} of {} events (blocked by UIPI?)",
            inputs.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmapped_key_is_reported() {
        let err = vk_input(LogicalKey::Function(13), false).unwrap_err();
        assert_eq!(err, AutomationError::UnmappedKey(LogicalKey::Function(13)));
    }

    #[test]
    fn test_negative_wheel_data_survives_the_u32_field() {
        let input = mouse_input(MOUSEEVENTF_WHEEL, -WHEEL_DELTA);
        // SAFETY: constructed as a mouse input above.
        let data = unsafe { input.Anonymous.mi.mouseData };
        assert_eq!(data as i32, -120);
    }
}
