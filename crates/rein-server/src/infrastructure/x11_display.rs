//! Shared Xlib display connection for the X11 adapters.
//!
//! Xlib connections are not thread-safe, so each adapter owns one
//! [`XDisplay`] behind a `Mutex` and only touches it while holding the lock.

use std::ptr;

use x11::xlib;

/// An open Xlib connection, closed on drop.
pub struct XDisplay {
    raw: *mut xlib::Display,
}

// SAFETY: the pointer is only dereferenced by Xlib calls made while the
// owning adapter holds its `Mutex`, so it is never used from two threads at
// once.
unsafe impl Send for XDisplay {}

impl XDisplay {
    /// Opens the display named by `DISPLAY`.
    pub fn open() -> Result<Self, String> {
        // SAFETY: a null name makes Xlib read `DISPLAY`; the result is checked.
        let raw = unsafe { xlib::XOpenDisplay(ptr::null()) };
        if raw.is_null() {
            let name = std::env::var("DISPLAY").unwrap_or_else(|_| "<unset>".to_string());
            return Err(format!("XOpenDisplay failed; DISPLAY={name}"));
        }
        Ok(Self { raw })
    }

    pub fn raw(&self) -> *mut xlib::Display {
        self.raw
    }

    /// The root window of the default screen.
    pub fn root(&self) -> xlib::Window {
        // SAFETY: `raw` is a live connection.
        unsafe { xlib::XDefaultRootWindow(self.raw) }
    }

    /// Size of the default screen in pixels.
    pub fn screen_size(&self) -> (u32, u32) {
        // SAFETY: `raw` is a live connection.
        unsafe {
            let screen = xlib::XDefaultScreen(self.raw);
            let w = xlib::XDisplayWidth(self.raw, screen);
            let h = xlib::XDisplayHeight(self.raw, screen);
            (w.max(0) as u32, h.max(0) as u32)
        }
    }

    pub fn flush(&self) {
        // SAFETY: `raw` is a live connection.
        unsafe {
            xlib::XFlush(self.raw);
        }
    }
}

impl Drop for XDisplay {
    fn drop(&mut self) {
        // SAFETY: `raw` was returned by XOpenDisplay and is not used after this.
        unsafe {
            xlib::XCloseDisplay(self.raw);
        }
    }
}
