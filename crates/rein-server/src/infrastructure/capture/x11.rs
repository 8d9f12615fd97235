//! X11 screen capture with `XGetImage`.
//!
//! Grabs the whole root window as a ZPixmap.  On the 24/32-bit TrueColor
//! visuals every current X server uses, that is little-endian BGRX, so the
//! frame is tagged [`PixelFormat::Bgra`] and the padding byte is ignored by
//! the encoder.

use std::os::raw::c_ulong;
use std::slice;
use std::sync::Mutex;

use x11::xlib;

use crate::application::lock;
use crate::application::mirror::{CaptureError, PixelFormat, RawFrame, ScreenCapture};
use crate::infrastructure::x11_display::XDisplay;

/// `AllPlanes` from Xlib.
const ALL_PLANES: c_ulong = !0;

/// X11 implementation of [`ScreenCapture`].
pub struct X11Capture {
    display: Mutex<XDisplay>,
}

impl X11Capture {
    /// Opens a dedicated display connection for capture.
    ///
    /// # Errors
    ///
    /// Returns `CaptureError::Platform` if the display cannot be opened.
    pub fn new() -> Result<Self, CaptureError> {
        let display = XDisplay::open().map_err(CaptureError::Platform)?;
        Ok(Self {
            display: Mutex::new(display),
        })
    }
}

impl ScreenCapture for X11Capture {
    fn grab(&self) -> Result<RawFrame, CaptureError> {
        let display = lock(&self.display);
        let (width, height) = display.screen_size();

        // SAFETY: `display` is live and the rectangle is the full root window.
        let image = unsafe {
            xlib::XGetImage(
                display.raw(),
                display.root(),
                0,
                0,
                width,
                height,
                ALL_PLANES,
                xlib::ZPixmap,
            )
        };
        if image.is_null() {
            return Err(CaptureError::Platform("XGetImage returned null".into()));
        }

        // SAFETY: `image` is non-null and owned by us until XDestroyImage.
        let frame = unsafe {
            let img = &*image;
            if img.bits_per_pixel != 32 {
                let bpp = img.bits_per_pixel;
                xlib::XDestroyImage(image);
                return Err(CaptureError::Unsupported(format!(
                    "{bpp}-bit X visual"
                )));
            }
            let stride = img.bytes_per_line as usize;
            let len = stride * img.height as usize;
            let data = slice::from_raw_parts(img.data as *const u8, len).to_vec();
            let frame = RawFrame {
                width: img.width as u32,
                height: img.height as u32,
                stride,
                format: PixelFormat::Bgra,
                data,
            };
            xlib::XDestroyImage(image);
            frame
        };
        Ok(frame)
    }

    fn logical_size(&self) -> Result<(u32, u32), CaptureError> {
        Ok(lock(&self.display).screen_size())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Smoke test: with a display, a grab matches the reported screen size.
    #[test]
    fn test_x11_capture_smoke() {
        let Ok(capture) = X11Capture::new() else {
            return;
        };
        let (w, h) = capture.logical_size().unwrap();
        if let Ok(frame) = capture.grab() {
            assert_eq!((frame.width, frame.height), (w, h));
            assert!(frame.data.len() >= frame.stride * h as usize);
        }
    }
}
