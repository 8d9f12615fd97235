//! Screen capture backends.
//!
//! | OS      | Backend                          | Pixel format |
//! |---------|----------------------------------|--------------|
//! | Linux   | Xlib `XGetImage` on the root     | BGRA         |
//! | Windows | GDI `BitBlt` + `GetDIBits`       | BGRA         |
//! | macOS   | `CGDisplay::image`               | BGRA         |
//!
//! Wayland sessions never reach a backend; the mirror pipeline refuses them
//! first.  [`UnavailableCapture`] stands in when no backend can be built.

use std::sync::Arc;

use tracing::warn;

use crate::application::mirror::{CaptureError, RawFrame, ScreenCapture};

#[cfg(target_os = "linux")]
pub mod x11;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(target_os = "macos")]
pub mod macos;

/// A capture backend that always fails with the same reason.
#[derive(Debug, Clone)]
pub struct UnavailableCapture {
    reason: String,
}

impl UnavailableCapture {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl ScreenCapture for UnavailableCapture {
    fn grab(&self) -> Result<RawFrame, CaptureError> {
        Err(CaptureError::Unsupported(self.reason.clone()))
    }

    fn logical_size(&self) -> Result<(u32, u32), CaptureError> {
        Err(CaptureError::Unsupported(self.reason.clone()))
    }
}

/// Builds the capture backend for the current OS, or an
/// [`UnavailableCapture`] explaining why there is none.
pub fn platform_capture() -> Arc<dyn ScreenCapture> {
    #[cfg(target_os = "linux")]
    let built = x11::X11Capture::new().map(|c| Arc::new(c) as Arc<dyn ScreenCapture>);
    #[cfg(target_os = "windows")]
    let built: Result<Arc<dyn ScreenCapture>, CaptureError> =
        Ok(Arc::new(windows::GdiCapture::new()));
    #[cfg(target_os = "macos")]
    let built: Result<Arc<dyn ScreenCapture>, CaptureError> =
        Ok(Arc::new(macos::DisplayCapture::new()));
    #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
    let built: Result<Arc<dyn ScreenCapture>, CaptureError> =
        Err(CaptureError::Unsupported(std::env::consts::OS.to_string()));

    built.unwrap_or_else(|e| {
        warn!("screen capture unavailable: {e}");
        Arc::new(UnavailableCapture::new(e.to_string()))
    })
}
