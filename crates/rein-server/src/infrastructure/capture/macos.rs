//! macOS screen capture with `CGDisplay::image`.
//!
//! The image is in device pixels (2× on Retina), while the pointer uses
//! points, so [`ScreenCapture::logical_size`] reports the display bounds in
//! points and the encoder derives the scale from the two.

#![cfg(target_os = "macos")]

use core_graphics::display::CGDisplay;

use crate::application::mirror::{CaptureError, PixelFormat, RawFrame, ScreenCapture};

/// macOS implementation of [`ScreenCapture`] for the main display.
#[derive(Default)]
pub struct DisplayCapture;

impl DisplayCapture {
    pub fn new() -> Self {
        Self
    }
}

impl ScreenCapture for DisplayCapture {
    fn grab(&self) -> Result<RawFrame, CaptureError> {
        let image = CGDisplay::main().image().ok_or_else(|| {
            CaptureError::Platform(
                "CGDisplayCreateImage returned nothing (Screen Recording permission?)".into(),
            )
        })?;
        if image.bits_per_pixel() != 32 {
            return Err(CaptureError::Unsupported(format!(
                "{}-bit display image",
                image.bits_per_pixel()
            )));
        }
        Ok(RawFrame {
            width: image.width() as u32,
            height: image.height() as u32,
            stride: image.bytes_per_row(),
            format: PixelFormat::Bgra,
            data: image.data().bytes().to_vec(),
        })
    }

    fn logical_size(&self) -> Result<(u32, u32), CaptureError> {
        let bounds = CGDisplay::main().bounds();
        Ok((bounds.size.width as u32, bounds.size.height as u32))
    }
}
