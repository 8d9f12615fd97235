//! Windows screen capture with GDI.
//!
//! Copies the primary screen into a memory bitmap with `BitBlt`, then reads
//! it back as a top-down 32-bit DIB with `GetDIBits`.

#![cfg(target_os = "windows")]

use std::mem;

use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Gdi::{
    BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC, GetDIBits,
    ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS, SRCCOPY,
};
use windows::Win32::UI::WindowsAndMessaging::{GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN};

use crate::application::mirror::{CaptureError, PixelFormat, RawFrame, ScreenCapture};

/// Windows implementation of [`ScreenCapture`] for the primary screen.
#[derive(Default)]
pub struct GdiCapture;

impl GdiCapture {
    pub fn new() -> Self {
        Self
    }
}

fn screen_size() -> (i32, i32) {
    // SAFETY: GetSystemMetrics has no preconditions.
    unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) }
}

impl ScreenCapture for GdiCapture {
    fn grab(&self) -> Result<RawFrame, CaptureError> {
        let (w, h) = screen_size();
        if w <= 0 || h <= 0 {
            return Err(CaptureError::Platform("no primary screen".into()));
        }
        let stride = w as usize * 4;
        let mut data = vec![0u8; stride * h as usize];

        // SAFETY: every handle created here is released below, in reverse
        // order, whatever the outcome; `data` is sized for h rows of w BGRA
        // pixels, matching the BITMAPINFO passed to GetDIBits.
        let copied = unsafe {
            let screen_dc = GetDC(HWND::default());
            let mem_dc = CreateCompatibleDC(screen_dc);
            let bitmap = CreateCompatibleBitmap(screen_dc, w, h);
            let previous = SelectObject(mem_dc, bitmap);

            let blit = BitBlt(mem_dc, 0, 0, w, h, screen_dc, 0, 0, SRCCOPY);

            let mut info = BITMAPINFO {
                bmiHeader: BITMAPINFOHEADER {
                    biSize: mem::size_of::<BITMAPINFOHEADER>() as u32,
                    biWidth: w,
                    biHeight: -h,
                    biPlanes: 1,
                    biBitCount: 32,
                    biCompression: BI_RGB.0,
                    ..Default::default()
                },
                ..Default::default()
            };
            let lines = GetDIBits(
                mem_dc,
                bitmap,
                0,
                h as u32,
                Some(data.as_mut_ptr().cast()),
                &mut info,
                DIB_RGB_COLORS,
            );

            SelectObject(mem_dc, previous);
            let _ = DeleteObject(bitmap);
            let _ = DeleteDC(mem_dc);
            ReleaseDC(HWND::default(), screen_dc);

            blit.is_ok() && lines == h
        };
        if !copied {
            return Err(CaptureError::Platform("BitBlt/GetDIBits failed".into()));
        }

        Ok(RawFrame {
            width: w as u32,
            height: h as u32,
            stride,
            format: PixelFormat::Bgra,
            data,
        })
    }

    fn logical_size(&self) -> Result<(u32, u32), CaptureError> {
        let (w, h) = screen_size();
        Ok((w.max(0) as u32, h.max(0) as u32))
    }
}
