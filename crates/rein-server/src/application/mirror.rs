//! Pull-based screen mirroring.
//!
//! The device asks for one frame at a time with `request-frame`; the server
//! answers with one binary WebSocket message holding a JPEG.  The device asks
//! again once it has drawn the frame, so a slow link slows the frame rate
//! instead of building a queue.
//!
//! ```text
//!   ScreenCapture::grab ──► RawFrame (BGRA/RGBA/RGB, any stride)
//!        │  spawn_blocking, bounded by a timeout
//!        ▼
//!   encode_frame ──► to RGB ──► downscale to max width ──► JPEG
//!        │
//!        ▼
//!   MirrorFrame { width, height, jpeg, scale_x, scale_y }
//! ```
//!
//! Wayland sessions do not allow a regular client to read the screen, so the
//! pipeline refuses up front and tells the device why.
//!
//! At most one capture runs per connection.  A [`CaptureSlot`] is claimed
//! before each grab and the claim travels into the blocking job, so a grab
//! that outlives its timeout keeps the slot busy until it really returns.
//!
//! The cursor overlay is separate: while mirroring is on, the connection
//! manager asks [`MirrorPipeline::cursor_fraction`] for the pointer position
//! as a fraction of the screen and sends it as `cursor-pos`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::RgbImage;
use rein_core::{PlatformProfile, ServerMessage};
use thiserror::Error;
use tokio::task;

/// Error type for screen capture backends.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("screen capture is not supported here: {0}")]
    Unsupported(String),
    #[error("capture failed: {0}")]
    Platform(String),
}

/// Error type for the mirror pipeline.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Screen capture is not available on Wayland sessions")]
    Wayland,
    #[error("capture timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error("frame encoding failed: {0}")]
    Encode(String),
}

impl MirrorError {
    /// The `mirror-error` message sent to the device.
    pub fn to_message(&self) -> ServerMessage {
        ServerMessage::MirrorError {
            message: self.to_string(),
            is_wayland: matches!(self, Self::Wayland).then_some(true),
        }
    }
}

/// Byte layout of a captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Bgra,
    Rgba,
    Rgb,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Bgra | Self::Rgba => 4,
            Self::Rgb => 3,
        }
    }
}

/// An unencoded frame straight from the capture backend.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    /// Bytes per row, which may include padding.
    pub stride: usize,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

/// Screen capture backend.
pub trait ScreenCapture: Send + Sync {
    /// Captures the primary display.  May block.
    fn grab(&self) -> Result<RawFrame, CaptureError>;

    /// Size of the primary display in the coordinate space the pointer uses.
    fn logical_size(&self) -> Result<(u32, u32), CaptureError>;
}

/// One encoded frame.
#[derive(Debug, Clone, PartialEq)]
pub struct MirrorFrame {
    pub width: u32,
    pub height: u32,
    pub jpeg: Vec<u8>,
    /// `width / logical_width`.
    pub scale_x: f64,
    /// `height / logical_height`.
    pub scale_y: f64,
}

/// Per-connection single-flight marker for captures.
#[derive(Debug, Clone, Default)]
pub struct CaptureSlot(Arc<AtomicBool>);

impl CaptureSlot {
    /// Claims the slot, or returns `None` while an earlier capture still
    /// holds it.
    pub fn try_claim(&self) -> Option<CaptureClaim> {
        if self.0.swap(true, Ordering::SeqCst) {
            return None;
        }
        Some(CaptureClaim(Arc::clone(&self.0)))
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Proof of a claimed [`CaptureSlot`]; dropping it frees the slot.
#[derive(Debug)]
pub struct CaptureClaim(Arc<AtomicBool>);

impl Drop for CaptureClaim {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Encoding settings for [`MirrorPipeline`].
#[derive(Debug, Clone, Copy)]
pub struct MirrorSettings {
    pub capture_timeout: Duration,
    pub max_width: u32,
    pub jpeg_quality: u8,
}

/// Captures and encodes frames on demand.
pub struct MirrorPipeline {
    capture: Arc<dyn ScreenCapture>,
    profile: PlatformProfile,
    settings: MirrorSettings,
}

impl MirrorPipeline {
    pub fn new(
        capture: Arc<dyn ScreenCapture>,
        profile: PlatformProfile,
        settings: MirrorSettings,
    ) -> Self {
        Self {
            capture,
            profile,
            settings,
        }
    }

    /// Captures and encodes one frame.
    ///
    /// `claim` is released when the blocking grab finishes, not when this
    /// future resolves; after a timeout the slot stays busy until the
    /// backend returns.
    ///
    /// # Errors
    ///
    /// - [`MirrorError::Wayland`] without attempting capture on Wayland.
    /// - [`MirrorError::Timeout`] if the backend takes longer than the limit.
    /// - [`MirrorError::Capture`] / [`MirrorError::Encode`] on backend or
    ///   encoder failure.
    pub async fn capture_frame(&self, claim: CaptureClaim) -> Result<MirrorFrame, MirrorError> {
        if self.profile.is_wayland() {
            return Err(MirrorError::Wayland);
        }

        let capture = Arc::clone(&self.capture);
        let MirrorSettings {
            capture_timeout,
            max_width,
            jpeg_quality,
        } = self.settings;

        let job = task::spawn_blocking(move || {
            let _claim = claim;
            let raw = capture.grab()?;
            let logical = capture
                .logical_size()
                .unwrap_or((raw.width, raw.height));
            encode_frame(&raw, logical, max_width, jpeg_quality)
        });

        match tokio::time::timeout(capture_timeout, job).await {
            Err(_) => Err(MirrorError::Timeout(capture_timeout)),
            Ok(Err(join)) => Err(CaptureError::Platform(join.to_string()).into()),
            Ok(Ok(result)) => result,
        }
    }

    /// Pointer position as a fraction of the logical screen, clamped to [0, 1].
    pub fn cursor_fraction(&self, position: (i32, i32)) -> Option<(f64, f64)> {
        let (w, h) = self.capture.logical_size().ok()?;
        if w == 0 || h == 0 {
            return None;
        }
        let fx = (f64::from(position.0) / f64::from(w)).clamp(0.0, 1.0);
        let fy = (f64::from(position.1) / f64::from(h)).clamp(0.0, 1.0);
        Some((fx, fy))
    }
}

/// Converts, downscales and JPEG-encodes a raw frame.
///
/// Frames wider than `max_width` are scaled down with the aspect ratio kept;
/// narrower frames are never scaled up.
pub fn encode_frame(
    raw: &RawFrame,
    logical: (u32, u32),
    max_width: u32,
    quality: u8,
) -> Result<MirrorFrame, MirrorError> {
    let rgb = to_rgb(raw)?;
    let mut img = RgbImage::from_raw(raw.width, raw.height, rgb).ok_or_else(|| {
        MirrorError::Encode(format!("bad buffer for {}x{}", raw.width, raw.height))
    })?;

    if raw.width > max_width && max_width > 0 {
        let height = ((u64::from(raw.height) * u64::from(max_width)) / u64::from(raw.width))
            .max(1) as u32;
        img = image::imageops::resize(&img, max_width, height, FilterType::Triangle);
    }

    let (width, height) = img.dimensions();
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100))
        .encode(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .map_err(|e| MirrorError::Encode(e.to_string()))?;

    let (lw, lh) = (logical.0.max(1), logical.1.max(1));
    Ok(MirrorFrame {
        width,
        height,
        jpeg,
        scale_x: f64::from(width) / f64::from(lw),
        scale_y: f64::from(height) / f64::from(lh),
    })
}

fn to_rgb(raw: &RawFrame) -> Result<Vec<u8>, MirrorError> {
    let bpp = raw.format.bytes_per_pixel();
    let row_bytes = raw.width as usize * bpp;
    let rows = raw.height as usize;
    if raw.width == 0 || rows == 0 || raw.stride < row_bytes {
        return Err(MirrorError::Encode(format!(
            "invalid frame geometry {}x{} stride {}",
            raw.width, raw.height, raw.stride
        )));
    }
    let needed = raw.stride * (rows - 1) + row_bytes;
    if raw.data.len() < needed {
        return Err(MirrorError::Encode(format!(
            "frame buffer too short: {} < {needed}",
            raw.data.len()
        )));
    }

    let mut out = Vec::with_capacity(raw.width as usize * rows * 3);
    for row in raw.data.chunks(raw.stride).take(rows) {
        for px in row[..row_bytes].chunks_exact(bpp) {
            match raw.format {
                PixelFormat::Bgra => out.extend_from_slice(&[px[2], px[1], px[0]]),
                PixelFormat::Rgba | PixelFormat::Rgb => out.extend_from_slice(&px[..3]),
            }
        }
    }
    Ok(out)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use rein_core::HostOs;

    /// A solid-colour screen of the given size.
    struct SolidScreen {
        width: u32,
        height: u32,
        delay: Duration,
    }

    impl ScreenCapture for SolidScreen {
        fn grab(&self) -> Result<RawFrame, CaptureError> {
            std::thread::sleep(self.delay);
            let stride = self.width as usize * 4 + 8;
            let mut data = vec![0u8; stride * self.height as usize];
            for row in data.chunks_mut(stride) {
                for px in row[..self.width as usize * 4].chunks_exact_mut(4) {
                    px.copy_from_slice(&[255, 0, 0, 255]); // blue in BGRA
                }
            }
            Ok(RawFrame {
                width: self.width,
                height: self.height,
                stride,
                format: PixelFormat::Bgra,
                data,
            })
        }

        fn logical_size(&self) -> Result<(u32, u32), CaptureError> {
            Ok((self.width, self.height))
        }
    }

    fn settings() -> MirrorSettings {
        MirrorSettings {
            capture_timeout: Duration::from_secs(2),
            max_width: 1280,
            jpeg_quality: 60,
        }
    }

    fn pipeline(screen: SolidScreen, wayland: bool) -> MirrorPipeline {
        MirrorPipeline::new(
            Arc::new(screen),
            PlatformProfile::for_os(HostOs::Linux, wayland),
            settings(),
        )
    }

    #[test]
    fn test_bgra_is_converted_to_rgb() {
        let raw = RawFrame {
            width: 1,
            height: 1,
            stride: 4,
            format: PixelFormat::Bgra,
            data: vec![10, 20, 30, 255],
        };
        assert_eq!(to_rgb(&raw).unwrap(), vec![30, 20, 10]);
    }

    #[test]
    fn test_short_buffer_is_an_encode_error() {
        let raw = RawFrame {
            width: 4,
            height: 4,
            stride: 16,
            format: PixelFormat::Rgba,
            data: vec![0; 10],
        };
        assert!(matches!(encode_frame(&raw, (4, 4), 1280, 60), Err(MirrorError::Encode(_))));
    }

    #[test]
    fn test_wide_frame_is_downscaled_with_aspect_ratio() {
        // Arrange
        let screen = SolidScreen { width: 2560, height: 1440, delay: Duration::ZERO };
        let raw = screen.grab().unwrap();

        // Act
        let frame = encode_frame(&raw, (2560, 1440), 1280, 60).unwrap();

        // Assert
        assert_eq!((frame.width, frame.height), (1280, 720));
        assert!((frame.scale_x - 0.5).abs() < 1e-9);
        assert!((frame.scale_y - 0.5).abs() < 1e-9);
        assert_eq!(&frame.jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_narrow_frame_is_not_upscaled() {
        let screen = SolidScreen { width: 800, height: 600, delay: Duration::ZERO };
        let frame = encode_frame(&screen.grab().unwrap(), (800, 600), 1280, 60).unwrap();
        assert_eq!((frame.width, frame.height), (800, 600));
    }

    #[test]
    fn test_hidpi_scale_uses_logical_size() {
        let screen = SolidScreen { width: 1000, height: 500, delay: Duration::ZERO };
        let frame = encode_frame(&screen.grab().unwrap(), (500, 250), 1280, 60).unwrap();
        assert!((frame.scale_x - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_wayland_is_refused_without_capture() {
        let p = pipeline(SolidScreen { width: 10, height: 10, delay: Duration::ZERO }, true);
        let slot = CaptureSlot::default();
        let err = p.capture_frame(slot.try_claim().unwrap()).await.unwrap_err();
        assert!(matches!(err, MirrorError::Wayland));
        assert!(!slot.is_busy());
        assert_eq!(
            err.to_message(),
            ServerMessage::MirrorError {
                message: err.to_string(),
                is_wayland: Some(true)
            }
        );
    }

    #[tokio::test]
    async fn test_slow_capture_times_out() {
        let p = MirrorPipeline::new(
            Arc::new(SolidScreen { width: 10, height: 10, delay: Duration::from_millis(300) }),
            PlatformProfile::for_os(HostOs::Windows, false),
            MirrorSettings { capture_timeout: Duration::from_millis(50), ..settings() },
        );
        let err = p.capture_frame(CaptureSlot::default().try_claim().unwrap()).await.unwrap_err();
        assert!(matches!(err, MirrorError::Timeout(_)));
        assert_eq!(
            err.to_message(),
            ServerMessage::MirrorError { message: err.to_string(), is_wayland: None }
        );
    }

    #[tokio::test]
    async fn test_capture_frame_happy_path() {
        let p = pipeline(SolidScreen { width: 64, height: 32, delay: Duration::ZERO }, false);
        let frame = p.capture_frame(CaptureSlot::default().try_claim().unwrap()).await.unwrap();
        assert_eq!((frame.width, frame.height), (64, 32));
    }

    #[tokio::test]
    async fn test_timed_out_grab_keeps_slot_busy_until_it_returns() {
        // Arrange: a grab that outlives the capture timeout
        let p = MirrorPipeline::new(
            Arc::new(SolidScreen { width: 10, height: 10, delay: Duration::from_millis(300) }),
            PlatformProfile::for_os(HostOs::Windows, false),
            MirrorSettings { capture_timeout: Duration::from_millis(50), ..settings() },
        );
        let slot = CaptureSlot::default();

        // Act
        let err = p.capture_frame(slot.try_claim().unwrap()).await.unwrap_err();

        // Assert: the timeout is reported but the grab still owns the slot
        assert!(matches!(err, MirrorError::Timeout(_)));
        assert!(slot.is_busy());
        assert!(slot.try_claim().is_none());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!slot.is_busy());
        assert!(slot.try_claim().is_some());
    }

    #[test]
    fn test_slot_is_freed_when_claim_drops() {
        let slot = CaptureSlot::default();
        let claim = slot.try_claim().unwrap();
        assert!(slot.try_claim().is_none());
        drop(claim);
        assert!(slot.try_claim().is_some());
    }

    #[test]
    fn test_cursor_fraction_is_clamped() {
        let p = pipeline(SolidScreen { width: 200, height: 100, delay: Duration::ZERO }, false);
        assert_eq!(p.cursor_fraction((100, 25)), Some((0.5, 0.25)));
        assert_eq!(p.cursor_fraction((-10, 500)), Some((0.0, 1.0)));
    }
}
