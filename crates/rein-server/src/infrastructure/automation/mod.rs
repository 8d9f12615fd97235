//! Platform-specific automation backends.
//!
//! The correct implementation is selected at compile time via
//! `#[cfg(target_os = ...)]`; [`platform_automation`] builds it.
//! [`mock::RecordingAutomation`] is always available for tests and
//! `--dry-run`.

use std::sync::Arc;

use crate::application::execute_input::{Automation, AutomationError};

pub mod mock;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(target_os = "linux")]
pub mod x11;

#[cfg(target_os = "macos")]
pub mod macos;

/// Builds the automation backend for the current OS.
///
/// # Errors
///
/// Returns `AutomationError::Platform` if the desktop cannot be reached
/// (for example no X display) and `Unsupported` on other OSes.
pub fn platform_automation() -> Result<Arc<dyn Automation>, AutomationError> {
    #[cfg(target_os = "linux")]
    {
        Ok(Arc::new(x11::X11Automation::new()?))
    }
    #[cfg(target_os = "windows")]
    {
        Ok(Arc::new(windows::WindowsAutomation::new()))
    }
    #[cfg(target_os = "macos")]
    {
        Ok(Arc::new(macos::MacosAutomation::new()))
    }
    #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
    {
        Err(AutomationError::Unsupported(std::env::consts::OS.to_string()))
    }
}
