//! Desktop clipboard adapters.
//!
//! [`ArboardClipboard`] talks to the real clipboard through `arboard`.
//! [`MemoryClipboard`] keeps the text in memory, for tests and `--dry-run`.

use std::sync::Mutex;

use arboard::Clipboard;

use crate::application::execute_input::{AutomationError, ClipboardAccess};
use crate::application::lock;

/// The desktop clipboard via `arboard`.
///
/// An `arboard::Clipboard` handle must not be used from two threads at once,
/// so it lives behind a `Mutex`.
pub struct ArboardClipboard {
    inner: Mutex<Clipboard>,
}

impl ArboardClipboard {
    /// Opens the clipboard.
    ///
    /// # Errors
    ///
    /// Returns `AutomationError::Clipboard` when no clipboard is reachable
    /// (no display server, for example).
    pub fn new() -> Result<Self, AutomationError> {
        let clipboard = Clipboard::new().map_err(|e| AutomationError::Clipboard(e.to_string()))?;
        Ok(Self {
            inner: Mutex::new(clipboard),
        })
    }
}

impl ClipboardAccess for ArboardClipboard {
    fn read_text(&self) -> Result<String, AutomationError> {
        match lock(&self.inner).get_text() {
            Ok(text) => Ok(text),
            // An empty or non-text clipboard reads as "".
            Err(arboard::Error::ContentNotAvailable) => Ok(String::new()),
            Err(e) => Err(AutomationError::Clipboard(e.to_string())),
        }
    }

    fn write_text(&self, text: &str) -> Result<(), AutomationError> {
        lock(&self.inner)
            .set_text(text)
            .map_err(|e| AutomationError::Clipboard(e.to_string()))
    }
}

/// An in-memory clipboard.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    text: Mutex<String>,
}

impl MemoryClipboard {
    pub fn set(&self, text: &str) {
        *lock(&self.text) = text.to_string();
    }

    pub fn get(&self) -> String {
        lock(&self.text).clone()
    }
}

impl ClipboardAccess for MemoryClipboard {
    fn read_text(&self) -> Result<String, AutomationError> {
        Ok(self.get())
    }

    fn write_text(&self, text: &str) -> Result<(), AutomationError> {
        self.set(text);
        Ok(())
    }
}
