//! `ydotool` pointer fallback for Linux.
//!
//! `ydotool` injects input through `/dev/uinput` via its `ydotoold` daemon,
//! so it works on Wayland compositors where XWarpPointer does not.  Each move
//! is one child process:
//!
//! ```text
//! ydotool mousemove <x> <y>
//! ydotool mousemove --relative <dx> <dy>
//! ```
//!
//! Availability is probed once at startup: the binary must be on `PATH` and
//! `ydotool --help` must run within [`PROBE_TIMEOUT`].

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::application::cursor_fallback::{FallbackAvailability, FallbackPointer};
use crate::application::execute_input::AutomationError;

/// Upper bound on the startup probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Upper bound on one `mousemove` invocation.
pub const MOVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Pointer fallback that shells out to `ydotool`.
#[derive(Debug, Clone)]
pub struct YdotoolPointer {
    binary: Option<PathBuf>,
    reason: String,
}

impl YdotoolPointer {
    /// Looks for a working `ydotool`.
    pub async fn detect() -> Self {
        if !cfg!(target_os = "linux") {
            return Self::disabled("ydotool is Linux-only");
        }
        let binary = match which::which("ydotool") {
            Ok(path) => path,
            Err(_) => {
                return Self::disabled(
                    "ydotool not available - install with: sudo apt install ydotool (or your package manager)",
                )
            }
        };

        let probe = Command::new(&binary)
            .arg("--help")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();
        match timeout(PROBE_TIMEOUT, probe).await {
            Ok(Ok(_)) => {
                info!(path = %binary.display(), "ydotool ready for cursor movement");
                Self {
                    binary: Some(binary),
                    reason: "ydotool ready for cursor movement".into(),
                }
            }
            Ok(Err(e)) => Self::disabled(format!("ydotool could not be started: {e}")),
            Err(_) => Self::disabled("ydotool did not answer --help in time"),
        }
    }

    /// A fallback that is never available.
    pub fn disabled(reason: impl Into<String>) -> Self {
        Self {
            binary: None,
            reason: reason.into(),
        }
    }

    async fn run(&self, args: &[String]) -> Result<(), AutomationError> {
        let binary = self
            .binary
            .as_ref()
            .ok_or_else(|| AutomationError::Unsupported(self.reason.clone()))?;

        debug!(?args, "ydotool");
        let output = Command::new(binary)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();
        let output = timeout(MOVE_TIMEOUT, output)
            .await
            .map_err(|_| AutomationError::Platform(format!("ydotool timed out after {MOVE_TIMEOUT:?}")))?
            .map_err(|e| AutomationError::Platform(format!("failed to spawn ydotool: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AutomationError::Platform(format!(
                "ydotool exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

/// Arguments for one `mousemove`.
fn mousemove_args(relative: bool, x: i32, y: i32) -> Vec<String> {
    let mut args = vec!["mousemove".to_string()];
    if relative {
        args.push("--relative".into());
    }
    args.push(x.to_string());
    args.push(y.to_string());
    args
}

#[async_trait]
impl FallbackPointer for YdotoolPointer {
    fn availability(&self) -> FallbackAvailability {
        FallbackAvailability {
            available: self.binary.is_some(),
            reason: self.reason.clone(),
        }
    }

    async fn move_absolute(&self, x: i32, y: i32) -> Result<(), AutomationError> {
        self.run(&mousemove_args(false, x, y)).await
    }

    async fn move_relative(&self, dx: i32, dy: i32) -> Result<(), AutomationError> {
        self.run(&mousemove_args(true, dx, dy)).await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
