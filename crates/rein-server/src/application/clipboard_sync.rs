//! Desktop → device clipboard sync.
//!
//! A background task polls the desktop clipboard.  When the text changes, and
//! the change is not just the echo of something a device pasted a moment ago,
//! the new text is handed to `publish`, which sends `clipboard-text` to every
//! authorized connection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rein_core::ClipboardTracker;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::application::execute_input::ClipboardAccess;
use crate::application::lock;

/// Checks the clipboard once.  Returns the text to publish, if any.
///
/// `last_seen` is the raw value of the previous poll; an unchanged clipboard
/// is never fed to the tracker again, even after its record expired.
pub fn poll_once(
    clipboard: &dyn ClipboardAccess,
    tracker: &Mutex<ClipboardTracker>,
    last_seen: &mut Option<String>,
    now: Instant,
) -> Option<String> {
    let text = match clipboard.read_text() {
        Ok(text) => text,
        Err(e) => {
            debug!("clipboard poll failed: {e}");
            return None;
        }
    };
    if last_seen.as_deref() == Some(text.as_str()) {
        return None;
    }
    let published = lock(tracker).observe_desktop(&text, now).map(|record| record.text);
    *last_seen = Some(text);
    published
}

/// Spawns the polling task.  It stops when `running` goes false.
pub fn spawn_clipboard_monitor<F>(
    clipboard: Arc<dyn ClipboardAccess>,
    tracker: Arc<Mutex<ClipboardTracker>>,
    interval: Duration,
    running: Arc<AtomicBool>,
    publish: F,
) -> JoinHandle<()>
where
    F: Fn(String) + Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!(?interval, "clipboard monitor started");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut last_seen: Option<String> = None;

        while running.load(Ordering::SeqCst) {
            ticker.tick().await;
            let clipboard = Arc::clone(&clipboard);
            let tracker = Arc::clone(&tracker);
            let mut seen = last_seen.take();
            let (changed, seen) = tokio::task::spawn_blocking(move || {
                let changed = poll_once(clipboard.as_ref(), &tracker, &mut seen, Instant::now());
                (changed, seen)
            })
            .await
            .unwrap_or((None, None));
            last_seen = seen;

            if let Some(text) = changed {
                debug!(chars = text.chars().count(), "desktop clipboard changed");
                publish(text);
            }
        }
        info!("clipboard monitor stopped");
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
