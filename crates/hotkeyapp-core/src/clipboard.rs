//! Clipboard staging: paste long text through the clipboard and capture
//! the current selection with Ctrl+C.
//!
//! The clipboard is shared with every other process. Nothing here assumes
//! that what we wrote is still there when we look again; the sequence
//! number is the only reliable signal of a foreign write.

use crate::error::{ClipboardError, InjectionError};
use crate::injector::{InputSink, Injector};
use crate::vk::{VK_C, VK_CONTROL, VK_V};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const CLIPBOARD_ATTEMPTS: u32 = 5;
pub const CLIPBOARD_RETRY_DELAY: Duration = Duration::from_millis(10);

const SEQUENCE_POLL: Duration = Duration::from_millis(3);

pub trait ClipboardAccess {
    /// Current text, `None` when the clipboard holds no text.
    fn get_text(&mut self) -> Result<Option<String>, ClipboardError>;
    fn set_text(&mut self, text: &str) -> Result<(), ClipboardError>;
    /// Changes on every write by any process.
    fn sequence_number(&self) -> u32;
}

/// Runs `op` up to [`CLIPBOARD_ATTEMPTS`] times while the clipboard is
/// busy (typically opened by another process).
pub fn with_retry<T>(
    mut op: impl FnMut() -> Result<T, ClipboardError>,
) -> Result<T, InjectionError> {
    for attempt in 1..=CLIPBOARD_ATTEMPTS {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) => {
                debug!("Clipboard attempt {}/{} failed: {}", attempt, CLIPBOARD_ATTEMPTS, e);
                if attempt < CLIPBOARD_ATTEMPTS {
                    std::thread::sleep(CLIPBOARD_RETRY_DELAY);
                }
            }
        }
    }
    Err(InjectionError::ClipboardUnavailable {
        attempts: CLIPBOARD_ATTEMPTS,
    })
}

/// Waits until the sequence number moves away from `before`.
fn wait_for_change<C: ClipboardAccess>(clipboard: &C, before: u32, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if clipboard.sequence_number() != before {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(SEQUENCE_POLL);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasteOptions {
    /// Time the target application gets to read the clipboard before the
    /// old content is put back.
    pub settle: Duration,
}

impl Default for PasteOptions {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(100),
        }
    }
}

/// Inserts `text` into the focused window with Ctrl+V and then puts the
/// previous clipboard text back.
///
/// If the clipboard cannot be read or written the operation stops before
/// anything was changed. The restore is skipped when another process wrote
/// to the clipboard after us, and a failed restore is only logged.
pub fn paste_via_clipboard<C, S>(
    clipboard: &mut C,
    injector: &mut Injector<S>,
    text: &str,
    options: PasteOptions,
) -> Result<(), InjectionError>
where
    C: ClipboardAccess,
    S: InputSink,
{
    let saved = with_retry(|| clipboard.get_text())?;
    with_retry(|| clipboard.set_text(text))?;
    let ours = clipboard.sequence_number();
    debug!("Staged {} chars on the clipboard (seq={})", text.chars().count(), ours);

    let combo = injector.timings().combo();
    if !combo.is_zero() {
        std::thread::sleep(combo);
    }

    let pasted = injector.press_chord(VK_V, &[VK_CONTROL], 0);
    if pasted.is_ok() && !options.settle.is_zero() {
        std::thread::sleep(options.settle);
    }

    restore(clipboard, saved, ours);
    pasted
}

fn restore<C: ClipboardAccess>(clipboard: &mut C, saved: Option<String>, ours: u32) {
    if clipboard.sequence_number() != ours {
        info!("Clipboard changed by another process, previous content not restored");
        return;
    }
    let Some(saved) = saved else {
        debug!("Clipboard held no text before paste, nothing to restore");
        return;
    };
    if let Err(e) = with_retry(|| clipboard.set_text(&saved)) {
        warn!("Failed to restore clipboard: {}", e);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureOptions {
    /// How long Ctrl+C is held; already clamped by the caller.
    pub copy_hold_ms: u64,
    pub attempts: u32,
    /// Wait after the first failed attempt; grows by itself each attempt.
    pub base_delay: Duration,
    /// How long to wait for the target to put something on the clipboard.
    pub change_timeout: Duration,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            copy_hold_ms: 0,
            attempts: 3,
            base_delay: Duration::from_millis(50),
            change_timeout: Duration::from_millis(250),
        }
    }
}

/// Copies the current selection of the focused window and returns it.
///
/// `Ok(None)` means nothing was copied after every attempt (no selection,
/// or the target ignored Ctrl+C). The clipboard keeps the copied text.
pub fn capture_selection<C, S>(
    clipboard: &mut C,
    injector: &mut Injector<S>,
    options: CaptureOptions,
) -> Result<Option<String>, InjectionError>
where
    C: ClipboardAccess,
    S: InputSink,
{
    let mut delay = options.base_delay;
    for attempt in 1..=options.attempts.max(1) {
        let before = clipboard.sequence_number();
        injector.press_chord(VK_C, &[VK_CONTROL], options.copy_hold_ms)?;

        if wait_for_change(clipboard, before, options.change_timeout) {
            match with_retry(|| clipboard.get_text())? {
                Some(text) if !text.is_empty() => {
                    debug!("Captured {} chars on attempt {}", text.chars().count(), attempt);
                    return Ok(Some(text));
                }
                _ => debug!("Copy on attempt {} produced no text", attempt),
            }
        } else {
            debug!("Clipboard unchanged after Ctrl+C (attempt {})", attempt);
        }

        if attempt < options.attempts {
            std::thread::sleep(delay);
            delay += options.base_delay;
        }
    }
    info!("No selection captured after {} attempts", options.attempts);
    Ok(None)
}
