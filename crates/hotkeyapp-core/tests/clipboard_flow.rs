use hotkeyapp_core::clipboard::{
    capture_selection, paste_via_clipboard, CaptureOptions, ClipboardAccess, PasteOptions,
};
use hotkeyapp_core::error::{ClipboardError, InjectionError};
use hotkeyapp_core::injector::{Injector, InputSink};
use hotkeyapp_core::types::{InputEvent, Timings};
use hotkeyapp_core::vk::{VK_C, VK_CONTROL, VK_V};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// A focused text field plus the system clipboard. Ctrl+V inserts the
/// clipboard text, Ctrl+C copies the selection.
#[derive(Default)]
struct Desktop {
    clipboard: Option<String>,
    seq: u32,
    selection: Option<String>,
    field: String,
    /// Ctrl+C presses to ignore before the app reacts.
    deaf_copies: u32,
    /// Another process writes this right after our paste.
    foreign_write_on_paste: Option<String>,
    clipboard_locked: bool,
}

impl Desktop {
    fn write_clipboard(&mut self, text: &str) {
        self.clipboard = Some(text.to_string());
        self.seq += 1;
    }
}

#[derive(Clone, Default)]
struct Shared(Arc<Mutex<Desktop>>);

impl InputSink for Shared {
    fn send(&mut self, events: &[InputEvent]) -> u32 {
        let mut d = self.0.lock();
        let ctrl = events.contains(&InputEvent::VirtualKey(VK_CONTROL, false));
        if ctrl && events.contains(&InputEvent::VirtualKey(VK_V, false)) {
            if let Some(text) = d.clipboard.clone() {
                d.field.push_str(&text);
            }
            if let Some(foreign) = d.foreign_write_on_paste.take() {
                d.write_clipboard(&foreign);
            }
        }
        if ctrl && events.contains(&InputEvent::VirtualKey(VK_C, false)) {
            if d.deaf_copies > 0 {
                d.deaf_copies -= 1;
            } else if let Some(sel) = d.selection.clone() {
                d.write_clipboard(&sel);
            }
        }
        events.len() as u32
    }

    fn vk_to_scan(&self, _vk: u16) -> u16 {
        0
    }
}

impl ClipboardAccess for Shared {
    fn get_text(&mut self) -> Result<Option<String>, ClipboardError> {
        let d = self.0.lock();
        if d.clipboard_locked {
            return Err(ClipboardError::Busy("OpenClipboard".into()));
        }
        Ok(d.clipboard.clone())
    }

    fn set_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        let mut d = self.0.lock();
        if d.clipboard_locked {
            return Err(ClipboardError::Busy("OpenClipboard".into()));
        }
        d.write_clipboard(text);
        Ok(())
    }

    fn sequence_number(&self) -> u32 {
        self.0.lock().seq
    }
}

fn setup(desktop: Desktop) -> (Shared, Injector<Shared>) {
    let shared = Shared(Arc::new(Mutex::new(desktop)));
    let injector = Injector::new(shared.clone(), Timings::zero());
    (shared, injector)
}

fn fast_paste() -> PasteOptions {
    PasteOptions {
        settle: Duration::from_millis(1),
    }
}

fn fast_capture() -> CaptureOptions {
    CaptureOptions {
        copy_hold_ms: 0,
        attempts: 3,
        base_delay: Duration::from_millis(1),
        change_timeout: Duration::from_millis(20),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

#[test]
fn paste_inserts_text_and_restores_previous_clipboard() {
    init_tracing();
    let (mut cb, mut inj) = setup(Desktop {
        clipboard: Some("user data".into()),
        ..Default::default()
    });

    paste_via_clipboard(&mut cb, &mut inj, "long inserted text", fast_paste()).unwrap();

    let d = cb.0.lock();
    assert_eq!(d.field, "long inserted text");
    assert_eq!(d.clipboard.as_deref(), Some("user data"));
}

#[test]
fn paste_leaves_foreign_write_alone() {
    let (mut cb, mut inj) = setup(Desktop {
        clipboard: Some("user data".into()),
        foreign_write_on_paste: Some("password manager".into()),
        ..Default::default()
    });

    paste_via_clipboard(&mut cb, &mut inj, "hello", fast_paste()).unwrap();

    let d = cb.0.lock();
    assert_eq!(d.field, "hello");
    assert_eq!(d.clipboard.as_deref(), Some("password manager"));
}

#[test]
fn locked_clipboard_aborts_without_touching_anything() {
    let (mut cb, mut inj) = setup(Desktop {
        clipboard: Some("user data".into()),
        clipboard_locked: true,
        ..Default::default()
    });

    let err = paste_via_clipboard(&mut cb, &mut inj, "hello", fast_paste()).unwrap_err();
    assert_eq!(err, InjectionError::ClipboardUnavailable { attempts: 5 });

    let d = cb.0.lock();
    assert!(d.field.is_empty());
    assert_eq!(d.seq, 0);
}

#[test]
fn capture_returns_selection_after_slow_app() {
    init_tracing();
    let (mut cb, mut inj) = setup(Desktop {
        selection: Some("выделенный текст".into()),
        deaf_copies: 2,
        ..Default::default()
    });

    let text = capture_selection(&mut cb, &mut inj, fast_capture()).unwrap();
    assert_eq!(text.as_deref(), Some("выделенный текст"));
}

#[test]
fn capture_without_selection_is_none() {
    let (mut cb, mut inj) = setup(Desktop {
        clipboard: Some("stale".into()),
        ..Default::default()
    });

    let text = capture_selection(&mut cb, &mut inj, fast_capture()).unwrap();
    assert_eq!(text, None);
    // Stale clipboard content is not mistaken for a selection.
    assert_eq!(cb.0.lock().clipboard.as_deref(), Some("stale"));
}
