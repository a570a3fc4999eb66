use crate::clipboard::ClipboardAccess;
use crate::error::ClipboardError;
use windows::Win32::System::DataExchange::GetClipboardSequenceNumber;

/// The Windows clipboard through `arboard`, plus the Win32 sequence number.
#[derive(Default)]
pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&mut self) -> Result<&mut arboard::Clipboard, ClipboardError> {
        if self.inner.is_none() {
            self.inner = Some(arboard::Clipboard::new().map_err(to_clipboard_error)?);
        }
        self.inner
            .as_mut()
            .ok_or_else(|| ClipboardError::Busy("clipboard handle missing".into()))
    }
}

fn to_clipboard_error(e: arboard::Error) -> ClipboardError {
    match e {
        arboard::Error::ContentNotAvailable | arboard::Error::ConversionFailure => {
            ClipboardError::Unsupported
        }
        other => ClipboardError::Busy(other.to_string()),
    }
}

impl ClipboardAccess for SystemClipboard {
    fn get_text(&mut self) -> Result<Option<String>, ClipboardError> {
        match self.handle()?.get_text() {
            Ok(text) => Ok(Some(text)),
            Err(e) => match to_clipboard_error(e) {
                ClipboardError::Unsupported => Ok(None),
                busy => Err(busy),
            },
        }
    }

    fn set_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        self.handle()?.set_text(text).map_err(to_clipboard_error)
    }

    fn sequence_number(&self) -> u32 {
        unsafe { GetClipboardSequenceNumber() }
    }
}
