use std::sync::{Mutex, PoisonError};

use chatline_chat::{Clipboard, ClipboardError};

/// System clipboard backed by `arboard`.
///
/// The handle lives as long as the session: on X11 the copied text is only served while
/// the owning `arboard::Clipboard` is alive.
pub struct ArboardClipboard {
    inner: Mutex<arboard::Clipboard>,
}

impl ArboardClipboard {
    pub fn new() -> Result<Self, ClipboardError> {
        let inner = arboard::Clipboard::new().map_err(clipboard_error)?;
        Ok(Self {
            inner: Mutex::new(inner),
        })
    }
}

impl Clipboard for ArboardClipboard {
    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_text(text)
            .map_err(clipboard_error)
    }
}

fn clipboard_error(error: arboard::Error) -> ClipboardError {
    ClipboardError::new(error.to_string())
}
