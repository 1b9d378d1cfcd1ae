//! Clipboard and input capability used by the swap sequence

use super::chord::{KeyStroke, ShortcutModifier};

/// Errors raised by a `SwapBackend`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SwapError {
    #[error("clipboard unavailable during {operation}: {reason}")]
    ClipboardUnavailable {
        operation: &'static str,
        reason: String,
    },

    #[error("failed to inject key events: {0}")]
    InputInjection(String),
}

/// OS primitives needed by `ClipboardSwapper`
///
/// Every call opens and releases the clipboard on its own, so no access
/// is held between steps of the sequence.
pub trait SwapBackend {
    /// Current clipboard text; `Ok(None)` when empty or not text
    fn read_text(&mut self) -> Result<Option<String>, SwapError>;

    /// Replace the clipboard contents with `text`
    fn write_text(&mut self, text: &str) -> Result<(), SwapError>;

    /// Inject the given key events in order
    fn send_keys(&mut self, strokes: &[KeyStroke]) -> Result<(), SwapError>;

    /// Whether `modifier` is physically held right now
    fn is_modifier_held(&self, modifier: ShortcutModifier) -> bool;

    /// Modifier used for the copy and paste shortcuts
    fn shortcut_modifier(&self) -> ShortcutModifier {
        ShortcutModifier::Control
    }
}
