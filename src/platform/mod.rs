//! OS-backed implementation of `SwapBackend`
//!
//! Clipboard access goes through `arboard` and synthetic input through
//! `enigo` on every platform. Modifier key state and the event pump that
//! delivers hotkey messages are OS-specific.

#[cfg(target_os = "macos")]
mod macos;
#[cfg(not(any(target_os = "macos", windows)))]
mod other;
#[cfg(windows)]
mod win32;

#[cfg(target_os = "macos")]
use macos as os;
#[cfg(not(any(target_os = "macos", windows)))]
use other as os;
#[cfg(windows)]
use win32 as os;

use arboard::Clipboard;
use enigo::{Direction, Enigo, Key as EnigoKey, Keyboard, Settings};
use tracing::{debug, info};

use crate::swap::{KeyAction, KeyStroke, ShortcutModifier, StrokeKey, SwapBackend, SwapError};

/// Clipboard and keyboard of the running desktop session
pub struct SystemBackend {
    clipboard: Clipboard,
}

impl SystemBackend {
    pub fn new() -> Result<Self, SwapError> {
        let clipboard = Clipboard::new().map_err(|e| SwapError::ClipboardUnavailable {
            operation: "open",
            reason: e.to_string(),
        })?;

        info!(shortcut = ?os::SHORTCUT_MODIFIER, "system clipboard backend ready");
        Ok(Self { clipboard })
    }
}

impl SwapBackend for SystemBackend {
    fn read_text(&mut self) -> Result<Option<String>, SwapError> {
        match self.clipboard.get_text() {
            Ok(text) => Ok(Some(text)),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(e) => Err(SwapError::ClipboardUnavailable {
                operation: "read",
                reason: e.to_string(),
            }),
        }
    }

    fn write_text(&mut self, text: &str) -> Result<(), SwapError> {
        self.clipboard
            .set_text(text)
            .map_err(|e| SwapError::ClipboardUnavailable {
                operation: "write",
                reason: e.to_string(),
            })
    }

    fn send_keys(&mut self, strokes: &[KeyStroke]) -> Result<(), SwapError> {
        // One Enigo connection per chord, released when it goes out of scope
        let mut enigo = Enigo::new(&Settings::default())
            .map_err(|e| SwapError::InputInjection(e.to_string()))?;

        for stroke in strokes {
            let key = match stroke.key {
                StrokeKey::Modifier(ShortcutModifier::Control) => EnigoKey::Control,
                StrokeKey::Modifier(ShortcutModifier::Meta) => EnigoKey::Meta,
                StrokeKey::Letter(c) => EnigoKey::Unicode(c),
            };
            let direction = match stroke.action {
                KeyAction::Down => Direction::Press,
                KeyAction::Up => Direction::Release,
            };
            enigo
                .key(key, direction)
                .map_err(|e| SwapError::InputInjection(e.to_string()))?;
        }

        debug!(count = strokes.len(), "key events injected");
        Ok(())
    }

    fn is_modifier_held(&self, modifier: ShortcutModifier) -> bool {
        os::is_modifier_held(modifier)
    }

    fn shortcut_modifier(&self) -> ShortcutModifier {
        os::SHORTCUT_MODIFIER
    }
}

/// Dispatch pending OS messages so the hotkey manager sees presses
///
/// Must run on the thread that created the `GlobalHotkeyRegistry`.
pub fn pump_events() {
    os::pump_events();
}
