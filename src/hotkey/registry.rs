//! Global hotkey registration using the `global-hotkey` crate
//!
//! Owns the single OS-level hotkey slot used by the daemon. Press events
//! are delivered from the OS callback into a channel consumed by the
//! binder loop.

use std::time::Instant;

use global_hotkey::hotkey::{Code, HotKey, Modifiers as HotKeyModifiers};
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::keys::{Key, KeyCombination, Modifiers};

/// Events sent from the OS hotkey callback to the binder
#[derive(Debug, Clone, Copy)]
pub enum HotkeyEvent {
    /// A registered hotkey was pressed
    Pressed {
        /// Registration id reported by the OS
        id: u32,
        /// When the press was delivered to this process
        at: Instant,
    },
}

/// Errors raised while binding a key combination
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindingError {
    #[error("invalid key combination {combination:?}: {reason}")]
    InvalidCombination {
        combination: String,
        reason: &'static str,
    },

    #[error("failed to register {combination}: {reason}")]
    RegistrationConflict { combination: String, reason: String },

    #[error("hotkey manager unavailable: {0}")]
    ManagerUnavailable(String),
}

/// The OS facility that owns the global hotkey slot
pub trait HotkeyRegistry {
    /// Register `combination`, returning the id its presses will carry
    fn register(&mut self, combination: &KeyCombination) -> Result<u32, BindingError>;

    /// Release the current registration, if any
    fn unregister(&mut self);

    /// Whether `id` belongs to the current registration
    fn is_registered(&self, id: u32) -> bool;
}

/// `HotkeyRegistry` backed by `GlobalHotKeyManager`
///
/// At most one hotkey is registered at a time. The registration is
/// released when the registry is dropped.
pub struct GlobalHotkeyRegistry {
    manager: GlobalHotKeyManager,
    current: Option<HotKey>,
}

impl GlobalHotkeyRegistry {
    /// Create the manager and route press events into `event_tx`
    ///
    /// Must be called on the thread that pumps platform events.
    pub fn new(event_tx: mpsc::UnboundedSender<HotkeyEvent>) -> Result<Self, BindingError> {
        let manager = GlobalHotKeyManager::new()
            .map_err(|e| BindingError::ManagerUnavailable(e.to_string()))?;

        GlobalHotKeyEvent::set_event_handler(Some(move |event: GlobalHotKeyEvent| {
            if event.state() != HotKeyState::Pressed {
                return;
            }
            let pressed = HotkeyEvent::Pressed {
                id: event.id(),
                at: Instant::now(),
            };
            if event_tx.send(pressed).is_err() {
                debug!("hotkey event dropped - binder gone");
            }
        }));

        info!("global hotkey manager created");

        Ok(Self {
            manager,
            current: None,
        })
    }
}

impl HotkeyRegistry for GlobalHotkeyRegistry {
    fn register(&mut self, combination: &KeyCombination) -> Result<u32, BindingError> {
        let hotkey = to_hotkey(combination).ok_or_else(|| BindingError::InvalidCombination {
            combination: combination.to_string(),
            reason: "key has no hotkey code",
        })?;
        self.manager
            .register(hotkey)
            .map_err(|e| BindingError::RegistrationConflict {
                combination: combination.to_string(),
                reason: e.to_string(),
            })?;

        self.current = Some(hotkey);
        Ok(hotkey.id())
    }

    fn unregister(&mut self) {
        if let Some(hotkey) = self.current.take() {
            match self.manager.unregister(hotkey) {
                Ok(()) => debug!(id = hotkey.id(), "hotkey unregistered"),
                Err(e) => warn!(%e, id = hotkey.id(), "failed to unregister hotkey"),
            }
        }
    }

    fn is_registered(&self, id: u32) -> bool {
        self.current.map_or(false, |hotkey| hotkey.id() == id)
    }
}

impl Drop for GlobalHotkeyRegistry {
    fn drop(&mut self) {
        self.unregister();
        GlobalHotKeyEvent::set_event_handler(None::<fn(GlobalHotKeyEvent)>);
    }
}

/// Decompose a combination into the manager's modifier mask and key code
fn to_hotkey(combination: &KeyCombination) -> Option<HotKey> {
    let code = to_code(combination.key)?;
    Some(HotKey::new(Some(to_modifiers(combination.modifiers)), code))
}

fn to_modifiers(modifiers: Modifiers) -> HotKeyModifiers {
    let mut mask = HotKeyModifiers::empty();
    if modifiers.control {
        mask |= HotKeyModifiers::CONTROL;
    }
    if modifiers.shift {
        mask |= HotKeyModifiers::SHIFT;
    }
    if modifiers.alt {
        mask |= HotKeyModifiers::ALT;
    }
    mask
}

fn to_code(key: Key) -> Option<Code> {
    let code = match key {
        Key::Char(c) => return char_code(c),
        Key::F(n) => return function_code(n),
        Key::Space => Code::Space,
        Key::Tab => Code::Tab,
        Key::Return => Code::Enter,
        Key::Escape => Code::Escape,
        Key::Insert => Code::Insert,
        Key::Delete => Code::Delete,
        Key::Home => Code::Home,
        Key::End => Code::End,
        Key::PageUp => Code::PageUp,
        Key::PageDown => Code::PageDown,
        Key::Left => Code::ArrowLeft,
        Key::Right => Code::ArrowRight,
        Key::Up => Code::ArrowUp,
        Key::Down => Code::ArrowDown,
    };
    Some(code)
}

fn char_code(c: char) -> Option<Code> {
    let code = match c {
        'A' => Code::KeyA,
        'B' => Code::KeyB,
        'C' => Code::KeyC,
        'D' => Code::KeyD,
        'E' => Code::KeyE,
        'F' => Code::KeyF,
        'G' => Code::KeyG,
        'H' => Code::KeyH,
        'I' => Code::KeyI,
        'J' => Code::KeyJ,
        'K' => Code::KeyK,
        'L' => Code::KeyL,
        'M' => Code::KeyM,
        'N' => Code::KeyN,
        'O' => Code::KeyO,
        'P' => Code::KeyP,
        'Q' => Code::KeyQ,
        'R' => Code::KeyR,
        'S' => Code::KeyS,
        'T' => Code::KeyT,
        'U' => Code::KeyU,
        'V' => Code::KeyV,
        'W' => Code::KeyW,
        'X' => Code::KeyX,
        'Y' => Code::KeyY,
        'Z' => Code::KeyZ,
        '0' => Code::Digit0,
        '1' => Code::Digit1,
        '2' => Code::Digit2,
        '3' => Code::Digit3,
        '4' => Code::Digit4,
        '5' => Code::Digit5,
        '6' => Code::Digit6,
        '7' => Code::Digit7,
        '8' => Code::Digit8,
        '9' => Code::Digit9,
        _ => return None,
    };
    Some(code)
}

fn function_code(n: u8) -> Option<Code> {
    let code = match n {
        1 => Code::F1,
        2 => Code::F2,
        3 => Code::F3,
        4 => Code::F4,
        5 => Code::F5,
        6 => Code::F6,
        7 => Code::F7,
        8 => Code::F8,
        9 => Code::F9,
        10 => Code::F10,
        11 => Code::F11,
        12 => Code::F12,
        13 => Code::F13,
        14 => Code::F14,
        15 => Code::F15,
        16 => Code::F16,
        17 => Code::F17,
        18 => Code::F18,
        19 => Code::F19,
        20 => Code::F20,
        21 => Code::F21,
        22 => Code::F22,
        23 => Code::F23,
        24 => Code::F24,
        _ => return None,
    };
    Some(code)
}
