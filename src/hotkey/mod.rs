//! Hotkey module: key combinations, the OS hotkey slot and key capture
//!
//! Uses the `global-hotkey` crate to own a single system-wide hotkey and
//! a subscription hub to receive key releases while rebinding.

mod capture;
mod keys;
mod registry;

pub use capture::{CaptureHub, KeySubscription};
pub use keys::{Key, KeyCombination, KeyRelease, Modifiers, ObservedKey};
pub use registry::{BindingError, GlobalHotkeyRegistry, HotkeyEvent, HotkeyRegistry};
