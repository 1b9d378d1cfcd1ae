//! Swap module: the capture-restore-finalize clipboard sequence
//!
//! The sequence is written once against `SwapBackend`; the platform
//! module provides the implementation backed by the OS.

mod backend;
mod chord;
mod swapper;

pub use backend::{SwapBackend, SwapError};
pub use chord::{KeyAction, KeyStroke, ShortcutModifier, StrokeKey};
pub use swapper::{ClipboardSwapper, SwapOptions, SwapOutcome};
