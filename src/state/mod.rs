//! State machine module for hotkey binding
//!
//! Provides the binder with two states:
//! - Idle: hotkey registered, presses run the clipboard swap
//! - CapturingNextCombination: waiting up to the capture timeout for a
//!   new combination, hotkey presses ignored

mod binder;

pub use binder::{BinderCommand, BindingStatus, HotkeyBinder};
