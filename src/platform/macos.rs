//! macOS modifier state via Quartz event sources and run loop pumping

use std::time::Duration;

use core_foundation::runloop::{kCFRunLoopDefaultMode, CFRunLoop};
use core_graphics::event::CGEventFlags;

use crate::swap::ShortcutModifier;

pub const SHORTCUT_MODIFIER: ShortcutModifier = ShortcutModifier::Meta;

/// kCGEventSourceStateCombinedSessionState
const COMBINED_SESSION_STATE: i32 = 0;

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGEventSourceFlagsState(state_id: i32) -> u64;
}

pub fn is_modifier_held(modifier: ShortcutModifier) -> bool {
    let raw = unsafe { CGEventSourceFlagsState(COMBINED_SESSION_STATE) };
    let flags = CGEventFlags::from_bits_truncate(raw);
    let mask = match modifier {
        ShortcutModifier::Control => CGEventFlags::CGEventFlagControl,
        ShortcutModifier::Meta => CGEventFlags::CGEventFlagCommand,
    };
    flags.contains(mask)
}

pub fn pump_events() {
    unsafe {
        let _ = CFRunLoop::run_in_mode(kCFRunLoopDefaultMode, Duration::ZERO, true);
    }
}
