//! Fallback for desktops without a physical key state query
//!
//! The modifier is reported as released, so chords always carry their
//! own Control events. The X11 hotkey backend runs its own event thread,
//! so there is nothing to pump here.

use crate::swap::ShortcutModifier;

pub const SHORTCUT_MODIFIER: ShortcutModifier = ShortcutModifier::Control;

pub fn is_modifier_held(_modifier: ShortcutModifier) -> bool {
    false
}

pub fn pump_events() {}
