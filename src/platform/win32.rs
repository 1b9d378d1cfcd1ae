//! Win32 key state and message pump

use windows::Win32::Foundation::HWND;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    GetKeyState, VIRTUAL_KEY, VK_CONTROL, VK_LWIN, VK_RWIN,
};
use windows::Win32::UI::WindowsAndMessaging::{
    DispatchMessageW, PeekMessageW, TranslateMessage, MSG, PM_REMOVE,
};

use crate::swap::ShortcutModifier;

pub const SHORTCUT_MODIFIER: ShortcutModifier = ShortcutModifier::Control;

pub fn is_modifier_held(modifier: ShortcutModifier) -> bool {
    match modifier {
        ShortcutModifier::Control => key_down(VK_CONTROL),
        ShortcutModifier::Meta => key_down(VK_LWIN) || key_down(VK_RWIN),
    }
}

/// High bit of the key state is set while the key is down
fn key_down(key: VIRTUAL_KEY) -> bool {
    unsafe { GetKeyState(i32::from(key.0)) < 0 }
}

pub fn pump_events() {
    let mut msg = MSG::default();
    unsafe {
        while PeekMessageW(&mut msg, HWND::default(), 0, 0, PM_REMOVE).as_bool() {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
}
