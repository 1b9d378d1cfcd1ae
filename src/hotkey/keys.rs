//! Key combination model
//!
//! Provides the modifier set, the supported base keys and the
//! `KeyCombination` that is bound to the global hotkey, together with
//! the textual form used by the settings file (`Ctrl+Shift+K`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::registry::BindingError;

/// Tracks which modifier flags belong to a combination or a key event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modifiers {
    /// Control key is held
    #[serde(default)]
    pub control: bool,
    /// Shift key is held
    #[serde(default)]
    pub shift: bool,
    /// Alt key is held
    #[serde(default)]
    pub alt: bool,
}

impl Modifiers {
    pub const CONTROL: Self = Self {
        control: true,
        shift: false,
        alt: false,
    };
    pub const SHIFT: Self = Self {
        control: false,
        shift: true,
        alt: false,
    };
    pub const ALT: Self = Self {
        control: false,
        shift: false,
        alt: true,
    };

    /// Check if no modifier is set
    pub fn is_empty(&self) -> bool {
        !self.control && !self.shift && !self.alt
    }

    /// Union of two modifier sets
    pub fn with(self, other: Self) -> Self {
        Self {
            control: self.control || other.control,
            shift: self.shift || other.shift,
            alt: self.alt || other.alt,
        }
    }
}

/// A non-modifier key that can be bound to the hotkey
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// `A`-`Z` or `0`-`9`; build through `Key::char`, which upper-cases
    Char(char),
    /// Function keys `F1`-`F24`
    F(u8),
    Space,
    Tab,
    Return,
    Escape,
    Insert,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,
    Left,
    Right,
    Up,
    Down,
}

impl Key {
    /// An alphanumeric key, upper-cased; `None` for anything else
    pub fn char(c: char) -> Option<Self> {
        c.is_ascii_alphanumeric().then(|| Key::Char(c.to_ascii_uppercase()))
    }

    /// Whether the key lies inside the set the hotkey layer can register
    pub fn is_bindable(&self) -> bool {
        match *self {
            Key::Char(c) => c.is_ascii_uppercase() || c.is_ascii_digit(),
            Key::F(n) => (1..=24).contains(&n),
            _ => true,
        }
    }

    /// Resolve a key name such as `k`, `F5` or `PgUp` (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        let mut chars = name.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Key::char(c);
        }

        let lower = name.to_ascii_lowercase();
        let key = match lower.as_str() {
            "space" => Key::Space,
            "tab" => Key::Tab,
            "return" | "enter" => Key::Return,
            "esc" | "escape" => Key::Escape,
            "ins" | "insert" => Key::Insert,
            "del" | "delete" => Key::Delete,
            "home" => Key::Home,
            "end" => Key::End,
            "pgup" | "pageup" => Key::PageUp,
            "pgdown" | "pagedown" => Key::PageDown,
            "left" => Key::Left,
            "right" => Key::Right,
            "up" => Key::Up,
            "down" => Key::Down,
            other => {
                let n: u8 = other.strip_prefix('f')?.parse().ok()?;
                if !(1..=24).contains(&n) {
                    return None;
                }
                Key::F(n)
            }
        };
        Some(key)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Char(c) => write!(f, "{}", c),
            Key::F(n) => write!(f, "F{}", n),
            Key::Space => write!(f, "Space"),
            Key::Tab => write!(f, "Tab"),
            Key::Return => write!(f, "Return"),
            Key::Escape => write!(f, "Esc"),
            Key::Insert => write!(f, "Ins"),
            Key::Delete => write!(f, "Del"),
            Key::Home => write!(f, "Home"),
            Key::End => write!(f, "End"),
            Key::PageUp => write!(f, "PgUp"),
            Key::PageDown => write!(f, "PgDown"),
            Key::Left => write!(f, "Left"),
            Key::Right => write!(f, "Right"),
            Key::Up => write!(f, "Up"),
            Key::Down => write!(f, "Down"),
        }
    }
}

/// Modifier flags plus exactly one base key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCombination {
    pub modifiers: Modifiers,
    pub key: Key,
}

impl KeyCombination {
    pub fn new(modifiers: Modifiers, key: Key) -> Self {
        Self { modifiers, key }
    }

    /// A combination is registrable only with at least one modifier and
    /// a key from the supported set
    pub fn validate(&self) -> Result<(), BindingError> {
        let invalid = |reason| BindingError::InvalidCombination {
            combination: self.to_string(),
            reason,
        };

        if self.modifiers.is_empty() {
            return Err(invalid("at least one modifier is required"));
        }
        if !self.key.is_bindable() {
            return Err(invalid("unsupported key"));
        }
        Ok(())
    }
}

impl Default for KeyCombination {
    /// `Ctrl+B`
    fn default() -> Self {
        Self::new(Modifiers::CONTROL, Key::Char('B'))
    }
}

impl fmt::Display for KeyCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.control {
            f.write_str("Ctrl+")?;
        }
        if self.modifiers.alt {
            f.write_str("Alt+")?;
        }
        if self.modifiers.shift {
            f.write_str("Shift+")?;
        }
        write!(f, "{}", self.key)
    }
}

impl FromStr for KeyCombination {
    type Err = BindingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| BindingError::InvalidCombination {
            combination: s.to_string(),
            reason,
        };

        let mut modifiers = Modifiers::default();
        let mut key = None;

        for part in s.split('+').map(str::trim) {
            if part.is_empty() {
                return Err(invalid("empty key name"));
            }
            match part.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => modifiers = modifiers.with(Modifiers::CONTROL),
                "shift" => modifiers = modifiers.with(Modifiers::SHIFT),
                "alt" => modifiers = modifiers.with(Modifiers::ALT),
                _ => {
                    let parsed = Key::from_name(part).ok_or_else(|| invalid("unsupported key"))?;
                    if key.replace(parsed).is_some() {
                        return Err(invalid("more than one base key"));
                    }
                }
            }
        }

        let key = key.ok_or_else(|| invalid("missing base key"))?;
        Ok(Self::new(modifiers, key))
    }
}

/// The key carried by a key release event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservedKey {
    /// Control, Shift, Alt or Meta themselves
    Modifier,
    /// A key that can be bound
    Base(Key),
    /// Anything this daemon cannot register
    Unsupported(String),
}

impl ObservedKey {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "ctrl" | "control" | "shift" | "alt" | "meta" | "super" | "cmd" | "command" => {
                ObservedKey::Modifier
            }
            _ => Key::from_name(name.trim())
                .map(ObservedKey::Base)
                .unwrap_or_else(|| ObservedKey::Unsupported(name.to_string())),
        }
    }
}

/// A key release reported while capturing a new combination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRelease {
    pub key: ObservedKey,
    pub modifiers: Modifiers,
}

impl KeyRelease {
    pub fn new(key: ObservedKey, modifiers: Modifiers) -> Self {
        Self { key, modifiers }
    }

    /// The combination this release describes, if it qualifies for binding
    pub fn combination(&self) -> Option<KeyCombination> {
        match self.key {
            ObservedKey::Base(key) if !self.modifiers.is_empty() => {
                Some(KeyCombination::new(self.modifiers, key))
            }
            _ => None,
        }
    }
}
