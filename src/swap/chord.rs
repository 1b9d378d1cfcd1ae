//! Synthetic key chords
//!
//! A chord is the ordered down/up sequence for `<modifier>+<letter>`.
//! When the modifier is already physically held, only the letter events
//! are emitted so the user's own key state is left alone.

/// The modifier used for the platform's copy/paste shortcuts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutModifier {
    Control,
    /// Command on macOS
    Meta,
}

/// A single key in a chord
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrokeKey {
    Modifier(ShortcutModifier),
    Letter(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Down,
    Up,
}

/// One synthetic key event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyStroke {
    pub key: StrokeKey,
    pub action: KeyAction,
}

impl KeyStroke {
    pub fn down(key: StrokeKey) -> Self {
        Self {
            key,
            action: KeyAction::Down,
        }
    }

    pub fn up(key: StrokeKey) -> Self {
        Self {
            key,
            action: KeyAction::Up,
        }
    }
}

/// Build the event sequence for `modifier+letter`
pub fn chord(modifier: ShortcutModifier, letter: char, modifier_held: bool) -> Vec<KeyStroke> {
    let modifier = StrokeKey::Modifier(modifier);
    let letter = StrokeKey::Letter(letter);

    let mut strokes = Vec::with_capacity(4);
    if !modifier_held {
        strokes.push(KeyStroke::down(modifier));
    }
    strokes.push(KeyStroke::down(letter));
    strokes.push(KeyStroke::up(letter));
    if !modifier_held {
        strokes.push(KeyStroke::up(modifier));
    }
    strokes
}
