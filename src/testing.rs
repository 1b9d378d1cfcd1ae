//! In-memory fakes for the OS hotkey registry and the swap backend

use std::cell::RefCell;
use std::rc::Rc;

use crate::hotkey::{BindingError, HotkeyRegistry, KeyCombination};
use crate::swap::{KeyAction, KeyStroke, ShortcutModifier, StrokeKey, SwapBackend, SwapError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipboardOp {
    Read(Option<String>),
    Write(String),
    Keys(Vec<KeyStroke>),
}

#[derive(Debug, Default)]
struct ClipboardState {
    clipboard: Option<String>,
    copy_result: Option<String>,
    modifier_held: bool,
    fail_reads: bool,
    fail_writes: bool,
    ops: Vec<ClipboardOp>,
}

/// Simulates a clipboard plus an application holding a selection
///
/// Sending the copy chord replaces the clipboard with `copy_result`.
#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    state: Rc<RefCell<ClipboardState>>,
}

impl FakeBackend {
    pub fn new(clipboard: Option<&str>, copy_result: Option<&str>) -> Self {
        let backend = Self::default();
        {
            let mut state = backend.state.borrow_mut();
            state.clipboard = clipboard.map(str::to_string);
            state.copy_result = copy_result.map(str::to_string);
        }
        backend
    }

    pub fn with_modifier_held(self) -> Self {
        self.state.borrow_mut().modifier_held = true;
        self
    }

    pub fn with_failing_reads(self) -> Self {
        self.state.borrow_mut().fail_reads = true;
        self
    }

    pub fn with_failing_writes(self) -> Self {
        self.state.borrow_mut().fail_writes = true;
        self
    }

    pub fn clipboard(&self) -> Option<String> {
        self.state.borrow().clipboard.clone()
    }

    pub fn ops(&self) -> Vec<ClipboardOp> {
        self.state.borrow().ops.clone()
    }

    pub fn writes(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                ClipboardOp::Write(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn strokes(&self) -> Vec<KeyStroke> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                ClipboardOp::Keys(strokes) => Some(strokes),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// Clipboard contents as seen by each read and write, in order
    pub fn observed(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                ClipboardOp::Read(text) => text,
                ClipboardOp::Write(text) => Some(text),
                ClipboardOp::Keys(_) => None,
            })
            .collect()
    }
}

impl SwapBackend for FakeBackend {
    fn read_text(&mut self) -> Result<Option<String>, SwapError> {
        let mut state = self.state.borrow_mut();
        if state.fail_reads {
            return Err(SwapError::ClipboardUnavailable {
                operation: "read",
                reason: "held by another process".to_string(),
            });
        }
        let text = state.clipboard.clone();
        state.ops.push(ClipboardOp::Read(text.clone()));
        Ok(text)
    }

    fn write_text(&mut self, text: &str) -> Result<(), SwapError> {
        let mut state = self.state.borrow_mut();
        if state.fail_writes {
            return Err(SwapError::ClipboardUnavailable {
                operation: "write",
                reason: "held by another process".to_string(),
            });
        }
        state.clipboard = Some(text.to_string());
        state.ops.push(ClipboardOp::Write(text.to_string()));
        Ok(())
    }

    fn send_keys(&mut self, strokes: &[KeyStroke]) -> Result<(), SwapError> {
        let mut state = self.state.borrow_mut();
        let copies = strokes.iter().any(|stroke| {
            stroke.key == StrokeKey::Letter('c') && stroke.action == KeyAction::Down
        });
        if copies {
            state.clipboard = state.copy_result.clone();
        }
        state.ops.push(ClipboardOp::Keys(strokes.to_vec()));
        Ok(())
    }

    fn is_modifier_held(&self, _modifier: ShortcutModifier) -> bool {
        self.state.borrow().modifier_held
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryCall {
    Register(String),
    Unregister,
}

#[derive(Debug, Default)]
struct RegistryState {
    calls: Vec<RegistryCall>,
    current: Option<u32>,
    next_id: u32,
    refuse: bool,
}

/// Records every registry call; can be told to refuse registrations
#[derive(Debug, Clone, Default)]
pub struct FakeRegistry {
    state: Rc<RefCell<RegistryState>>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refuse_registrations(&self, refuse: bool) {
        self.state.borrow_mut().refuse = refuse;
    }

    pub fn calls(&self) -> Vec<RegistryCall> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    pub fn current_id(&self) -> Option<u32> {
        self.state.borrow().current
    }
}

impl HotkeyRegistry for FakeRegistry {
    fn register(&mut self, combination: &KeyCombination) -> Result<u32, BindingError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(RegistryCall::Register(combination.to_string()));
        if state.refuse {
            return Err(BindingError::RegistrationConflict {
                combination: combination.to_string(),
                reason: "already registered by another process".to_string(),
            });
        }
        state.next_id += 1;
        let id = state.next_id;
        state.current = Some(id);
        Ok(id)
    }

    fn unregister(&mut self) {
        let mut state = self.state.borrow_mut();
        state.calls.push(RegistryCall::Unregister);
        state.current = None;
    }

    fn is_registered(&self, id: u32) -> bool {
        self.state.borrow().current == Some(id)
    }
}
