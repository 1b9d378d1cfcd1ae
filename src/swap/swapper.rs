//! Clipboard swap sequence
//!
//! Copies the active selection, briefly restores the previous clipboard
//! text while a paste is injected, and leaves the captured selection as
//! the final clipboard contents. Runs synchronously; the two settle
//! delays block the caller on purpose so the target application can
//! react to the synthetic input.

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::backend::{SwapBackend, SwapError};
use super::chord::chord;

/// Tunables for the swap sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapOptions {
    /// Wait after each synthetic chord
    pub delay: Duration,
    /// Write the original text back when the copy produced nothing
    pub restore_on_empty_capture: bool,
}

impl Default for SwapOptions {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(20),
            restore_on_empty_capture: true,
        }
    }
}

/// The step of the sequence that was running when it aborted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapStep {
    ReadOriginal,
    SendCopy,
    ReadCaptured,
    RestoreOriginal,
    SendPaste,
    WriteCaptured,
}

impl fmt::Display for SwapStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SwapStep::ReadOriginal => "read_original",
            SwapStep::SendCopy => "send_copy",
            SwapStep::ReadCaptured => "read_captured",
            SwapStep::RestoreOriginal => "restore_original",
            SwapStep::SendPaste => "send_paste",
            SwapStep::WriteCaptured => "write_captured",
        };
        f.write_str(name)
    }
}

/// How a call to `swap()` ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapOutcome {
    /// All steps ran; the clipboard holds the captured selection
    Completed,
    /// Nothing on the clipboard to begin with; no side effects
    EmptyClipboard,
    /// The synthetic copy left no text behind
    NothingCaptured {
        /// Whether the original text was written back
        restored: bool,
    },
    /// A clipboard or input call failed; later steps were skipped
    Aborted { step: SwapStep, error: SwapError },
}

impl fmt::Display for SwapOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwapOutcome::Completed => write!(f, "completed"),
            SwapOutcome::EmptyClipboard => write!(f, "empty_clipboard"),
            SwapOutcome::NothingCaptured { restored } => {
                write!(f, "nothing_captured (restored: {})", restored)
            }
            SwapOutcome::Aborted { step, error } => write!(f, "aborted at {}: {}", step, error),
        }
    }
}

/// Runs the swap sequence against a `SwapBackend`
pub struct ClipboardSwapper<B> {
    backend: B,
    options: SwapOptions,
}

impl<B: SwapBackend> ClipboardSwapper<B> {
    pub fn new(backend: B, options: SwapOptions) -> Self {
        Self { backend, options }
    }

    /// Run the whole sequence once
    ///
    /// Failures are logged and reported through the outcome.
    pub fn swap(&mut self) -> SwapOutcome {
        let started = Instant::now();

        let outcome = match self.run_sequence() {
            Ok(outcome) => outcome,
            Err((step, error)) => {
                warn!(%step, %error, "clipboard swap aborted");
                SwapOutcome::Aborted { step, error }
            }
        };

        info!(
            %outcome,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "clipboard swap finished"
        );
        outcome
    }

    fn run_sequence(&mut self) -> Result<SwapOutcome, (SwapStep, SwapError)> {
        let Some(original) = self.read_text().map_err(at(SwapStep::ReadOriginal))? else {
            debug!("clipboard empty, nothing to swap");
            return Ok(SwapOutcome::EmptyClipboard);
        };

        self.send_shortcut('c').map_err(at(SwapStep::SendCopy))?;
        self.settle();

        let Some(captured) = self.read_text().map_err(at(SwapStep::ReadCaptured))? else {
            return self.nothing_captured(&original);
        };
        debug!(
            original_len = original.len(),
            captured_len = captured.len(),
            "selection captured"
        );

        self.backend
            .write_text(&original)
            .map_err(at(SwapStep::RestoreOriginal))?;

        self.send_shortcut('v').map_err(at(SwapStep::SendPaste))?;
        self.settle();

        self.backend
            .write_text(&captured)
            .map_err(at(SwapStep::WriteCaptured))?;

        Ok(SwapOutcome::Completed)
    }

    fn nothing_captured(&mut self, original: &str) -> Result<SwapOutcome, (SwapStep, SwapError)> {
        if !self.options.restore_on_empty_capture {
            warn!("copy produced no text, leaving clipboard as the copy left it");
            return Ok(SwapOutcome::NothingCaptured { restored: false });
        }

        debug!("copy produced no text, restoring original clipboard");
        self.backend
            .write_text(original)
            .map_err(at(SwapStep::RestoreOriginal))?;
        Ok(SwapOutcome::NothingCaptured { restored: true })
    }

    fn read_text(&mut self) -> Result<Option<String>, SwapError> {
        Ok(self.backend.read_text()?.filter(|text| !text.is_empty()))
    }

    fn send_shortcut(&mut self, letter: char) -> Result<(), SwapError> {
        let modifier = self.backend.shortcut_modifier();
        let held = self.backend.is_modifier_held(modifier);
        if held {
            debug!(?modifier, "modifier already held, sending letter only");
        }
        self.backend.send_keys(&chord(modifier, letter, held))
    }

    fn settle(&self) {
        if !self.options.delay.is_zero() {
            thread::sleep(self.options.delay);
        }
    }
}

fn at(step: SwapStep) -> impl FnOnce(SwapError) -> (SwapStep, SwapError) {
    move |error| (step, error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swap::chord::{KeyStroke, StrokeKey};
    use crate::testing::{ClipboardOp, FakeBackend};

    fn swapper(backend: FakeBackend) -> ClipboardSwapper<FakeBackend> {
        ClipboardSwapper::new(
            backend,
            SwapOptions {
                delay: Duration::ZERO,
                ..SwapOptions::default()
            },
        )
    }

    #[test]
    fn test_empty_clipboard_has_no_side_effects() {
        let backend = FakeBackend::new(None, Some("bar"));
        let mut swapper = swapper(backend.clone());

        assert_eq!(swapper.swap(), SwapOutcome::EmptyClipboard);
        assert!(backend.writes().is_empty());
        assert!(backend.strokes().is_empty());
    }

    #[test]
    fn test_empty_string_counts_as_empty() {
        let backend = FakeBackend::new(Some(""), Some("bar"));
        let mut swapper = swapper(backend.clone());

        assert_eq!(swapper.swap(), SwapOutcome::EmptyClipboard);
        assert!(backend.strokes().is_empty());
    }

    #[test]
    fn test_clipboard_trace() {
        let backend = FakeBackend::new(Some("foo"), Some("bar"));
        let mut swapper = swapper(backend.clone());

        assert_eq!(swapper.swap(), SwapOutcome::Completed);
        assert_eq!(backend.clipboard(), Some("bar".to_string()));
        assert_eq!(backend.observed(), vec!["foo", "bar", "foo", "bar"]);
    }

    #[test]
    fn test_operation_order() {
        let backend = FakeBackend::new(Some("foo"), Some("bar"));
        let mut swapper = swapper(backend.clone());
        swapper.swap();

        let kinds: Vec<&str> = backend
            .ops()
            .iter()
            .map(|op| match op {
                ClipboardOp::Read(_) => "read",
                ClipboardOp::Write(_) => "write",
                ClipboardOp::Keys(_) => "keys",
            })
            .collect();
        assert_eq!(kinds, vec!["read", "keys", "read", "write", "keys", "write"]);

        let letters: Vec<char> = backend
            .strokes()
            .iter()
            .filter_map(|stroke| match stroke.key {
                StrokeKey::Letter(c) => Some(c),
                StrokeKey::Modifier(_) => None,
            })
            .collect();
        assert_eq!(letters, vec!['c', 'c', 'v', 'v']);
    }

    #[test]
    fn test_held_control_sends_letters_only() {
        let backend = FakeBackend::new(Some("foo"), Some("bar")).with_modifier_held();
        let mut swapper = swapper(backend.clone());
        swapper.swap();

        assert!(backend
            .strokes()
            .iter()
            .all(|stroke| matches!(stroke.key, StrokeKey::Letter(_))));
        assert_eq!(backend.strokes().len(), 4);
    }

    #[test]
    fn test_released_control_is_pressed_and_released() {
        let backend = FakeBackend::new(Some("foo"), Some("bar"));
        let mut swapper = swapper(backend.clone());
        swapper.swap();

        let strokes = backend.strokes();
        assert_eq!(strokes.len(), 8);
        assert!(matches!(strokes[0], KeyStroke { key: StrokeKey::Modifier(_), .. }));
        assert!(matches!(strokes[3], KeyStroke { key: StrokeKey::Modifier(_), .. }));
    }

    #[test]
    fn test_nothing_captured_restores_original() {
        let backend = FakeBackend::new(Some("foo"), None);
        let mut swapper = swapper(backend.clone());

        assert_eq!(
            swapper.swap(),
            SwapOutcome::NothingCaptured { restored: true }
        );
        assert_eq!(backend.clipboard(), Some("foo".to_string()));
        assert_eq!(backend.writes(), vec!["foo".to_string()]);
    }

    #[test]
    fn test_nothing_captured_without_restore() {
        let backend = FakeBackend::new(Some("foo"), None);
        let mut swapper = ClipboardSwapper::new(
            backend.clone(),
            SwapOptions {
                delay: Duration::ZERO,
                restore_on_empty_capture: false,
            },
        );

        assert_eq!(
            swapper.swap(),
            SwapOutcome::NothingCaptured { restored: false }
        );
        assert!(backend.writes().is_empty());
        assert_eq!(backend.clipboard(), None);
    }

    #[test]
    fn test_write_failure_aborts_remaining_steps() {
        let backend = FakeBackend::new(Some("foo"), Some("bar")).with_failing_writes();
        let mut swapper = swapper(backend.clone());

        let outcome = swapper.swap();
        assert!(matches!(
            outcome,
            SwapOutcome::Aborted {
                step: SwapStep::RestoreOriginal,
                error: SwapError::ClipboardUnavailable { .. }
            }
        ));
        // No paste chord after the failed restore
        assert_eq!(backend.strokes().len(), 4);
        assert_eq!(backend.clipboard(), Some("bar".to_string()));
    }

    #[test]
    fn test_read_failure_aborts_before_input() {
        let backend = FakeBackend::new(Some("foo"), Some("bar")).with_failing_reads();
        let mut swapper = swapper(backend.clone());

        let outcome = swapper.swap();
        assert!(matches!(
            outcome,
            SwapOutcome::Aborted {
                step: SwapStep::ReadOriginal,
                ..
            }
        ));
        assert!(backend.strokes().is_empty());
    }
}
