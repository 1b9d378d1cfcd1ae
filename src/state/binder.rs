//! Hotkey binder state machine
//!
//! Owns the bound key combination and its OS registration, runs the
//! one-shot capture flow used to rebind it, and dispatches hotkey presses
//! to the clipboard swapper. Everything here runs on a single task, so
//! capture, timeout and trigger handling never race on the state.

use std::future::pending;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time;
use tracing::{debug, info, warn};

use crate::events::BinderEvent;
use crate::hotkey::{
    BindingError, CaptureHub, HotkeyEvent, HotkeyRegistry, KeyCombination, KeyRelease,
    KeySubscription,
};
use crate::swap::{ClipboardSwapper, SwapBackend, SwapOutcome};

/// The two states of the binder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BindingState {
    /// Hotkey armed, presses trigger the swap
    #[default]
    Idle,
    /// Waiting for the user to press the new combination
    CapturingNextCombination,
}

impl std::fmt::Display for BindingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BindingState::Idle => write!(f, "Idle"),
            BindingState::CapturingNextCombination => write!(f, "CapturingNextCombination"),
        }
    }
}

/// Snapshot reported to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingStatus {
    /// Textual form of the current combination
    pub combination: String,
    /// Whether the OS accepted the registration
    pub active: bool,
    /// Whether a capture is in progress
    pub capturing: bool,
}

/// Requests handled on the binder task
#[derive(Debug)]
pub enum BinderCommand {
    /// Begin listening for a new combination; replies `false` if already capturing
    StartCapture { reply: oneshot::Sender<bool> },
    /// Report the current binding
    Status { reply: oneshot::Sender<BindingStatus> },
}

/// Entry/exit resources of `CapturingNextCombination`
struct CaptureSession {
    subscription: KeySubscription,
    deadline: time::Instant,
    started_at: Instant,
}

/// Owns the global hotkey and the capture state machine
pub struct HotkeyBinder<R, B> {
    current: KeyCombination,
    active: bool,
    capture: Option<CaptureSession>,
    capture_timeout: Duration,
    registry: R,
    swapper: ClipboardSwapper<B>,
    hub: CaptureHub,
    event_tx: broadcast::Sender<BinderEvent>,
    /// Presses delivered before this instant overlapped a running swap
    last_swap_finished: Option<Instant>,
}

impl<R: HotkeyRegistry, B: SwapBackend> HotkeyBinder<R, B> {
    /// Create a binder for `initial`; nothing is registered until `apply_binding`
    pub fn new(
        initial: KeyCombination,
        registry: R,
        swapper: ClipboardSwapper<B>,
        hub: CaptureHub,
        event_tx: broadcast::Sender<BinderEvent>,
        capture_timeout: Duration,
    ) -> Self {
        Self {
            current: initial,
            active: false,
            capture: None,
            capture_timeout,
            registry,
            swapper,
            hub,
            event_tx,
            last_swap_finished: None,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> BindingState {
        if self.capture.is_some() {
            BindingState::CapturingNextCombination
        } else {
            BindingState::Idle
        }
    }

    #[cfg(test)]
    pub fn current(&self) -> KeyCombination {
        self.current
    }

    #[cfg(test)]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[cfg(test)]
    pub fn hub(&self) -> &CaptureHub {
        &self.hub
    }

    pub fn status(&self) -> BindingStatus {
        BindingStatus {
            combination: self.current.to_string(),
            active: self.active,
            capturing: self.capture.is_some(),
        }
    }

    /// When the pending capture gives up, if one is pending
    pub fn capture_deadline(&self) -> Option<time::Instant> {
        self.capture.as_ref().map(|session| session.deadline)
    }

    /// Enter `CapturingNextCombination`
    ///
    /// Returns `false` without touching the pending timeout when a
    /// capture is already running.
    pub fn start_capture(&mut self) -> bool {
        if self.capture.is_some() {
            debug!("capture already in progress");
            return false;
        }

        self.capture = Some(CaptureSession {
            subscription: self.hub.subscribe(),
            deadline: time::Instant::now() + self.capture_timeout,
            started_at: Instant::now(),
        });

        info!(
            from = %BindingState::Idle,
            to = %BindingState::CapturingNextCombination,
            timeout_ms = self.capture_timeout.as_millis() as u64,
            "state transition"
        );
        self.emit(BinderEvent::CaptureStarted);
        true
    }

    /// Feed a key release observed while capturing
    ///
    /// Returns `true` when the release completed the capture.
    pub fn observe_key_release(&mut self, release: KeyRelease) -> bool {
        if self.capture.is_none() {
            debug!(?release, "key release outside capture ignored");
            return false;
        }

        let Some(combination) = release.combination() else {
            debug!(?release, "key release does not form a combination");
            return false;
        };

        self.end_capture("captured");
        info!(%combination, "new combination captured");
        if let Err(e) = self.apply_binding(combination) {
            warn!(%e, "captured combination not active");
        }
        true
    }

    /// The capture deadline elapsed
    ///
    /// Re-applies the previous combination if a capture was pending;
    /// otherwise does nothing. Returns whether a capture was ended.
    pub fn on_capture_timeout(&mut self) -> bool {
        if self.capture.is_none() {
            debug!("capture timeout after capture ended, ignoring");
            return false;
        }

        self.end_capture("timeout");
        let combination = self.current;
        info!(%combination, "capture timed out, keeping previous combination");
        self.emit(BinderEvent::CaptureTimedOut {
            combination: combination.to_string(),
        });
        if let Err(e) = self.apply_binding(combination) {
            warn!(%e, "previous combination not active");
        }
        true
    }

    /// Replace the OS registration with `combination`
    ///
    /// Invalid combinations are rejected before any registry call and
    /// leave the prior registration in place. A refused registration
    /// leaves the binding inactive.
    pub fn apply_binding(&mut self, combination: KeyCombination) -> Result<(), BindingError> {
        if let Err(e) = combination.validate() {
            warn!(%combination, %e, "rejecting key combination");
            self.emit(BinderEvent::BindingRejected {
                combination: combination.to_string(),
                reason: e.to_string(),
            });
            return Err(e);
        }

        self.registry.unregister();
        self.current = combination;

        let result = self.registry.register(&combination);
        self.active = result.is_ok();
        match &result {
            Ok(id) => info!(%combination, id, "hotkey registered"),
            Err(e) => warn!(%combination, %e, "hotkey registration failed, binding not active"),
        }

        self.emit(BinderEvent::BindingApplied {
            combination: combination.to_string(),
            active: self.active,
        });
        result.map(|_| ())
    }

    /// Route a press reported by the OS
    pub fn on_hotkey_event(&mut self, event: HotkeyEvent) -> Option<SwapOutcome> {
        let HotkeyEvent::Pressed { id, at } = event;

        if !self.registry.is_registered(id) {
            debug!(id, "press for unknown hotkey id ignored");
            return None;
        }
        if self.last_swap_finished.map_or(false, |finished| at < finished) {
            debug!(id, "press overlapped a running swap, ignoring");
            return None;
        }

        self.on_hotkey_triggered()
    }

    /// The bound combination was pressed
    ///
    /// Ignored while capturing so the old binding cannot fire mid-rebind.
    pub fn on_hotkey_triggered(&mut self) -> Option<SwapOutcome> {
        if self.capture.is_some() {
            debug!("hotkey pressed while capturing, ignoring");
            return None;
        }

        let outcome = self.swapper.swap();
        self.last_swap_finished = Some(Instant::now());
        self.emit(BinderEvent::SwapFinished {
            outcome: outcome.to_string(),
        });
        Some(outcome)
    }

    /// Process commands, hotkey presses, key releases and the capture
    /// deadline until the command channel closes
    pub async fn run(
        &mut self,
        mut commands: mpsc::Receiver<BinderCommand>,
        mut hotkeys: mpsc::UnboundedReceiver<HotkeyEvent>,
    ) {
        info!(combination = %self.current, "binder started in Idle state");

        loop {
            let deadline = self.capture_deadline();
            let expiry = time::sleep_until(deadline.unwrap_or_else(time::Instant::now));

            tokio::select! {
                biased;

                release = next_release(&mut self.capture) => {
                    self.observe_key_release(release);
                }

                _ = expiry, if deadline.is_some() => {
                    self.on_capture_timeout();
                }

                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },

                Some(event) = hotkeys.recv() => {
                    self.on_hotkey_event(event);
                }
            }
        }

        info!("binder stopped");
    }

    /// Leave any capture and release the OS hotkey
    pub fn shutdown(&mut self) {
        if self.capture.is_some() {
            self.end_capture("shutdown");
        }
        self.registry.unregister();
        self.active = false;
        info!(combination = %self.current, "hotkey released");
    }

    fn handle_command(&mut self, command: BinderCommand) {
        match command {
            BinderCommand::StartCapture { reply } => {
                let started = self.start_capture();
                let _ = reply.send(started);
            }
            BinderCommand::Status { reply } => {
                let _ = reply.send(self.status());
            }
        }
    }

    /// Exit `CapturingNextCombination`, dropping the key subscription
    /// and the pending deadline together
    fn end_capture(&mut self, reason: &'static str) {
        if let Some(session) = self.capture.take() {
            info!(
                from = %BindingState::CapturingNextCombination,
                to = %BindingState::Idle,
                reason,
                duration_ms = session.started_at.elapsed().as_millis() as u64,
                "state transition"
            );
        }
    }

    fn emit(&self, event: BinderEvent) {
        debug!(%event, "emitting binder event");
        let _ = self.event_tx.send(event);
    }
}

/// Next release from the active capture; pending forever when idle
async fn next_release(capture: &mut Option<CaptureSession>) -> KeyRelease {
    match capture {
        Some(session) => match session.subscription.recv().await {
            Some(release) => release,
            None => pending().await,
        },
        None => pending().await,
    }
}
