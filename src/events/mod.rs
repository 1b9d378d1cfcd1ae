//! Events module for binder transitions and swap results
//!
//! Broadcast by the binder and forwarded to subscribed IPC clients.

use serde::{Deserialize, Serialize};

/// Events emitted by the hotkey binder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BinderEvent {
    /// Waiting for the next key combination
    CaptureStarted,

    /// No qualifying combination arrived before the timeout
    CaptureTimedOut {
        /// Combination that is being re-applied
        combination: String,
    },

    /// A combination was (re)registered with the OS
    BindingApplied {
        combination: String,
        /// False when the OS refused the registration
        active: bool,
    },

    /// A combination was refused before reaching the OS
    BindingRejected { combination: String, reason: String },

    /// The hotkey fired and the swap sequence ran
    SwapFinished { outcome: String },
}

impl std::fmt::Display for BinderEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinderEvent::CaptureStarted => write!(f, "CAPTURE_STARTED"),
            BinderEvent::CaptureTimedOut { combination } => {
                write!(f, "CAPTURE_TIMED_OUT ({})", combination)
            }
            BinderEvent::BindingApplied {
                combination,
                active,
            } => write!(f, "BINDING_APPLIED ({}, active: {})", combination, active),
            BinderEvent::BindingRejected {
                combination,
                reason,
            } => write!(f, "BINDING_REJECTED ({}: {})", combination, reason),
            BinderEvent::SwapFinished { outcome } => write!(f, "SWAP_FINISHED ({})", outcome),
        }
    }
}
