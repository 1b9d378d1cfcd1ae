//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::events::BinderEvent;
use crate::hotkey::{KeyRelease, Modifiers, ObservedKey};
use crate::state::BindingStatus;

/// Requests from UI to daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Request current daemon status
    GetStatus,

    /// Start listening for a new key combination
    StartCapture,

    /// A key was released in the UI window while capturing
    KeyReleased {
        /// Key name, e.g. `K`, `F5`, `Control`
        key: String,
        #[serde(default)]
        modifiers: Modifiers,
    },

    /// Persist the current combination to the settings file
    SaveBinding,

    /// Ping to check connectivity
    Ping,

    /// Subscribe to binder event notifications
    Subscribe,
}

impl Request {
    /// The key release carried by a `KeyReleased` request
    pub fn key_release(&self) -> Option<KeyRelease> {
        match self {
            Request::KeyReleased { key, modifiers } => {
                Some(KeyRelease::new(ObservedKey::from_name(key), *modifiers))
            }
            _ => None,
        }
    }
}

/// Responses from daemon to UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current daemon status
    Status(DaemonStatus),

    /// Capture is now running
    CaptureStarted,

    /// Key release delivered to the running capture
    Accepted,

    /// Combination written to the settings file
    Saved { sequence: String },

    /// Pong response to ping
    Pong,

    /// Subscription confirmed
    Subscribed,

    /// Error response
    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Push notification from daemon to UI (for subscribed clients)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// Binder event occurred
    BinderEvent { event: BinderEvent },
}

/// Full daemon status snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Current binding in textual form
    pub binding: String,

    /// Whether the hotkey is registered with the OS
    pub active: bool,

    /// Whether a capture is waiting for a new combination
    pub capturing: bool,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl DaemonStatus {
    pub fn new(binding: BindingStatus, uptime_secs: u64) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            binding: binding.combination,
            active: binding.active,
            capturing: binding.capturing,
            uptime_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::Key;

    #[test]
    fn test_request_serialization() {
        let req = Request::KeyReleased {
            key: "K".to_string(),
            modifiers: Modifiers::CONTROL,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("key_released"));
        assert!(json.contains("\"control\":true"));
    }

    #[test]
    fn test_key_release_with_missing_modifiers() {
        let json = r#"{"type":"key_released","key":"k"}"#;
        let req: Request = serde_json::from_str(json).unwrap();
        assert_eq!(
            req.key_release(),
            Some(KeyRelease::new(
                ObservedKey::Base(Key::Char('K')),
                Modifiers::default()
            ))
        );
        assert_eq!(Request::Ping.key_release(), None);
    }

    #[test]
    fn test_response_serialization() {
        let status = BindingStatus {
            combination: "Ctrl+B".to_string(),
            active: true,
            capturing: false,
        };
        let resp = Response::Status(DaemonStatus::new(status, 5));
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"type\":\"status\""));
        assert!(json.contains("Ctrl+B"));
    }

    #[test]
    fn test_notification_serialization() {
        let note = Notification::BinderEvent {
            event: BinderEvent::CaptureStarted,
        };
        let json = serde_json::to_string(&note).unwrap();
        assert!(json.contains("binder_event"));

        let back: Notification = serde_json::from_str(&json).unwrap();
        assert_eq!(back, note);
    }
}
