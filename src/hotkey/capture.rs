//! Key release subscription used while capturing a new combination
//!
//! The presentation layer publishes key releases into the hub. They are
//! only delivered while a `KeySubscription` exists; dropping the
//! subscription detaches it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::debug;

use super::keys::KeyRelease;

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    tx: Option<mpsc::UnboundedSender<KeyRelease>>,
}

/// Shared entry point for key release events
#[derive(Debug, Clone, Default)]
pub struct CaptureHub {
    slot: Arc<Mutex<Slot>>,
}

impl CaptureHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a subscriber, replacing any previous one
    pub fn subscribe(&self) -> KeySubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut slot = self.lock();
        if slot.tx.replace(tx).is_some() {
            debug!("replaced an existing key subscription");
        }
        slot.generation += 1;

        KeySubscription {
            rx,
            generation: slot.generation,
            hub: self.clone(),
        }
    }

    /// Deliver a release to the current subscriber
    ///
    /// Returns `false` when nobody is subscribed.
    pub fn publish(&self, release: KeyRelease) -> bool {
        match self.lock().tx.as_ref() {
            Some(tx) => tx.send(release).is_ok(),
            None => false,
        }
    }

    #[cfg(test)]
    pub fn is_subscribed(&self) -> bool {
        self.lock().tx.is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Receiving end of a capture subscription
#[derive(Debug)]
pub struct KeySubscription {
    rx: mpsc::UnboundedReceiver<KeyRelease>,
    generation: u64,
    hub: CaptureHub,
}

impl KeySubscription {
    /// Wait for the next published release
    pub async fn recv(&mut self) -> Option<KeyRelease> {
        self.rx.recv().await
    }

    /// Take a release that is already queued, without waiting
    #[cfg(test)]
    pub fn try_recv(&mut self) -> Option<KeyRelease> {
        self.rx.try_recv().ok()
    }
}

impl Drop for KeySubscription {
    fn drop(&mut self) {
        let mut slot = self.hub.lock();
        // A newer subscription may own the slot already
        if slot.generation == self.generation {
            slot.tx = None;
        }
    }
}
