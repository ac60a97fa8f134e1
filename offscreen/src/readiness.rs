//! One-way readiness latch for the embedded frame.
//!
//! Two signals race to open it: the frame element's native load event and the
//! explicit `FRAME_READY` message the frame posts once its own app mounted.
//! Whichever lands first wins; the other is acknowledged and changes nothing.
//! Once open the latch stays open for the bridge's lifetime.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// Which signal opened the latch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadySignal {
    /// Native "finished loading" of the frame element.
    Loaded,
    /// Explicit ready message from the frame.
    ReadyMessage,
}

/// Result of waiting for the frame with a grace period.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadinessWait {
    Ready,
    /// The grace period ran out first; callers go ahead best-effort.
    GraceElapsed,
}

/// Shared wait-handle. Clones observe the same latch.
#[derive(Clone)]
pub struct FrameReadiness {
    tx: Arc<watch::Sender<Option<ReadySignal>>>,
}

impl FrameReadiness {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Open the latch. Returns `true` only for the signal that opened it.
    pub fn mark_ready(&self, signal: ReadySignal) -> bool {
        self.tx.send_if_modified(|state| {
            if state.is_some() {
                return false;
            }
            *state = Some(signal);
            true
        })
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// The signal that won the race, once there is one.
    #[must_use]
    pub fn resolved_by(&self) -> Option<ReadySignal> {
        *self.tx.borrow()
    }

    /// Wait until the latch opens.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so the channel cannot close here.
        let _ = rx.wait_for(Option::is_some).await;
    }

    /// Wait for the latch, but no longer than `grace`.
    pub async fn wait_with_grace(&self, grace: Duration) -> ReadinessWait {
        if self.is_ready() {
            return ReadinessWait::Ready;
        }
        match tokio::time::timeout(grace, self.wait()).await {
            Ok(()) => ReadinessWait::Ready,
            Err(_) => ReadinessWait::GraceElapsed,
        }
    }
}

impl Default for FrameReadiness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "readiness_test.rs"]
mod tests;
