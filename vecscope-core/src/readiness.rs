//! Tri-state model readiness signal
//!
//! Holders can query the current state or wait for the next transition. A
//! subscriber that arrives after the model became ready still sees `Ready`.

use crate::error::{Result, VecscopeError};
use std::sync::Arc;
use tokio::sync::watch;

/// Whether the worker's model can serve requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    NotReady,
    Ready,
    Failed(String),
}

impl Readiness {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Shared readiness state; clones observe the same signal
#[derive(Debug, Clone)]
pub struct ReadinessSignal {
    tx: Arc<watch::Sender<Readiness>>,
}

impl Default for ReadinessSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Readiness::NotReady);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> Readiness {
        self.tx.borrow().clone()
    }

    /// Receiver for transitions; `borrow()` on it yields the current state.
    pub fn subscribe(&self) -> watch::Receiver<Readiness> {
        self.tx.subscribe()
    }

    /// `NotReady -> Ready`. Returns whether subscribers were notified.
    pub fn mark_ready(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if *state == Readiness::NotReady {
                *state = Readiness::Ready;
                true
            } else {
                false
            }
        })
    }

    /// Move to `Failed`. Only the first failure is broadcast; later ones are
    /// ignored and return `false`.
    pub fn mark_failed(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        self.tx.send_if_modified(move |state| {
            if state.is_failed() {
                false
            } else {
                *state = Readiness::Failed(reason);
                true
            }
        })
    }

    /// Wait until the model is ready, or fail with the broadcast error.
    ///
    /// Resolves immediately if the state has already settled.
    pub async fn wait_ready(&self) -> Result<()> {
        let mut rx = self.tx.subscribe();
        let settled = rx
            .wait_for(|state| !matches!(state, Readiness::NotReady))
            .await
            .map_err(|_| VecscopeError::transport("readiness signal dropped"))?
            .clone();

        match settled {
            Readiness::Ready => Ok(()),
            Readiness::Failed(reason) => Err(VecscopeError::model(reason)),
            Readiness::NotReady => Err(VecscopeError::state("model still loading")),
        }
    }
}
