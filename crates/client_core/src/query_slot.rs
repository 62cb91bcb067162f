//! Versioned holder for one logical query.
//!
//! Every dispatch takes a fresh version. A completing fetch may only write its
//! outcome while its version is still the slot's current one; anything older is
//! dropped on the floor. That single comparison is what keeps a slow response
//! for an earlier request from overwriting the state of a newer one.

use std::{future::Future, sync::Arc};

use tokio::{sync::watch, task::JoinHandle};
use tracing::debug;

use crate::error::FetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    Idle,
    Pending,
    Succeeded,
    Failed,
}

/// What happened to a completed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Applied,
    /// A newer dispatch or a reset happened while this one was in flight.
    Discarded,
}

#[derive(Debug, Clone)]
pub struct SlotState<T> {
    version: u64,
    status: SlotStatus,
    result: Option<T>,
    error: Option<FetchError>,
}

impl<T> SlotState<T> {
    fn idle() -> Self {
        Self {
            version: 0,
            status: SlotStatus::Idle,
            result: None,
            error: None,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn status(&self) -> SlotStatus {
        self.status
    }

    pub fn result(&self) -> Option<&T> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&FetchError> {
        self.error.as_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.status == SlotStatus::Pending
    }

    /// The payload, but only while it is the accepted outcome of the latest request.
    pub fn accepted(&self) -> Option<&T> {
        match self.status {
            SlotStatus::Succeeded => self.result.as_ref(),
            _ => None,
        }
    }
}

pub struct QuerySlot<T> {
    state: Arc<watch::Sender<SlotState<T>>>,
}

impl<T> Clone for QuerySlot<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> Default for QuerySlot<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> QuerySlot<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        let (state, _) = watch::channel(SlotState::idle());
        Self {
            state: Arc::new(state),
        }
    }

    pub fn snapshot(&self) -> SlotState<T> {
        self.state.borrow().clone()
    }

    pub fn status(&self) -> SlotStatus {
        self.state.borrow().status
    }

    pub fn version(&self) -> u64 {
        self.state.borrow().version
    }

    /// Receiver that observes every state transition of this slot.
    pub fn subscribe(&self) -> watch::Receiver<SlotState<T>> {
        self.state.subscribe()
    }

    /// Marks the slot pending under a new version and returns that version.
    pub fn begin(&self) -> u64 {
        let mut version = 0;
        self.state.send_modify(|state| {
            state.version += 1;
            state.status = SlotStatus::Pending;
            version = state.version;
        });
        debug!(version, "query slot dispatch");
        version
    }

    /// Applies `outcome` if `version` is still current.
    pub fn settle(&self, version: u64, outcome: Result<T, FetchError>) -> Settlement {
        settle(&self.state, version, outcome)
    }

    /// Runs `fetch` on the runtime and settles its outcome against the version
    /// taken at dispatch time. Must be called from within a tokio runtime.
    pub fn dispatch<F>(&self, fetch: F) -> JoinHandle<Settlement>
    where
        F: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let version = self.begin();
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let outcome = fetch.await;
            settle(&state, version, outcome)
        })
    }

    /// Invalidates whatever is in flight and returns to idle with no data.
    pub fn reset(&self) {
        self.state.send_modify(|state| {
            state.version += 1;
            state.status = SlotStatus::Idle;
            state.result = None;
            state.error = None;
        });
    }
}

fn settle<T>(
    state: &watch::Sender<SlotState<T>>,
    version: u64,
    outcome: Result<T, FetchError>,
) -> Settlement {
    let mut settlement = Settlement::Discarded;
    state.send_if_modified(|state| {
        if state.version != version {
            return false;
        }
        match outcome {
            Ok(result) => {
                state.status = SlotStatus::Succeeded;
                state.result = Some(result);
                state.error = None;
            }
            Err(error) => {
                state.status = SlotStatus::Failed;
                state.result = None;
                state.error = Some(error);
            }
        }
        settlement = Settlement::Applied;
        true
    });
    if settlement == Settlement::Discarded {
        debug!(version, "discarding stale response");
    }
    settlement
}

#[cfg(test)]
#[path = "tests/query_slot_tests.rs"]
mod tests;
