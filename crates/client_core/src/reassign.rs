//! Reassign a departing employee's customers to a replacement, then delete
//! the employee.
//!
//! The one mutating call is only ever issued on the `Confirming → Submitting`
//! edge, which is taken atomically, so a second confirm while a submission is
//! in flight finds the workflow already in `Submitting` and does nothing.

use std::sync::Arc;

use shared::domain::{EntityId, PageRequest, Record, Resource};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    api::ResourceApi,
    error::FetchError,
    query_slot::{QuerySlot, SlotState, SlotStatus},
};

const DEPARTMENT_ATTRIBUTE: &str = "department";
const MAX_CANDIDATE_PAGES: u32 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Ready,
    Confirming,
    Submitting,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowFailure {
    /// Target or candidate pool could not be loaded; the workflow never became ready.
    Load(FetchError),
    /// The reassign-and-delete call failed. The target is not assumed deleted
    /// and the chosen replacement is kept.
    Submit(FetchError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowState {
    pub phase: Phase,
    pub chosen_replacement: Option<EntityId>,
    pub failure: Option<WorkflowFailure>,
}

impl WorkflowState {
    fn loading() -> Self {
        Self {
            phase: Phase::Loading,
            chosen_replacement: None,
            failure: None,
        }
    }

    fn failed_to_load(&self) -> bool {
        self.phase == Phase::Failed && matches!(self.failure, Some(WorkflowFailure::Load(_)))
    }

    fn failed_to_submit(&self) -> bool {
        self.phase == Phase::Failed && matches!(self.failure, Some(WorkflowFailure::Submit(_)))
    }

    /// Whether the user may pick a replacement or ask to confirm.
    fn is_selectable(&self) -> bool {
        self.phase == Phase::Ready || self.failed_to_submit()
    }
}

pub struct ReassignWorkflow {
    api: Arc<dyn ResourceApi>,
    target_id: EntityId,
    candidate_page_size: u32,
    target: QuerySlot<Record>,
    pool: QuerySlot<Vec<Record>>,
    state: Arc<watch::Sender<WorkflowState>>,
    department_filter: Option<String>,
}

impl ReassignWorkflow {
    pub fn new(api: Arc<dyn ResourceApi>, target_id: EntityId, candidate_page_size: u32) -> Self {
        let (state, _) = watch::channel(WorkflowState::loading());
        Self {
            api,
            target_id,
            candidate_page_size: candidate_page_size.max(1),
            target: QuerySlot::new(),
            pool: QuerySlot::new(),
            state: Arc::new(state),
            department_filter: None,
        }
    }

    pub fn target_id(&self) -> EntityId {
        self.target_id
    }

    pub fn snapshot(&self) -> WorkflowState {
        self.state.borrow().clone()
    }

    pub fn phase(&self) -> Phase {
        self.state.borrow().phase
    }

    pub fn chosen_replacement(&self) -> Option<EntityId> {
        self.state.borrow().chosen_replacement
    }

    pub fn failure(&self) -> Option<WorkflowFailure> {
        self.state.borrow().failure.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkflowState> {
        self.state.subscribe()
    }

    /// The employee being removed, once loaded.
    pub fn target(&self) -> Option<Record> {
        self.target.snapshot().accepted().cloned()
    }

    /// Every eligible replacement. Never contains the target.
    pub fn candidates(&self) -> Vec<Record> {
        self.pool.snapshot().accepted().cloned().unwrap_or_default()
    }

    /// Distinct departments among the candidates, in first-seen order.
    pub fn departments(&self) -> Vec<String> {
        let mut departments: Vec<String> = Vec::new();
        for candidate in self.candidates() {
            if let Some(department) = candidate.text(DEPARTMENT_ATTRIBUTE) {
                if !departments.iter().any(|known| known == department) {
                    departments.push(department.to_string());
                }
            }
        }
        departments
    }

    pub fn department_filter(&self) -> Option<&str> {
        self.department_filter.as_deref()
    }

    /// Narrows [`Self::visible_candidates`] locally. Never fetches.
    pub fn set_department_filter(&mut self, department: Option<String>) {
        self.department_filter = department.filter(|value| !value.is_empty());
    }

    pub fn visible_candidates(&self) -> Vec<Record> {
        let candidates = self.candidates();
        match self.department_filter.as_deref() {
            None => candidates,
            Some(department) => candidates
                .into_iter()
                .filter(|candidate| candidate.text(DEPARTMENT_ATTRIBUTE) == Some(department))
                .collect(),
        }
    }

    /// Fetches the target and the candidate pool side by side. The returned
    /// task resolves to the phase once both have settled.
    pub fn load(&self) -> Option<JoinHandle<Phase>> {
        if self.phase() != Phase::Loading {
            warn!(employee = %self.target_id, phase = ?self.phase(), "load outside loading phase");
            return None;
        }
        Some(self.dispatch_loads())
    }

    /// Starts over after a load-phase failure.
    pub fn retry_load(&self) -> Option<JoinHandle<Phase>> {
        let restarted = self.state.send_if_modified(|state| {
            if !state.failed_to_load() {
                return false;
            }
            *state = WorkflowState::loading();
            true
        });
        if !restarted {
            return None;
        }
        Some(self.dispatch_loads())
    }

    fn dispatch_loads(&self) -> JoinHandle<Phase> {
        let target_id = self.target_id;

        let api = Arc::clone(&self.api);
        let target_task = self.target.dispatch(async move {
            let record = api.fetch_one(Resource::Employees, target_id).await?;
            if record.id != target_id {
                return Err(FetchError::ShapeMismatch(format!(
                    "asked for employee {target_id}, got {}",
                    record.id
                )));
            }
            Ok(record)
        });

        let api = Arc::clone(&self.api);
        let page_size = self.candidate_page_size;
        let pool_task = self
            .pool
            .dispatch(async move { fetch_candidate_pool(api.as_ref(), target_id, page_size).await });

        let state = Arc::clone(&self.state);
        let target = self.target.clone();
        let pool = self.pool.clone();
        tokio::spawn(async move {
            let (target_joined, pool_joined) =
                futures::future::join(target_task, pool_task).await;
            let aborted = target_joined.err().or(pool_joined.err()).map(|err| {
                warn!(employee = %target_id, %err, "load task ended abnormally");
                FetchError::NetworkUnreachable(format!("load task ended abnormally: {err}"))
            });
            settle_load(&state, &target.snapshot(), &pool.snapshot(), aborted)
        })
    }

    pub fn choose_replacement(&self, replacement_id: EntityId) -> bool {
        if replacement_id == self.target_id {
            warn!(employee = %self.target_id, "target cannot replace itself");
            return false;
        }
        if !self
            .candidates()
            .iter()
            .any(|candidate| candidate.id == replacement_id)
        {
            warn!(replacement = %replacement_id, "not an eligible replacement");
            return false;
        }

        let mut accepted = false;
        self.state.send_if_modified(|state| {
            if !state.is_selectable() {
                return false;
            }
            accepted = true;
            let changed = state.chosen_replacement != Some(replacement_id);
            state.chosen_replacement = Some(replacement_id);
            changed
        });
        accepted
    }

    /// `Ready → Confirming`. Requires a chosen replacement.
    pub fn request_confirmation(&self) -> bool {
        let target_id = self.target_id;
        self.state.send_if_modified(|state| {
            let chosen = match state.chosen_replacement {
                Some(id) if id != target_id => id,
                _ => return false,
            };
            if !state.is_selectable() {
                return false;
            }
            debug!(employee = %target_id, replacement = %chosen, "awaiting confirmation");
            state.phase = Phase::Confirming;
            state.failure = None;
            true
        })
    }

    /// `Confirming → Ready`, no side effect.
    pub fn cancel_confirmation(&self) -> bool {
        self.state.send_if_modified(|state| {
            if state.phase != Phase::Confirming {
                return false;
            }
            state.phase = Phase::Ready;
            true
        })
    }

    /// `Confirming → Submitting`, then issues the reassign-and-delete call.
    /// Returns `None` without calling out when not confirming or nothing is chosen.
    pub fn confirm(&self) -> Option<JoinHandle<Phase>> {
        let target_id = self.target_id;
        let mut replacement = None;
        self.state.send_if_modified(|state| match (state.phase, state.chosen_replacement) {
            (Phase::Confirming, Some(id)) if id != target_id => {
                state.phase = Phase::Submitting;
                replacement = Some(id);
                true
            }
            _ => false,
        });
        let Some(replacement_id) = replacement else {
            warn!(employee = %target_id, phase = ?self.phase(), "confirm ignored");
            return None;
        };

        let api = Arc::clone(&self.api);
        let state = Arc::clone(&self.state);
        Some(tokio::spawn(async move {
            let outcome = api
                .submit_reassign_and_delete(target_id, replacement_id)
                .await;
            state.send_modify(|state| match outcome {
                Ok(()) => {
                    info!(employee = %target_id, replacement = %replacement_id, "customers reassigned and employee deleted");
                    state.phase = Phase::Succeeded;
                    state.failure = None;
                }
                Err(err) => {
                    warn!(employee = %target_id, replacement = %replacement_id, %err, "reassign and delete failed");
                    state.phase = Phase::Failed;
                    state.failure = Some(WorkflowFailure::Submit(err));
                }
            });
            state.borrow().phase
        }))
    }
}

/// Walks the whole employee collection. A response that is not a list of
/// employees yields no candidates rather than an error.
async fn fetch_candidate_pool(
    api: &dyn ResourceApi,
    target_id: EntityId,
    page_size: u32,
) -> Result<Vec<Record>, FetchError> {
    let mut candidates = Vec::new();
    let mut page = 0;
    loop {
        let batch = match api
            .fetch_page(Resource::Employees, &PageRequest::new(page, page_size, ""))
            .await
        {
            Ok(batch) => batch,
            Err(FetchError::ShapeMismatch(detail)) => {
                warn!(%detail, "candidate pool is not a collection; offering no replacements");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err),
        };

        let exhausted = batch.items.is_empty()
            || page + 1 >= batch.total_pages
            || page + 1 >= MAX_CANDIDATE_PAGES;
        candidates.extend(batch.items.into_iter().filter(|record| record.id != target_id));
        if exhausted {
            return Ok(candidates);
        }
        page += 1;
    }
}

fn settle_load(
    state: &watch::Sender<WorkflowState>,
    target: &SlotState<Record>,
    pool: &SlotState<Vec<Record>>,
    aborted: Option<FetchError>,
) -> Phase {
    state.send_if_modified(|state| {
        if state.phase != Phase::Loading {
            return false;
        }
        let failed = match (target.status(), pool.status()) {
            (SlotStatus::Failed, _) => target.error().cloned(),
            (_, SlotStatus::Failed) => pool.error().cloned(),
            _ => aborted,
        };
        if let Some(err) = failed {
            state.phase = Phase::Failed;
            state.failure = Some(WorkflowFailure::Load(err));
            return true;
        }
        if target.status() == SlotStatus::Succeeded && pool.status() == SlotStatus::Succeeded {
            state.phase = Phase::Ready;
            return true;
        }
        false
    });
    state.borrow().phase
}

#[cfg(test)]
#[path = "tests/reassign_tests.rs"]
mod tests;
