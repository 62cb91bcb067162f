//! Chained selections where each level scopes the list below it.
//!
//! A level owns its child list and everything further down. Selecting a
//! parent first clears every deeper level, then resets the child list, and
//! only then dispatches the child fetch for the new parent.

use std::sync::Arc;

use shared::domain::{EntityId, Resource};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{api::ResourceApi, list::ListController, query_slot::Settlement};

/// A level that can be wiped when something above it changes.
pub trait Downstream: Send {
    fn clear(&mut self);
}

impl Downstream for () {
    fn clear(&mut self) {}
}

pub struct CascadeController<N = ()> {
    parent_selection: Option<EntityId>,
    child_list: ListController,
    next: N,
}

pub type CustomerCascade = CascadeController;
pub type NoteCascade = CascadeController<CascadeController>;

impl CascadeController {
    pub fn new(child_list: ListController) -> Self {
        Self::with_next(child_list, ())
    }
}

impl<N: Downstream> CascadeController<N> {
    pub fn with_next(mut child_list: ListController, next: N) -> Self {
        child_list.reset();
        child_list.bind_parent(None);
        Self {
            parent_selection: None,
            child_list,
            next,
        }
    }

    pub fn parent_selection(&self) -> Option<EntityId> {
        self.parent_selection
    }

    pub fn child_list(&self) -> &ListController {
        &self.child_list
    }

    /// Paging and search on the child list. Dispatches through the list's own
    /// slot, so it stays race-free under a fixed parent.
    pub fn child_list_mut(&mut self) -> &mut ListController {
        &mut self.child_list
    }

    pub fn next(&self) -> &N {
        &self.next
    }

    /// `None` clears the child list and leaves it idle.
    pub fn select_parent(&mut self, selection: Option<EntityId>) -> Option<JoinHandle<Settlement>> {
        debug!(resource = %self.child_list.resource(), ?selection, "cascade parent selected");
        self.parent_selection = selection;
        self.next.clear();
        self.child_list.reset();
        self.child_list.bind_parent(selection);
        if selection.is_none() {
            return None;
        }
        self.child_list.refresh()
    }
}

impl<N: Downstream> CascadeController<CascadeController<N>> {
    /// Selects a row of this level's child list as the parent of the next level.
    /// Only rows currently shown under a selected parent can be chosen; `None`
    /// always clears the next level.
    pub fn select_child(&mut self, selection: Option<EntityId>) -> Option<JoinHandle<Settlement>> {
        if let Some(id) = selection {
            if self.parent_selection.is_none() {
                warn!(child = %id, "no parent selected; ignoring child selection");
                return None;
            }
            let shown = self
                .child_list
                .view()
                .items
                .iter()
                .any(|record| record.id == id);
            if !shown {
                warn!(resource = %self.child_list.resource(), child = %id, "child is not in the current list");
                return None;
            }
        }
        self.next.select_parent(selection)
    }

    pub fn next_mut(&mut self) -> &mut CascadeController<N> {
        &mut self.next
    }
}

impl<N: Downstream> Downstream for CascadeController<N> {
    fn clear(&mut self) {
        self.parent_selection = None;
        self.next.clear();
        self.child_list.reset();
        self.child_list.bind_parent(None);
    }
}

/// Employee → customers.
pub fn customers_for_employee(api: Arc<dyn ResourceApi>, page_size: u32) -> CustomerCascade {
    CascadeController::new(ListController::related(
        api,
        Resource::Employees,
        Resource::Customers,
        page_size,
    ))
}

/// Employee → customers → notes.
pub fn notes_cascade(api: Arc<dyn ResourceApi>, page_size: u32) -> NoteCascade {
    let notes = CascadeController::new(ListController::related(
        Arc::clone(&api),
        Resource::Customers,
        Resource::Notes,
        page_size,
    ));
    CascadeController::with_next(
        ListController::related(api, Resource::Employees, Resource::Customers, page_size),
        notes,
    )
}

#[cfg(test)]
#[path = "tests/cascade_tests.rs"]
mod tests;
