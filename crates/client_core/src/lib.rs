//! Client-side orchestration for the customer/employee/note backend.
//!
//! Every list and lookup runs through a [`QuerySlot`], which only ever accepts
//! the response to its most recent request. Controllers built on top own
//! their slots exclusively and talk to the backend through [`ResourceApi`].

pub mod api;
pub mod cascade;
pub mod config;
pub mod error;
pub mod form;
pub mod list;
pub mod query_slot;
pub mod reassign;

pub use api::{HttpResourceApi, ResourceApi};
pub use cascade::{
    customers_for_employee, notes_cascade, CascadeController, CustomerCascade, Downstream,
    NoteCascade,
};
pub use config::{load_settings, ClientSettings};
pub use error::{ConfigError, FetchError};
pub use form::{FormController, FormErrors, FormStatus, FormTarget};
pub use list::{ListController, ListSource, ListView};
pub use query_slot::{QuerySlot, Settlement, SlotState, SlotStatus};
pub use reassign::{Phase, ReassignWorkflow, WorkflowFailure, WorkflowState};

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
