//! Create and edit forms for employees and customers.

use std::{collections::BTreeMap, sync::Arc};

use serde::Serialize;
use shared::domain::{EntityId, Record, Resource};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{info, warn};

use crate::{
    api::ResourceApi,
    error::FetchError,
    query_slot::{QuerySlot, Settlement},
};

/// Server-side rejection of a form, either pinned to fields or as one banner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormErrors {
    Fields(BTreeMap<String, String>),
    Banner(String),
}

impl FormErrors {
    pub fn from_fetch_error(err: &FetchError) -> Self {
        let violations = err.violations();
        if violations.is_empty() {
            return FormErrors::Banner(err.user_message());
        }
        FormErrors::Fields(
            violations
                .iter()
                .map(|violation| (violation.field.clone(), violation.error_message.clone()))
                .collect(),
        )
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        match self {
            FormErrors::Fields(fields) => fields.get(name).map(String::as_str),
            FormErrors::Banner(_) => None,
        }
    }

    pub fn banner(&self) -> Option<&str> {
        match self {
            FormErrors::Banner(message) => Some(message),
            FormErrors::Fields(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormTarget {
    Create {
        resource: Resource,
        owner: Option<EntityId>,
    },
    Update {
        resource: Resource,
        id: EntityId,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormStatus {
    Editing,
    Submitting,
    Saved(Record),
    Rejected(FormErrors),
}

pub struct FormController {
    api: Arc<dyn ResourceApi>,
    target: FormTarget,
    state: Arc<watch::Sender<FormStatus>>,
    existing: QuerySlot<Record>,
    departments: QuerySlot<Vec<String>>,
}

impl FormController {
    pub fn new(api: Arc<dyn ResourceApi>, target: FormTarget) -> Self {
        let (state, _) = watch::channel(FormStatus::Editing);
        Self {
            api,
            target,
            state: Arc::new(state),
            existing: QuerySlot::new(),
            departments: QuerySlot::new(),
        }
    }

    pub fn create(api: Arc<dyn ResourceApi>, resource: Resource) -> Self {
        Self::new(
            api,
            FormTarget::Create {
                resource,
                owner: None,
            },
        )
    }

    /// A customer is always created under the employee that looks after it.
    pub fn create_customer_for(api: Arc<dyn ResourceApi>, employee_id: EntityId) -> Self {
        Self::new(
            api,
            FormTarget::Create {
                resource: Resource::Customers,
                owner: Some(employee_id),
            },
        )
    }

    pub fn edit(api: Arc<dyn ResourceApi>, resource: Resource, id: EntityId) -> Self {
        Self::new(api, FormTarget::Update { resource, id })
    }

    pub fn target(&self) -> FormTarget {
        self.target
    }

    pub fn status(&self) -> FormStatus {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FormStatus> {
        self.state.subscribe()
    }

    /// Loads the record being edited. `None` for create forms.
    pub fn load_existing(&self) -> Option<JoinHandle<Settlement>> {
        let FormTarget::Update { resource, id } = self.target else {
            return None;
        };
        let api = Arc::clone(&self.api);
        Some(
            self.existing
                .dispatch(async move { api.fetch_one(resource, id).await }),
        )
    }

    pub fn existing(&self) -> Option<Record> {
        self.existing.snapshot().accepted().cloned()
    }

    pub fn load_departments(&self) -> JoinHandle<Settlement> {
        let api = Arc::clone(&self.api);
        self.departments
            .dispatch(async move { api.fetch_departments().await })
    }

    pub fn departments(&self) -> Vec<String> {
        self.departments
            .snapshot()
            .accepted()
            .cloned()
            .unwrap_or_default()
    }

    /// Sends the form. Ignored while a submission is in flight or after the
    /// record was saved.
    pub fn submit<P: Serialize>(&self, payload: &P) -> Option<JoinHandle<FormStatus>> {
        let payload = match serde_json::to_value(payload) {
            Ok(payload) => payload,
            Err(err) => {
                self.state.send_if_modified(|state| match state {
                    FormStatus::Editing | FormStatus::Rejected(_) => {
                        *state = FormStatus::Rejected(FormErrors::Banner(format!(
                            "form could not be encoded: {err}"
                        )));
                        true
                    }
                    FormStatus::Submitting | FormStatus::Saved(_) => false,
                });
                return None;
            }
        };

        let started = self.state.send_if_modified(|state| match state {
            FormStatus::Editing | FormStatus::Rejected(_) => {
                *state = FormStatus::Submitting;
                true
            }
            FormStatus::Submitting | FormStatus::Saved(_) => false,
        });
        if !started {
            warn!(form = ?self.target, "form submission ignored");
            return None;
        }

        let api = Arc::clone(&self.api);
        let state = Arc::clone(&self.state);
        let target = self.target;
        Some(tokio::spawn(async move {
            let outcome = match target {
                FormTarget::Create { resource, owner } => api.create(resource, owner, payload).await,
                FormTarget::Update { resource, id } => api.update(resource, id, payload).await,
            };
            let status = match outcome {
                Ok(record) => {
                    info!(form = ?target, id = %record.id, "form saved");
                    FormStatus::Saved(record)
                }
                Err(err) => {
                    warn!(form = ?target, %err, "form rejected");
                    FormStatus::Rejected(FormErrors::from_fetch_error(&err))
                }
            };
            state.send_replace(status.clone());
            status
        }))
    }
}

#[cfg(test)]
#[path = "tests/form_tests.rs"]
mod tests;
