//! Scripted in-memory backend for controller tests.
//!
//! Each call is keyed by its arguments. A canned reply answers immediately;
//! otherwise the call parks until the test releases it, which lets a test
//! decide the exact order in which in-flight requests complete.

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use serde_json::Value;
use shared::domain::{EntityId, Page, PageRequest, Record, Resource};
use tokio::sync::oneshot;

use crate::{api::ResourceApi, error::FetchError};

type Reply<T> = Result<T, FetchError>;

struct Script<T> {
    canned: HashMap<String, Reply<T>>,
    parked: Vec<(String, oneshot::Sender<Reply<T>>)>,
}

impl<T> Default for Script<T> {
    fn default() -> Self {
        Self {
            canned: HashMap::new(),
            parked: Vec::new(),
        }
    }
}

#[derive(Default)]
pub(crate) struct ScriptedApi {
    calls: Mutex<Vec<String>>,
    pages: Mutex<Script<Page<Record>>>,
    related: Mutex<Script<Vec<Record>>>,
    ones: Mutex<Script<Record>>,
    submits: Mutex<Script<()>>,
    writes: Mutex<Script<Record>>,
    departments: Mutex<Script<Vec<String>>>,
    crashing: Mutex<Vec<String>>,
}

pub(crate) fn page_key(resource: Resource, page: u32, size: u32, search: &str) -> String {
    format!("page {resource} {page} {size} {search:?}")
}

pub(crate) fn related_key(parent: Resource, parent_id: i64, child: Resource) -> String {
    format!("related {parent} {parent_id} {child}")
}

pub(crate) fn one_key(resource: Resource, id: i64) -> String {
    format!("one {resource} {id}")
}

pub(crate) fn submit_key(target: i64, replacement: i64) -> String {
    format!("reassign {target} -> {replacement}")
}

pub(crate) fn create_key(resource: Resource, owner: Option<i64>) -> String {
    format!("create {resource} owner={owner:?}")
}

pub(crate) fn update_key(resource: Resource, id: i64) -> String {
    format!("update {resource} {id}")
}

pub(crate) const DEPARTMENTS_KEY: &str = "departments";

pub(crate) fn employee(id: i64, department: &str) -> Record {
    Record::new(EntityId(id))
        .with_attribute("firstName", format!("Employee{id}"))
        .with_attribute("department", department)
}

pub(crate) fn named(id: i64, name: &str) -> Record {
    Record::new(EntityId(id)).with_attribute("firstName", name)
}

pub(crate) fn page_of(items: Vec<Record>, total_pages: u32, total_elements: u64) -> Page<Record> {
    Page {
        items,
        total_pages,
        total_elements,
    }
}

pub(crate) fn ids(records: &[Record]) -> Vec<i64> {
    records.iter().map(|record| record.id.0).collect()
}

impl ScriptedApi {
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub(crate) fn count(&self, key: &str) -> usize {
        self.calls().iter().filter(|call| call.as_str() == key).count()
    }

    pub(crate) fn can_page(&self, key: String, reply: Reply<Page<Record>>) {
        self.pages.lock().expect("lock").canned.insert(key, reply);
    }

    pub(crate) fn can_related(&self, key: String, reply: Reply<Vec<Record>>) {
        self.related.lock().expect("lock").canned.insert(key, reply);
    }

    pub(crate) fn can_one(&self, key: String, reply: Reply<Record>) {
        self.ones.lock().expect("lock").canned.insert(key, reply);
    }

    pub(crate) fn can_write(&self, key: String, reply: Reply<Record>) {
        self.writes.lock().expect("lock").canned.insert(key, reply);
    }

    pub(crate) fn can_departments(&self, reply: Reply<Vec<String>>) {
        self.departments
            .lock()
            .expect("lock")
            .canned
            .insert(DEPARTMENTS_KEY.to_string(), reply);
    }

    pub(crate) async fn release_page(&self, key: &str, reply: Reply<Page<Record>>) {
        release(&self.pages, key, reply).await;
    }

    pub(crate) async fn release_related(&self, key: &str, reply: Reply<Vec<Record>>) {
        release(&self.related, key, reply).await;
    }

    pub(crate) async fn release_one(&self, key: &str, reply: Reply<Record>) {
        release(&self.ones, key, reply).await;
    }

    pub(crate) async fn release_submit(&self, key: &str, reply: Reply<()>) {
        release(&self.submits, key, reply).await;
    }

    pub(crate) async fn release_write(&self, key: &str, reply: Reply<Record>) {
        release(&self.writes, key, reply).await;
    }

    /// The call with this key panics instead of answering.
    pub(crate) fn crash_on(&self, key: String) {
        self.crashing.lock().expect("crashing lock").push(key);
    }

    async fn answer<T: Clone>(&self, script: &Mutex<Script<T>>, key: String) -> Reply<T> {
        self.calls.lock().expect("calls lock").push(key.clone());
        if self.crashing.lock().expect("crashing lock").contains(&key) {
            panic!("scripted crash for {key}");
        }
        let parked = {
            let mut script = script.lock().expect("script lock");
            if let Some(reply) = script.canned.get(&key) {
                return reply.clone();
            }
            let (tx, rx) = oneshot::channel();
            script.parked.push((key, tx));
            rx
        };
        parked
            .await
            .unwrap_or_else(|_| Err(FetchError::NetworkUnreachable("script dropped".into())))
    }
}

async fn release<T>(script: &Mutex<Script<T>>, key: &str, reply: Reply<T>) {
    for _ in 0..1_000 {
        let parked = {
            let mut script = script.lock().expect("script lock");
            script
                .parked
                .iter()
                .position(|(parked, _)| parked == key)
                .map(|index| script.parked.remove(index).1)
        };
        if let Some(tx) = parked {
            let _ = tx.send(reply);
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("no parked call for {key}");
}

#[async_trait]
impl ResourceApi for ScriptedApi {
    async fn fetch_page(
        &self,
        resource: Resource,
        request: &PageRequest,
    ) -> Result<Page<Record>, FetchError> {
        let key = page_key(resource, request.page, request.size, &request.search);
        self.answer(&self.pages, key).await
    }

    async fn fetch_related(
        &self,
        parent: Resource,
        parent_id: EntityId,
        child: Resource,
    ) -> Result<Vec<Record>, FetchError> {
        self.answer(&self.related, related_key(parent, parent_id.0, child))
            .await
    }

    async fn fetch_one(&self, resource: Resource, id: EntityId) -> Result<Record, FetchError> {
        self.answer(&self.ones, one_key(resource, id.0)).await
    }

    async fn submit_reassign_and_delete(
        &self,
        target_id: EntityId,
        replacement_id: EntityId,
    ) -> Result<(), FetchError> {
        self.answer(&self.submits, submit_key(target_id.0, replacement_id.0))
            .await
    }

    async fn create(
        &self,
        resource: Resource,
        owner: Option<EntityId>,
        _payload: Value,
    ) -> Result<Record, FetchError> {
        self.answer(&self.writes, create_key(resource, owner.map(|id| id.0)))
            .await
    }

    async fn update(
        &self,
        resource: Resource,
        id: EntityId,
        _payload: Value,
    ) -> Result<Record, FetchError> {
        self.answer(&self.writes, update_key(resource, id.0)).await
    }

    async fn fetch_departments(&self) -> Result<Vec<String>, FetchError> {
        self.answer(&self.departments, DEPARTMENTS_KEY.to_string())
            .await
    }
}
