//! Paginated, searchable list of one resource.

use std::sync::Arc;

use shared::domain::{EntityId, Page, PageRequest, Record, Resource};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, warn};

use crate::{
    api::ResourceApi,
    error::FetchError,
    query_slot::{QuerySlot, Settlement, SlotState, SlotStatus},
};

/// Where a list's rows come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListSource {
    /// Server-side paging and search over a whole collection.
    Collection(Resource),
    /// Rows owned by one parent entity. The related endpoint is unpaginated,
    /// so paging and search are applied locally. Without a parent the list
    /// never fetches.
    Related {
        parent: Resource,
        child: Resource,
        parent_id: Option<EntityId>,
    },
}

impl ListSource {
    pub fn resource(&self) -> Resource {
        match self {
            ListSource::Collection(resource) => *resource,
            ListSource::Related { child, .. } => *child,
        }
    }
}

/// Render-ready snapshot of a list.
#[derive(Debug, Clone, PartialEq)]
pub struct ListView {
    pub page: u32,
    pub page_size: u32,
    pub search_term: String,
    pub status: SlotStatus,
    pub loading: bool,
    pub error: Option<FetchError>,
    pub items: Vec<Record>,
    pub total_pages: u32,
    pub total_elements: u64,
}

impl ListView {
    /// Loaded successfully with nothing to show. Not an error.
    pub fn is_empty(&self) -> bool {
        self.status == SlotStatus::Succeeded && self.items.is_empty()
    }
}

pub struct ListController {
    api: Arc<dyn ResourceApi>,
    source: ListSource,
    page: u32,
    page_size: u32,
    search_term: String,
    slot: QuerySlot<Page<Record>>,
}

impl ListController {
    pub fn new(api: Arc<dyn ResourceApi>, source: ListSource, page_size: u32) -> Self {
        Self {
            api,
            source,
            page: 0,
            page_size: page_size.max(1),
            search_term: String::new(),
            slot: QuerySlot::new(),
        }
    }

    pub fn collection(api: Arc<dyn ResourceApi>, resource: Resource, page_size: u32) -> Self {
        Self::new(api, ListSource::Collection(resource), page_size)
    }

    pub fn related(
        api: Arc<dyn ResourceApi>,
        parent: Resource,
        child: Resource,
        page_size: u32,
    ) -> Self {
        Self::new(
            api,
            ListSource::Related {
                parent,
                child,
                parent_id: None,
            },
            page_size,
        )
    }

    pub fn source(&self) -> ListSource {
        self.source
    }

    pub fn resource(&self) -> Resource {
        self.source.resource()
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn status(&self) -> SlotStatus {
        self.slot.status()
    }

    pub fn subscribe(&self) -> watch::Receiver<SlotState<Page<Record>>> {
        self.slot.subscribe()
    }

    pub fn query(&self) -> PageRequest {
        PageRequest::new(self.page, self.page_size, self.search_term.clone())
    }

    pub fn view(&self) -> ListView {
        let state = self.slot.snapshot();
        let status = state.status();
        let (items, total_pages, total_elements) = match state.accepted() {
            Some(page) => (page.items.clone(), page.total_pages, page.total_elements),
            None => (Vec::new(), 0, 0),
        };
        ListView {
            page: self.page,
            page_size: self.page_size,
            search_term: self.search_term.clone(),
            status,
            loading: state.is_pending(),
            error: match status {
                SlotStatus::Failed => state.error().cloned(),
                _ => None,
            },
            items,
            total_pages,
            total_elements,
        }
    }

    pub fn set_search_term(&mut self, term: impl Into<String>) -> Option<JoinHandle<Settlement>> {
        self.search_term = term.into();
        self.page = 0;
        self.refresh()
    }

    pub fn set_page_size(&mut self, size: u32) -> Option<JoinHandle<Settlement>> {
        if size == 0 {
            warn!(resource = %self.resource(), "ignoring page size of zero");
            return None;
        }
        self.page_size = size;
        self.page = 0;
        self.refresh()
    }

    /// Moves to page `n` if it exists in the accepted result for the current
    /// parameters.
    pub fn set_page(&mut self, n: u32) -> Option<JoinHandle<Settlement>> {
        let total_pages = self.known_total_pages();
        if n >= total_pages {
            debug!(resource = %self.resource(), page = n, total_pages, "page out of range");
            return None;
        }
        self.page = n;
        self.refresh()
    }

    pub fn next_page(&mut self) -> Option<JoinHandle<Settlement>> {
        self.set_page(self.page.saturating_add(1))
    }

    pub fn previous_page(&mut self) -> Option<JoinHandle<Settlement>> {
        let previous = self.page.checked_sub(1)?;
        self.set_page(previous)
    }

    /// Re-dispatches with unchanged parameters.
    pub fn retry(&mut self) -> Option<JoinHandle<Settlement>> {
        self.refresh()
    }

    /// Dispatches a fetch for the current parameters. A related list with no
    /// parent is put back to idle instead.
    pub fn refresh(&mut self) -> Option<JoinHandle<Settlement>> {
        let request = self.query();
        let api = Arc::clone(&self.api);
        match self.source {
            ListSource::Collection(resource) => Some(self.slot.dispatch(async move {
                let mut page = api.fetch_page(resource, &request).await?;
                cap_to_page_size(&mut page, request.size, resource);
                Ok(page)
            })),
            ListSource::Related {
                parent,
                child,
                parent_id: Some(parent_id),
            } => Some(self.slot.dispatch(async move {
                let all = api.fetch_related(parent, parent_id, child).await?;
                let matching = all
                    .into_iter()
                    .filter(|record| record.matches_search(&request.search))
                    .collect();
                Ok(Page::paginate(matching, request.page, request.size))
            })),
            ListSource::Related {
                parent_id: None, ..
            } => {
                self.slot.reset();
                None
            }
        }
    }

    /// Drops in-flight work and data and returns to the first page.
    pub fn reset(&mut self) {
        self.slot.reset();
        self.page = 0;
        self.search_term.clear();
    }

    pub(crate) fn bind_parent(&mut self, id: Option<EntityId>) {
        if let ListSource::Related { parent_id, .. } = &mut self.source {
            *parent_id = id;
        }
    }

    pub fn parent_id(&self) -> Option<EntityId> {
        match self.source {
            ListSource::Related { parent_id, .. } => parent_id,
            ListSource::Collection(_) => None,
        }
    }

    /// Unknown (zero) while a request for new parameters is in flight.
    fn known_total_pages(&self) -> u32 {
        self.slot
            .snapshot()
            .accepted()
            .map(|page| page.total_pages)
            .unwrap_or(0)
    }
}

fn cap_to_page_size(page: &mut Page<Record>, size: u32, resource: Resource) {
    let size = size as usize;
    if page.items.len() > size {
        warn!(%resource, returned = page.items.len(), size, "server returned more rows than requested");
        page.items.truncate(size);
    }
}

#[cfg(test)]
#[path = "tests/list_tests.rs"]
mod tests;
