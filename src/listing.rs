//! Filter, sort and page state behind the vehicle list view.
//!
//! Free-text input is debounced: it only becomes part of the committed
//! [`FilterSpec`] once [`ListingState::poll`] runs after the delay. Changing
//! the filter criteria sends the view back to page 1; changing the sort keeps
//! the current page.

use std::time::Duration;
use tokio::time::Instant;

use crate::debounce::Debouncer;
use crate::models::Vehicle;
use crate::query::{FilterSpec, ListingParams, QueryPage, SortKey, run_query};

#[derive(Debug, Clone)]
pub struct ListingState {
    spec: FilterSpec,
    page: usize,
    search: Debouncer<String>,
}

impl ListingState {
    pub fn new(search_delay: Duration) -> Self {
        ListingState {
            spec: FilterSpec::default(),
            page: 1,
            search: Debouncer::new(search_delay),
        }
    }

    pub fn spec(&self) -> &FilterSpec {
        &self.spec
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn pending_search(&self) -> Option<&str> {
        self.search.pending().map(String::as_str)
    }

    pub fn search_input(&mut self, text: String, now: Instant) {
        self.search.push(text, now);
    }

    /// Commits debounced search input. Returns whether the filter changed.
    pub fn poll(&mut self, now: Instant) -> bool {
        let Some(text) = self.search.poll(now) else {
            return false;
        };
        let query = Some(text).filter(|q| !q.trim().is_empty());
        if query == self.spec.query {
            return false;
        }
        tracing::debug!(query = ?query, "Committing search input");
        self.spec.query = query;
        self.page = 1;
        true
    }

    /// Replaces every criterion except the committed text query and the sort order.
    pub fn apply_filters(&mut self, filters: FilterSpec) {
        let query = self.spec.query.take();
        let sort = self.spec.sort;
        self.spec = FilterSpec { query, sort, ..filters };
        self.page = 1;
    }

    pub fn set_sort(&mut self, sort: SortKey) {
        self.spec.sort = sort;
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page;
    }

    pub fn reset(&mut self) {
        self.search.cancel();
        self.spec = FilterSpec::default();
        self.page = 1;
    }

    pub fn has_active_filters(&self) -> bool {
        self.spec.has_active_filters() || self.pending_search().is_some_and(|q| !q.trim().is_empty())
    }

    pub fn params(&self) -> ListingParams {
        ListingParams::from_spec(&self.spec, self.page)
    }

    pub fn view(&self, vehicles: &[Vehicle], page_size: usize) -> QueryPage {
        run_query(vehicles, &self.spec, self.page, page_size)
    }
}
