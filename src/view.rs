// src/view.rs
//! State behind one history view: filters, expanded sessions and the most
//! recently applied fetch.

use crate::error::QueryError;
use crate::filters::{DatePreset, FilterState};
use crate::paginator::SessionPage;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies one fetch. Higher ids were issued later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FetchTicket(pub u64);

/// Hands out monotonic fetch ids and remembers the latest one, so a slow
/// response can never overwrite a newer one.
#[derive(Debug, Default)]
pub struct FetchSequencer {
    latest: AtomicU64,
}

impl FetchSequencer {
    pub fn issue(&self) -> FetchTicket {
        FetchTicket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_latest(&self, ticket: FetchTicket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }
}

#[derive(Debug, Default)]
pub struct HistoryView {
    pub filters: FilterState,
    expanded: HashMap<String, bool>,
    sequencer: FetchSequencer,
    loading: bool,
    error: Option<String>,
    page: SessionPage,
}

impl HistoryView {
    pub fn new(filters: FilterState) -> Self {
        Self {
            filters,
            ..Default::default()
        }
    }

    /// Mark the view as loading and issue a ticket for the fetch.
    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.loading = true;
        self.error = None;
        self.sequencer.issue()
    }

    /// Apply a finished fetch. Returns false, leaving the view untouched,
    /// when a newer fetch has been issued since. A failed fetch keeps the
    /// previously shown sessions.
    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<SessionPage, QueryError>,
    ) -> bool {
        if !self.sequencer.is_latest(ticket) {
            tracing::debug!(ticket = ticket.0, "Discarding stale fetch result");
            return false;
        }
        self.loading = false;
        match result {
            Ok(page) => {
                self.page = page;
                self.error = None;
            }
            Err(e) => self.error = Some(e.message),
        }
        true
    }

    pub fn toggle_session(&mut self, session_id: &str) {
        let entry = self.expanded.entry(session_id.to_string()).or_insert(false);
        *entry = !*entry;
    }

    pub fn is_expanded(&self, session_id: &str) -> bool {
        self.expanded.get(session_id).copied().unwrap_or(false)
    }

    pub fn set_filter(&mut self, id: &str, value: impl Into<String>) {
        self.filters.set(id, value);
    }

    pub fn select_preset(&mut self, preset: DatePreset, today: NaiveDate) {
        self.filters.apply_preset(preset, today);
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn page(&self) -> &SessionPage {
        &self.page
    }
}
