// src/paginator.rs
//! Session grouping, ranking and pagination over a message table.
//!
//! A fetch is two reads: a cheap `(session_id, created_at)` scan bounded by
//! the date filters, used to rank sessions by their latest message, then a
//! full-row read of only the sessions on the requested page.

use crate::error::QueryError;
use crate::filters::FilterState;
use crate::models::{ActivityRow, Message};
use crate::store::MessageStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};

pub const PAGE_SIZE: usize = 15;

/// One page of sessions, newest activity first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionPage {
    /// Session ids in display order.
    pub session_order: Vec<String>,
    /// Messages of each session, oldest first.
    pub grouped_messages: HashMap<String, Vec<Message>>,
    /// Distinct sessions matching the date filter, across all pages.
    pub total_session_count: usize,
}

impl SessionPage {
    /// Sessions in display order, skipping any whose rows vanished between
    /// the two reads.
    pub fn sessions(&self) -> impl Iterator<Item = (&str, &[Message])> {
        self.session_order.iter().filter_map(|id| {
            self.grouped_messages
                .get(id)
                .filter(|messages| !messages.is_empty())
                .map(|messages| (id.as_str(), messages.as_slice()))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.sessions().next().is_none()
    }

    pub fn total_pages(&self, page_size: usize) -> usize {
        if page_size == 0 {
            return 0;
        }
        self.total_session_count.div_ceil(page_size)
    }
}

/// Latest `created_at` per session.
pub fn last_activity_by_session(rows: &[ActivityRow]) -> HashMap<String, DateTime<Utc>> {
    let mut last: HashMap<String, DateTime<Utc>> = HashMap::new();
    for row in rows {
        last.entry(row.session_id.clone())
            .and_modify(|ts| {
                if row.created_at > *ts {
                    *ts = row.created_at;
                }
            })
            .or_insert(row.created_at);
    }
    last
}

/// Session ids by last activity, newest first; equal timestamps fall back
/// to ascending session id so the order is stable across fetches.
pub fn rank_sessions(last_activity: &HashMap<String, DateTime<Utc>>) -> Vec<String> {
    let mut ranked: Vec<(&String, &DateTime<Utc>)> = last_activity.iter().collect();
    ranked.sort_by(|(id_a, ts_a), (id_b, ts_b)| ts_b.cmp(ts_a).then_with(|| id_a.cmp(id_b)));
    ranked.into_iter().map(|(id, _)| id.clone()).collect()
}

/// The ids on `page` (1-based). Out-of-range pages yield an empty slice.
pub fn page_window(ranked: &[String], page: u32, page_size: usize) -> &[String] {
    let page = page.max(1) as usize;
    let start = (page - 1).saturating_mul(page_size);
    if start >= ranked.len() {
        return &[];
    }
    let end = start.saturating_add(page_size).min(ranked.len());
    &ranked[start..end]
}

/// Group rows by session keeping each group in ascending time order.
pub fn group_by_session(rows: Vec<Message>) -> HashMap<String, Vec<Message>> {
    let mut groups: HashMap<String, Vec<Message>> = HashMap::new();
    for row in rows {
        groups.entry(row.session_id.clone()).or_default().push(row);
    }
    // Stable, so rows already ordered by the backend keep their order.
    for messages in groups.values_mut() {
        messages.sort_by_key(|m| m.created_at);
    }
    groups
}

#[derive(Clone)]
pub struct SessionPaginator {
    store: Arc<dyn MessageStore>,
    page_size: usize,
}

impl SessionPaginator {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self::with_page_size(store, PAGE_SIZE)
    }

    pub fn with_page_size(store: Arc<dyn MessageStore>, page_size: usize) -> Self {
        Self {
            store,
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    /// Fetch one page of sessions for `table`.
    ///
    /// Only the `from`/`to` filters narrow the ranking; text and select
    /// filters are not applied here.
    pub async fn fetch(
        &self,
        table: &str,
        page: u32,
        filters: &FilterState,
    ) -> Result<SessionPage, QueryError> {
        let result = self.fetch_inner(table, page, filters).await;
        if let Err(e) = &result {
            error!("Error fetching messages from '{}': {}", table, e);
        }
        result
    }

    async fn fetch_inner(
        &self,
        table: &str,
        page: u32,
        filters: &FilterState,
    ) -> Result<SessionPage, QueryError> {
        let range = filters.date_range()?;
        debug!(table, page, ?range, "Fetching session activity");

        let activity = self.store.session_activity(table, &range).await?;
        let last_activity = last_activity_by_session(&activity);
        let ranked = rank_sessions(&last_activity);
        let total_session_count = ranked.len();

        let window = page_window(&ranked, page, self.page_size);
        if window.is_empty() {
            debug!(table, page, total_session_count, "No sessions on requested page");
            return Ok(SessionPage {
                total_session_count,
                ..Default::default()
            });
        }

        let rows = self.store.messages_for_sessions(table, window).await?;
        let grouped_messages = group_by_session(rows);

        debug!(
            table,
            page,
            sessions = window.len(),
            total_session_count,
            "Fetched session page"
        );

        Ok(SessionPage {
            session_order: window.to_vec(),
            grouped_messages,
            total_session_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::DateRange;
    use crate::store::memory::{message, Call, MemoryStore};

    fn setup(store: MemoryStore) -> (SessionPaginator, Arc<MemoryStore>) {
        let store = Arc::new(store);
        (SessionPaginator::new(store.clone()), store)
    }

    fn three_sessions() -> Vec<Message> {
        vec![
            message("1", "A", "2024-01-02T09:00:00Z"),
            message("2", "A", "2024-01-03T09:00:00Z"),
            message("3", "B", "2024-01-05T09:00:00Z"),
            message("4", "B", "2024-01-04T09:00:00Z"),
            message("5", "C", "2024-01-01T09:00:00Z"),
        ]
    }

    #[tokio::test]
    async fn test_sessions_ranked_by_last_activity() {
        let (paginator, _) = setup(MemoryStore::new(three_sessions()));
        let page = paginator
            .fetch("chat_messages", 1, &FilterState::default())
            .await
            .unwrap();

        assert_eq!(page.session_order, vec!["B", "A", "C"]);
        assert_eq!(page.total_session_count, 3);
        let b: Vec<_> = page.grouped_messages["B"].iter().map(|m| m.id.as_str()).collect();
        assert_eq!(b, vec!["4", "3"]);
    }

    #[tokio::test]
    async fn test_date_filter_limits_ranking_to_the_day() {
        let mut rows = three_sessions();
        rows.push(message("6", "C", "2024-01-02T23:59:59.999Z"));
        rows.push(message("7", "D", "2024-01-03T00:00:00Z"));
        let (paginator, store) = setup(MemoryStore::new(rows));

        let filters = FilterState::from_query([("from", "2024-01-02"), ("to", "2024-01-02")]);
        let page = paginator.fetch("chat_messages", 1, &filters).await.unwrap();

        // A and C each have one message on 2024-01-02; C's is later.
        assert_eq!(page.session_order, vec!["C", "A"]);
        assert_eq!(page.total_session_count, 2);
        // The full-row read is not date bounded.
        assert_eq!(page.grouped_messages["A"].len(), 2);
        assert_eq!(store.calls()[0], Call::Activity(filters.date_range().unwrap()));
    }

    #[tokio::test]
    async fn test_pages_are_ordered_and_total_is_page_independent() {
        let rows: Vec<Message> = (0..40)
            .map(|i| {
                message(
                    &format!("m{}", i),
                    &format!("s{:02}", i % 20),
                    &format!("2024-02-{:02}T12:00:00Z", (i % 28) + 1),
                )
            })
            .collect();
        let (paginator, _) = setup(MemoryStore::new(rows.clone()));
        let filters = FilterState::default();

        let first = paginator.fetch("t", 1, &filters).await.unwrap();
        let second = paginator.fetch("t", 2, &filters).await.unwrap();
        assert_eq!(first.session_order.len(), PAGE_SIZE);
        assert_eq!(second.session_order.len(), 5);
        assert_eq!(first.total_session_count, 20);
        assert_eq!(second.total_session_count, 20);
        assert_eq!(first.total_pages(PAGE_SIZE), 2);

        let activity: Vec<ActivityRow> = rows
            .iter()
            .map(|m| ActivityRow {
                session_id: m.session_id.clone(),
                created_at: m.created_at,
            })
            .collect();
        let last = last_activity_by_session(&activity);
        let oldest_on_first = first.session_order.iter().map(|s| last[s]).min().unwrap();
        let newest_on_second = second.session_order.iter().map(|s| last[s]).max().unwrap();
        assert!(oldest_on_first >= newest_on_second);

        for (_, messages) in first.sessions().chain(second.sessions()) {
            assert!(messages.windows(2).all(|w| w[0].created_at <= w[1].created_at));
        }
    }

    #[tokio::test]
    async fn test_empty_page_skips_second_query() {
        let (paginator, store) = setup(MemoryStore::new(Vec::new()));
        let page = paginator
            .fetch("t", 1, &FilterState::default())
            .await
            .unwrap();

        assert!(page.is_empty());
        assert!(page.grouped_messages.is_empty());
        assert_eq!(page.total_session_count, 0);
        assert_eq!(store.calls(), vec![Call::Activity(DateRange::default())]);
    }

    #[tokio::test]
    async fn test_page_past_the_end_keeps_total() {
        let (paginator, store) = setup(MemoryStore::new(three_sessions()));
        let page = paginator
            .fetch("t", 9, &FilterState::default())
            .await
            .unwrap();

        assert!(page.session_order.is_empty());
        assert_eq!(page.total_session_count, 3);
        assert_eq!(store.calls().len(), 1);
    }

    #[test]
    fn test_vanished_session_is_skipped() {
        // A was ranked but its rows were deleted before the full-row read.
        let rows: Vec<Message> = three_sessions()
            .into_iter()
            .filter(|m| m.session_id == "B")
            .collect();
        let page = SessionPage {
            session_order: vec!["A".to_string(), "B".to_string()],
            grouped_messages: group_by_session(rows),
            total_session_count: 2,
        };

        let shown: Vec<&str> = page.sessions().map(|(id, _)| id).collect();
        assert_eq!(shown, vec!["B"]);
        assert!(!page.is_empty());
    }

    #[tokio::test]
    async fn test_query_failure_surfaces_message() {
        let (paginator, _) = setup(MemoryStore::failing_activity("permission denied for table"));
        let err = paginator
            .fetch("t", 1, &FilterState::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "permission denied for table");

        let (paginator, store) = setup(MemoryStore::failing_messages(three_sessions(), "timeout"));
        let err = paginator
            .fetch("t", 1, &FilterState::default())
            .await
            .unwrap_err();
        assert_eq!(err.message, "timeout");
        assert_eq!(store.calls().len(), 2);
    }

    #[test]
    fn test_ties_broken_by_session_id() {
        let ts: DateTime<Utc> = "2024-01-01T00:00:00Z".parse().unwrap();
        let mut last = HashMap::new();
        last.insert("zeta".to_string(), ts);
        last.insert("alpha".to_string(), ts);
        last.insert("mid".to_string(), ts);
        assert_eq!(rank_sessions(&last), vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_page_window_bounds() {
        let ids: Vec<String> = (0..32).map(|i| i.to_string()).collect();
        assert_eq!(page_window(&ids, 1, 15).len(), 15);
        assert_eq!(page_window(&ids, 3, 15), &ids[30..32]);
        assert!(page_window(&ids, 4, 15).is_empty());
        assert_eq!(page_window(&ids, 0, 15), page_window(&ids, 1, 15));
    }
}
