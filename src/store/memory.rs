// In-memory store used by the paginator and view tests.
use super::MessageStore;
use crate::error::QueryError;
use crate::filters::DateRange;
use crate::models::{ActivityRow, Message};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Activity(DateRange),
    Messages(Vec<String>),
}

#[derive(Default)]
pub struct MemoryStore {
    rows: Vec<Message>,
    calls: Mutex<Vec<Call>>,
    fail_activity: Option<String>,
    fail_messages: Option<String>,
}

impl MemoryStore {
    pub fn new(rows: Vec<Message>) -> Self {
        Self {
            rows,
            ..Default::default()
        }
    }

    pub fn failing_activity(message: &str) -> Self {
        Self {
            fail_activity: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub fn failing_messages(rows: Vec<Message>, message: &str) -> Self {
        Self {
            rows,
            fail_messages: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

pub fn message(id: &str, session_id: &str, created_at: &str) -> Message {
    Message {
        id: id.to_string(),
        session_id: session_id.to_string(),
        created_at: created_at.parse::<DateTime<Utc>>().unwrap(),
        message: Some(serde_json::json!({"type": "human", "content": format!("msg {}", id)})),
        correo_enviado: None,
        extra: Default::default(),
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn session_activity(
        &self,
        _table: &str,
        range: &DateRange,
    ) -> Result<Vec<ActivityRow>, QueryError> {
        self.calls.lock().unwrap().push(Call::Activity(*range));
        if let Some(message) = &self.fail_activity {
            return Err(QueryError::new(message.clone()));
        }
        Ok(self
            .rows
            .iter()
            .filter(|m| range.contains(m.created_at))
            .map(|m| ActivityRow {
                session_id: m.session_id.clone(),
                created_at: m.created_at,
            })
            .collect())
    }

    async fn messages_for_sessions(
        &self,
        _table: &str,
        session_ids: &[String],
    ) -> Result<Vec<Message>, QueryError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Messages(session_ids.to_vec()));
        if let Some(message) = &self.fail_messages {
            return Err(QueryError::new(message.clone()));
        }
        let mut rows: Vec<Message> = self
            .rows
            .iter()
            .filter(|m| session_ids.contains(&m.session_id))
            .cloned()
            .collect();
        rows.sort_by_key(|m| m.created_at);
        Ok(rows)
    }

    async fn ping(&self) -> Result<(), QueryError> {
        Ok(())
    }
}
