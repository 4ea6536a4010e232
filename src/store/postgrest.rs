// src/store/postgrest.rs
use super::MessageStore;
use crate::error::QueryError;
use crate::filters::DateRange;
use crate::models::{ActivityRow, Message};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tracing::{debug, error};

/// Reads message tables through a PostgREST endpoint (Supabase's REST API).
#[derive(Debug, Clone)]
pub struct PostgrestStore {
    client: Client,
    base_url: String,
    api_key: String,
}

/// Error body returned by PostgREST.
#[derive(Debug, Deserialize)]
struct PostgrestError {
    message: String,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    hint: Option<String>,
}

impl PostgrestStore {
    pub fn new(base_url: String, api_key: String) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!("chat_history_admin/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    async fn get_rows<T: serde::de::DeserializeOwned>(
        &self,
        table: &str,
        params: Vec<(String, String)>,
    ) -> Result<Vec<T>, QueryError> {
        debug!("PostgREST GET {} {:?}", table, params);

        let response = self
            .authorized(self.client.get(self.table_url(table)))
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = describe_error(&body)
                .unwrap_or_else(|| format!("Backend returned {}: {}", status, body));
            error!("PostgREST query on '{}' failed ({}): {}", table, status, message);
            return Err(QueryError::new(message));
        }

        Ok(serde_json::from_str(&body)?)
    }
}

fn describe_error(body: &str) -> Option<String> {
    let parsed: PostgrestError = serde_json::from_str(body).ok()?;
    let mut message = parsed.message;
    if let Some(details) = parsed.details.filter(|d| !d.is_empty()) {
        message.push_str(&format!(" ({})", details));
    }
    if let Some(hint) = parsed.hint.filter(|h| !h.is_empty()) {
        message.push_str(&format!(". Hint: {}", hint));
    }
    Some(message)
}

fn timestamp_param(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Query parameters for the ranking read. Rows without a session cannot be
/// grouped and are left out.
pub fn activity_params(range: &DateRange) -> Vec<(String, String)> {
    let mut params = vec![
        ("select".to_string(), "session_id,created_at".to_string()),
        ("session_id".to_string(), "not.is.null".to_string()),
    ];
    if let Some(from) = range.from {
        params.push(("created_at".to_string(), format!("gte.{}", timestamp_param(from))));
    }
    if let Some(to) = range.to {
        params.push(("created_at".to_string(), format!("lte.{}", timestamp_param(to))));
    }
    params
}

/// Query parameters for the full-row read of one page of sessions.
pub fn session_rows_params(session_ids: &[String]) -> Vec<(String, String)> {
    let list = session_ids
        .iter()
        .map(|id| quote_list_value(id))
        .collect::<Vec<_>>()
        .join(",");
    vec![
        ("select".to_string(), "*".to_string()),
        ("session_id".to_string(), format!("in.({})", list)),
        ("order".to_string(), "created_at.asc".to_string()),
    ]
}

/// Double-quote a value for a PostgREST `in.(...)` list so commas and
/// parentheses inside ids survive.
fn quote_list_value(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

#[async_trait]
impl MessageStore for PostgrestStore {
    fn backend_name(&self) -> &'static str {
        "postgrest"
    }

    async fn session_activity(
        &self,
        table: &str,
        range: &DateRange,
    ) -> Result<Vec<ActivityRow>, QueryError> {
        self.get_rows(table, activity_params(range)).await
    }

    async fn messages_for_sessions(
        &self,
        table: &str,
        session_ids: &[String],
    ) -> Result<Vec<Message>, QueryError> {
        self.get_rows(table, session_rows_params(session_ids)).await
    }

    async fn ping(&self) -> Result<(), QueryError> {
        let response = self
            .authorized(self.client.get(format!("{}/rest/v1/", self.base_url)))
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(QueryError::new(format!(
                "Backend returned {}",
                response.status()
            )))
        }
    }
}
