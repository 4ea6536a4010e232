// src/store/postgres.rs
use super::MessageStore;
use crate::columns::is_valid_identifier;
use crate::error::QueryError;
use crate::filters::DateRange;
use crate::models::{ActivityRow, Message};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// Reads message tables straight from Postgres.
#[derive(Debug, Clone)]
pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn quoted(table: &str) -> Result<String, QueryError> {
        if !is_valid_identifier(table) {
            return Err(QueryError::new(format!("Invalid table name: {}", table)));
        }
        Ok(format!("\"{}\"", table))
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn session_activity(
        &self,
        table: &str,
        range: &DateRange,
    ) -> Result<Vec<ActivityRow>, QueryError> {
        let sql = format!(
            r#"
            SELECT session_id::text, created_at::timestamptz
            FROM {}
            WHERE session_id IS NOT NULL
              AND ($1::timestamptz IS NULL OR created_at >= $1)
              AND ($2::timestamptz IS NULL OR created_at <= $2)
            "#,
            Self::quoted(table)?
        );

        let rows: Vec<(String, DateTime<Utc>)> = sqlx::query_as(&sql)
            .bind(range.from)
            .bind(range.to)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(session_id, created_at)| ActivityRow {
                session_id,
                created_at,
            })
            .collect())
    }

    async fn messages_for_sessions(
        &self,
        table: &str,
        session_ids: &[String],
    ) -> Result<Vec<Message>, QueryError> {
        // to_jsonb keeps every column, matching `select=*` on the REST backend.
        let sql = format!(
            r#"
            SELECT to_jsonb(t)
            FROM {} t
            WHERE t.session_id::text = ANY($1)
            ORDER BY t.created_at ASC
            "#,
            Self::quoted(table)?
        );

        let rows: Vec<(serde_json::Value,)> = sqlx::query_as(&sql)
            .bind(session_ids.to_vec())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|(row,)| serde_json::from_value(row).map_err(QueryError::from))
            .collect()
    }

    async fn ping(&self) -> Result<(), QueryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
