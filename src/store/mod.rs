// src/store/mod.rs
//! Read access to the hosted message tables.

use crate::error::QueryError;
use crate::filters::DateRange;
use crate::models::{ActivityRow, Message};
use async_trait::async_trait;

pub mod postgres;
pub mod postgrest;

#[cfg(test)]
pub mod memory;

pub use postgres::PgMessageStore;
pub use postgrest::PostgrestStore;

/// The two reads the session paginator needs from a backend.
///
/// Implementations are shared by every request for the life of the process,
/// so they must be safe to call concurrently.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Short name used in logs and the status endpoint.
    fn backend_name(&self) -> &'static str;

    /// `session_id` and `created_at` of every row within `range`.
    async fn session_activity(
        &self,
        table: &str,
        range: &DateRange,
    ) -> Result<Vec<ActivityRow>, QueryError>;

    /// Full rows of the given sessions, oldest first.
    async fn messages_for_sessions(
        &self,
        table: &str,
        session_ids: &[String],
    ) -> Result<Vec<Message>, QueryError>;

    async fn ping(&self) -> Result<(), QueryError>;
}
