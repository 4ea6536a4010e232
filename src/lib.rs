// lib.rs - chat history admin dashboard
pub mod columns;
pub mod config;
pub mod db;
pub mod error;
pub mod filters;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod paginator;
pub mod store;
pub mod view;

use axum::{Extension, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub use error::{ConfigError, QueryError};
pub use paginator::{SessionPage, SessionPaginator, PAGE_SIZE};

/// Shared by every request: the paginator (which owns the backend handle)
/// and the table registry.
pub struct AppState {
    pub paginator: SessionPaginator,
    pub tables: columns::TableRegistry,
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(handlers::history::history_routes())
        .merge(handlers::status::status_routes())
        .layer(axum::middleware::from_fn(middleware::logging::request_logging_middleware))
        .layer(CorsLayer::permissive())
        .layer(Extension(state))
}
