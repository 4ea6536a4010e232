// src/handlers/status.rs
use crate::AppState;
use axum::{extract::Extension, response::Json, routing::get, Router};
use serde_json::json;
use std::sync::Arc;

pub fn status_routes() -> Router {
    Router::new().route("/api/status", get(api_status))
}

/// GET /api/status - service and backend health
pub async fn api_status(Extension(state): Extension<Arc<AppState>>) -> Json<serde_json::Value> {
    let store = state.paginator.store();
    let backend_status = match store.ping().await {
        Ok(()) => "healthy",
        Err(e) => {
            tracing::warn!("Backend health check failed: {}", e);
            "unhealthy"
        }
    };

    Json(json!({
        "status": "operational",
        "version": env!("CARGO_PKG_VERSION"),
        "backend": {
            "kind": store.backend_name(),
            "status": backend_status,
        },
        "tables": state.tables.iter().map(|t| t.table_name()).collect::<Vec<_>>(),
        "page_size": state.paginator.page_size(),
        "endpoints": {
            "dashboard": "/history/:table",
            "history": "/api/tables/:table/history",
            "tables": "/api/tables",
            "status": "/api/status"
        }
    }))
}
