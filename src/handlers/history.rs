// src/handlers/history.rs
use crate::filters::FilterState;
use crate::handlers::history_page::{escape_html, render_history_page};
use crate::models::ErrorResponse;
use crate::view::HistoryView;
use crate::AppState;
use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Redirect, Response},
    routing::get,
    Router,
};
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

/// Query parameter the JSON API echoes back so a client can drop responses
/// to requests it has since superseded.
pub const REQUEST_ID_KEY: &str = "request_id";

pub fn history_routes() -> Router {
    Router::new()
        .route("/", get(index))
        .route("/history/:table", get(history_page))
        .route("/api/tables", get(tables_api))
        .route("/api/tables/:table/history", get(history_api))
}

pub async fn index(Extension(state): Extension<Arc<AppState>>) -> Redirect {
    Redirect::to(&format!("/history/{}", state.tables.first().table_name()))
}

/// GET /history/:table - dashboard page rendered from the URL filters
pub async fn history_page(
    Path(table_name): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    Extension(state): Extension<Arc<AppState>>,
) -> Response {
    let table = match state.tables.get(&table_name) {
        Some(table) => table,
        None => {
            tracing::warn!("History requested for unknown table '{}'", table_name);
            let html = format!(
                "<!DOCTYPE html><html><body><p>Unknown table: {}</p><p><a href=\"/\">Back</a></p></body></html>",
                escape_html(&table_name)
            );
            return (StatusCode::NOT_FOUND, Html(html)).into_response();
        }
    };

    let mut view = HistoryView::new(FilterState::from_query(params));
    let ticket = view.begin_fetch();
    let status = match view.filters.date_range() {
        Ok(_) => {
            let result = state
                .paginator
                .fetch(table.table_name(), view.filters.page(), &view.filters)
                .await;
            view.complete_fetch(ticket, result);
            StatusCode::OK
        }
        Err(e) => {
            tracing::warn!("Rejected history filters for '{}': {}", table_name, e);
            view.complete_fetch(ticket, Err(e));
            StatusCode::BAD_REQUEST
        }
    };

    let html = render_history_page(
        &state.tables,
        table,
        &view,
        state.paginator.page_size(),
        Utc::now().date_naive(),
    );
    (status, Html(html)).into_response()
}

/// GET /api/tables/:table/history - one page of sessions as JSON
pub async fn history_api(
    Path(table_name): Path<String>,
    Query(mut params): Query<HashMap<String, String>>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let request_id = params.remove(REQUEST_ID_KEY);

    let table = state.tables.get(&table_name).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(json!({
                "success": false,
                "message": format!("Unknown table: {}", table_name),
                "request_id": request_id,
            })),
        )
    })?;

    let filters = FilterState::from_query(params);
    if let Err(e) = filters.date_range() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "message": e.message,
                "request_id": request_id,
            })),
        ));
    }
    let page_number = filters.page();
    let page_size = state.paginator.page_size();

    let page = state
        .paginator
        .fetch(table.table_name(), page_number, &filters)
        .await
        .map_err(|e| {
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "success": false,
                    "message": e.message,
                    "request_id": request_id,
                })),
            )
        })?;

    Ok(Json(json!({
        "success": true,
        "request_id": request_id,
        "table": table.table_name(),
        "query": filters.to_query_string(),
        "session_order": page.session_order,
        "grouped_messages": page.grouped_messages,
        "total_session_count": page.total_session_count,
        "pagination": {
            "page": page_number,
            "page_size": page_size,
            "total": page.total_session_count,
            "total_pages": page.total_pages(page_size),
        }
    })))
}

/// GET /api/tables - configured tables with their columns and filters
pub async fn tables_api(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<ErrorResponse>)> {
    let tables: Vec<_> = state.tables.iter().map(|t| &t.spec).collect();
    let tables = serde_json::to_value(tables).map_err(|e| {
        tracing::error!("Failed to serialize table registry: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("Failed to list tables")),
        )
    })?;
    Ok(Json(json!({ "success": true, "tables": tables })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::TableRegistry;
    use crate::paginator::SessionPaginator;
    use crate::store::memory::{message, MemoryStore};
    use serde_json::Value;

    fn setup(store: MemoryStore, page_size: usize) -> (Arc<AppState>, Arc<MemoryStore>) {
        let store = Arc::new(store);
        let state = Arc::new(AppState {
            paginator: SessionPaginator::with_page_size(store.clone(), page_size),
            tables: TableRegistry::builtin(),
        });
        (state, store)
    }

    fn three_sessions() -> MemoryStore {
        MemoryStore::new(vec![
            message("1", "A", "2024-01-03T09:00:00Z"),
            message("2", "B", "2024-01-05T09:00:00Z"),
            message("3", "C", "2024-01-01T09:00:00Z"),
            message("4", "A", "2024-01-02T09:00:00Z"),
        ])
    }

    fn params(pairs: &[(&str, &str)]) -> Query<HashMap<String, String>> {
        Query(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    async fn api(
        state: &Arc<AppState>,
        table: &str,
        pairs: &[(&str, &str)],
    ) -> Result<Value, (StatusCode, Value)> {
        history_api(Path(table.to_string()), params(pairs), Extension(state.clone()))
            .await
            .map(|Json(body)| body)
            .map_err(|(status, Json(body))| (status, body))
    }

    #[tokio::test]
    async fn test_history_api_returns_page_with_pagination() {
        let (state, _) = setup(three_sessions(), 2);

        let body = api(&state, "chat_messages", &[("request_id", "7")]).await.unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["request_id"], "7");
        assert_eq!(body["session_order"], serde_json::json!(["B", "A"]));
        assert_eq!(body["total_session_count"], 3);
        assert_eq!(body["pagination"]["page"], 1);
        assert_eq!(body["pagination"]["page_size"], 2);
        assert_eq!(body["pagination"]["total_pages"], 2);
        assert_eq!(body["grouped_messages"]["A"].as_array().unwrap().len(), 2);

        let body = api(&state, "chat_messages", &[("page", "2"), ("request_id", "8")])
            .await
            .unwrap();
        assert_eq!(body["request_id"], "8");
        assert_eq!(body["session_order"], serde_json::json!(["C"]));
        assert_eq!(body["query"], "page=2");
    }

    #[tokio::test]
    async fn test_history_api_unknown_table_is_not_found() {
        let (state, store) = setup(three_sessions(), 15);

        let (status, body) = api(&state, "missing", &[("request_id", "3")]).await.unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["request_id"], "3");
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_history_api_backend_failure_is_bad_gateway() {
        let (state, _) = setup(MemoryStore::failing_activity("relation does not exist"), 15);

        let (status, body) = api(&state, "chat_messages", &[("request_id", "4")]).await.unwrap_err();
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "relation does not exist");
        assert_eq!(body["request_id"], "4");
    }

    #[tokio::test]
    async fn test_history_api_malformed_date_is_bad_request() {
        let (state, store) = setup(three_sessions(), 15);

        let (status, body) = api(&state, "chat_messages", &[("from", "bad"), ("request_id", "5")])
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Invalid 'from' date: bad");
        assert_eq!(body["request_id"], "5");
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_history_page_malformed_date_is_bad_request() {
        let (state, store) = setup(three_sessions(), 15);

        let response = history_page(
            Path("chat_messages".to_string()),
            params(&[("to", "2024-13-40")]),
            Extension(state),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_index_redirects_to_first_table() {
        let (state, _) = setup(three_sessions(), 15);

        let response = index(Extension(state)).await.into_response();
        assert!(response.status().is_redirection());
        assert_eq!(response.headers()["location"], "/history/chat_messages");
    }

    #[tokio::test]
    async fn test_tables_api_lists_registry() {
        let (state, _) = setup(three_sessions(), 15);

        let Json(body) = tables_api(Extension(state)).await.unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["tables"][0]["table_name"], "chat_messages");
        assert_eq!(body["tables"][0]["filters"][1]["type"], "select");
    }
}
