//! HTTP route handlers for the Seitenwerk API.
//!
//! Each sub-module covers one area of the editor:
//!
//! - `health`: health, readiness, metrics and version endpoints
//! - `processes`: process registry
//! - `sessions`: open, save, reload, cancel and close editor sessions
//! - `structure`: logical tree and metadata editing
//! - `pages`: page lists, ranges, pagination and page files
//! - `preview`: preview navigation
//! - `files`: upload, import, export and download

pub mod files;
pub mod health;
pub mod pages;
pub mod preview;
pub mod processes;
pub mod sessions;
pub mod structure;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::editor::{Editor, EditorResult, EditorSession, View};
use crate::error::{AppError, AppResult, OptionExt};
use crate::state::AppState;
use crate::types::EditorResponse;

/// Upper bound for request bodies; uploads of master images are large.
const BODY_LIMIT: usize = 512 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    let previews = ServeDir::new(state.config.storage.preview_dir.clone());

    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/metrics", get(health::metrics))
        .route("/metrics/prometheus", get(health::metrics_prometheus))
        .route("/version", get(health::version))
        .route("/processes", post(processes::create_process).get(processes::list_processes))
        .route("/processes/{id}", get(processes::get_process))
        .route("/sessions", post(sessions::open_session))
        .route("/sessions/{id}", get(sessions::get_session).delete(sessions::close_session))
        .route("/sessions/{id}/save", post(sessions::save))
        .route("/sessions/{id}/reload", post(sessions::reload))
        .route("/sessions/{id}/cancel", post(sessions::cancel))
        .route("/sessions/{id}/view", put(sessions::set_panel))
        .route("/sessions/{id}/add-mode", post(sessions::begin_add))
        .route("/sessions/{id}/tree", get(structure::tree))
        .route("/sessions/{id}/current", put(structure::select))
        .route(
            "/sessions/{id}/structure",
            post(structure::add_node).delete(structure::delete_node),
        )
        .route("/sessions/{id}/structure/move", post(structure::move_node))
        .route("/sessions/{id}/structure/type", put(structure::change_type))
        .route("/sessions/{id}/fields", get(structure::fields))
        .route("/sessions/{id}/metadata", post(structure::add_metadata))
        .route(
            "/sessions/{id}/metadata/{index}",
            put(structure::update_metadata).delete(structure::delete_metadata),
        )
        .route("/sessions/{id}/persons", post(structure::add_person))
        .route("/sessions/{id}/persons/{index}", delete(structure::delete_person))
        .route("/sessions/{id}/pages", get(pages::list_pages))
        .route("/sessions/{id}/pages/assign", post(pages::assign_range))
        .route("/sessions/{id}/pages/from-children", post(pages::assign_from_children))
        .route("/sessions/{id}/pages/add", post(pages::add_pages))
        .route("/sessions/{id}/pages/remove", post(pages::remove_pages))
        .route("/sessions/{id}/paginate", post(pages::paginate))
        .route("/sessions/{id}/pages/move", post(pages::move_pages))
        .route("/sessions/{id}/pages/delete", post(pages::delete_pages))
        .route("/sessions/{id}/pages/reorder", post(pages::reorder))
        .route("/sessions/{id}/pages/reconcile", post(pages::reconcile))
        .route("/sessions/{id}/representative", put(pages::set_representative))
        .route("/sessions/{id}/preview", post(preview::preview))
        .route("/sessions/{id}/folders", get(preview::folders))
        .route("/sessions/{id}/uploads/{folder}/{name}", put(files::upload))
        .route("/sessions/{id}/import", post(files::import))
        .route("/sessions/{id}/export", post(files::export))
        .route("/sessions/{id}/downloads/{folder}/{name}", get(files::download))
        .nest_service("/previews", previews)
        .with_state(state)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
}

pub(crate) async fn session(state: &AppState, id: Uuid) -> AppResult<Arc<EditorSession>> {
    state.sessions.read().await.get(&id).cloned().ok_or_not_found("Session")
}

pub(crate) async fn blocking<T, F>(op: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> AppResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("editor task failed: {}", e)))?
}

/// Runs `op` on the session's editor in a blocking task and wraps the result
/// with the pending user messages.
pub(crate) async fn with_editor<T, F>(state: &AppState, id: Uuid, op: F) -> AppResult<Json<EditorResponse<T>>>
where
    T: Serialize + Send + 'static,
    F: FnOnce(&mut Editor) -> EditorResult<(View, T)> + Send + 'static,
{
    let session = session(state, id).await?;
    let response = blocking(move || {
        let mut editor = session.editor();
        let outcome = op(&mut editor);
        let messages = editor.take_messages();
        let (view, data) = outcome?;
        Ok(EditorResponse { view, messages, data })
    })
    .await?;
    Ok(Json(response))
}
