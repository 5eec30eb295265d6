use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::db;
use crate::editor::{Editor, EditorSession, ProcessStatistics, SessionSummary, View};
use crate::error::{AppError, AppResult, OptionExt};
use crate::routes::{blocking, session, with_editor};
use crate::state::AppState;
use crate::types::{AddModeRequest, EditorResponse, OpenSessionRequest, PanelRequest};

#[derive(Debug, Serialize)]
pub struct SaveResult {
    pub statistics: ProcessStatistics,
    pub summary: SessionSummary,
}

#[derive(Debug, Serialize)]
pub struct ReloadResult {
    pub statistics: Option<ProcessStatistics>,
    pub summary: SessionSummary,
}

/// Opens an editor on a process. The session is only registered when the
/// metadata could be read and the lock was acquired.
pub async fn open_session(
    State(state): State<AppState>,
    Json(req): Json<OpenSessionRequest>,
) -> AppResult<(StatusCode, Json<EditorResponse<SessionSummary>>)> {
    let user = req.user.trim().to_string();
    if user.is_empty() {
        return Err(AppError::ValidationError { field: "user".to_string(), message: "user cannot be empty".to_string() });
    }
    let process = db::get_process(&state.db, req.process_id).await?.ok_or_not_found("Process")?;

    let rulesets = state.rulesets.clone();
    let env = state.editor_env.clone();
    let session_id = Uuid::new_v4();
    let (session, response) = blocking(move || {
        let ruleset = rulesets.get(&process.ruleset)?;
        let layout = env.settings.layout(process.id, &process.title);
        let session = Arc::new(EditorSession::new(Editor::new(session_id, &user, layout, ruleset, env)));
        let view = session.load();
        let response = {
            let mut editor = session.editor();
            let messages = editor.take_messages();
            EditorResponse { view: view?, messages, data: editor.summary() }
        };
        Ok((session, response))
    })
    .await?;

    state.sessions.write().await.insert(session_id, session);
    tracing::info!("Session {} opened on process {}", session_id, req.process_id);
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<EditorResponse<SessionSummary>>> {
    with_editor(&state, id, |editor| Ok((View::Stay, editor.summary()))).await
}

/// Discards unsaved changes, releases the lock and forgets the session.
pub async fn close_session(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<StatusCode> {
    let session = state.sessions.write().await.remove(&id).ok_or_not_found("Session")?;
    blocking(move || {
        session.close();
        Ok(())
    })
    .await?;
    tracing::info!("Session {} closed", id);
    Ok(StatusCode::NO_CONTENT)
}

/// Writes the metadata file, stores the statistics and releases the lock.
pub async fn save(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<EditorResponse<SaveResult>>> {
    let session = session(&state, id).await?;
    let (process_id, response) = blocking(move || {
        let result = session.save();
        let mut editor = session.editor();
        let messages = editor.take_messages();
        let statistics = result?;
        let summary = editor.summary();
        Ok((summary.process_id, EditorResponse { view: View::Stay, messages, data: SaveResult { statistics, summary } }))
    })
    .await?;

    if let Err(e) = db::update_statistics(&state.db, process_id, &response.data.statistics).await {
        tracing::warn!("Failed to store statistics for process {}: {}", process_id, e);
    }
    Ok(Json(response))
}

/// Saves (when loaded) and reads the metadata again.
pub async fn reload(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<EditorResponse<ReloadResult>>> {
    let session = session(&state, id).await?;
    let response = blocking(move || {
        let result = session.reload();
        let mut editor = session.editor();
        let messages = editor.take_messages();
        let (view, statistics) = result?;
        Ok(EditorResponse { view, messages, data: ReloadResult { statistics, summary: editor.summary() } })
    })
    .await?;

    if let Some(statistics) = &response.data.statistics {
        let process_id = response.data.summary.process_id;
        if let Err(e) = db::update_statistics(&state.db, process_id, statistics).await {
            tracing::warn!("Failed to store statistics for process {}: {}", process_id, e);
        }
    }
    Ok(Json(response))
}

pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<EditorResponse<SessionSummary>>> {
    with_editor(&state, id, |editor| {
        let view = editor.cancel()?;
        Ok((view, editor.summary()))
    })
    .await
}

pub async fn set_panel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<PanelRequest>,
) -> AppResult<Json<EditorResponse<SessionSummary>>> {
    with_editor(&state, id, move |editor| {
        let view = editor.set_panel(req.panel)?;
        Ok((view, editor.summary()))
    })
    .await
}

pub async fn begin_add(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AddModeRequest>,
) -> AppResult<Json<EditorResponse<SessionSummary>>> {
    with_editor(&state, id, move |editor| {
        let view = editor.begin_add(req.mode)?;
        Ok((view, editor.summary()))
    })
    .await
}
