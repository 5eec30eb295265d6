use axum::{
    body::Bytes,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::editor::files::ImportReport;
use crate::editor::View;
use crate::error::AppResult;
use crate::routes::{blocking, session, with_editor};
use crate::state::AppState;
use crate::types::{EditorResponse, ExportRequest, ImportRequest};

/// Stages one file for a later import into `folder`. Returns the staged names.
pub async fn upload(
    State(state): State<AppState>,
    Path((id, folder, name)): Path<(Uuid, String, String)>,
    body: Bytes,
) -> AppResult<Json<EditorResponse<Vec<String>>>> {
    with_editor(&state, id, move |editor| {
        editor.upload_file(&folder, &name, &body)?;
        Ok((View::Stay, editor.staged_files(&folder)))
    })
    .await
}

pub async fn import(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ImportRequest>,
) -> AppResult<Json<EditorResponse<ImportReport>>> {
    with_editor(&state, id, move |editor| Ok((View::Pagination, editor.import_files(&req.folder, req.insert_after)?)))
        .await
}

pub async fn export(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ExportRequest>,
) -> AppResult<Json<EditorResponse<Vec<String>>>> {
    with_editor(&state, id, move |editor| Ok((View::Stay, editor.export_files(&req.folder)?))).await
}

pub async fn download(
    State(state): State<AppState>,
    Path((id, folder, name)): Path<(Uuid, String, String)>,
) -> AppResult<impl IntoResponse> {
    let session = session(&state, id).await?;
    let disposition = format!("attachment; filename=\"{}\"", name);
    let bytes = blocking(move || {
        let editor = session.editor();
        let bytes = editor.download_file(&folder, &name)?;
        Ok(bytes)
    })
    .await?;
    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream".to_string()), (header::CONTENT_DISPOSITION, disposition)],
        bytes,
    ))
}
