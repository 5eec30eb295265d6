use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::editor::preview::PreviewInfo;
use crate::editor::View;
use crate::error::AppResult;
use crate::routes::with_editor;
use crate::state::AppState;
use crate::types::{EditorResponse, PreviewAction};

/// Navigates, rotates or zooms the preview and renders it. The rendered file
/// is served under `/previews/<file>`.
pub async fn preview(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(action): Json<PreviewAction>,
) -> AppResult<Json<EditorResponse<PreviewInfo>>> {
    with_editor(&state, id, move |editor| {
        let info = match action {
            PreviewAction::Navigate { offset } => editor.navigate(offset)?,
            PreviewAction::GoTo { page } => editor.go_to(page)?,
            PreviewAction::RotateLeft => editor.rotate_left()?,
            PreviewAction::RotateRight => editor.rotate_right()?,
            PreviewAction::Zoom { percent } => editor.set_zoom(percent)?,
            PreviewAction::Folder { name } => editor.select_folder(name.as_deref())?,
        };
        Ok((View::Stay, info))
    })
    .await
}

pub async fn folders(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Json<EditorResponse<Vec<String>>>> {
    with_editor(&state, id, |editor| Ok((View::Stay, editor.folders()))).await
}
