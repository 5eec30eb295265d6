use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::editor::structure::{FieldWidget, MoveTarget, NewPerson, TreeEntry};
use crate::editor::View;
use crate::error::AppResult;
use crate::routes::with_editor;
use crate::state::AppState;
use crate::types::{
    AddMetadataRequest, AddNodeRequest, ChangeTypeRequest, EditorResponse, SelectRequest, UpdateMetadataRequest,
};

type TreeResponse = AppResult<Json<EditorResponse<Vec<TreeEntry>>>>;
type FieldsResponse = AppResult<Json<EditorResponse<Vec<FieldWidget>>>>;

pub async fn tree(State(state): State<AppState>, Path(id): Path<Uuid>) -> TreeResponse {
    with_editor(&state, id, |editor| Ok((View::Stay, editor.tree()?))).await
}

pub async fn select(State(state): State<AppState>, Path(id): Path<Uuid>, Json(req): Json<SelectRequest>) -> FieldsResponse {
    with_editor(&state, id, move |editor| {
        let view = editor.select(req.id)?;
        Ok((view, editor.fields()?))
    })
    .await
}

pub async fn add_node(State(state): State<AppState>, Path(id): Path<Uuid>, Json(req): Json<AddNodeRequest>) -> TreeResponse {
    with_editor(&state, id, move |editor| {
        let node = editor.add_node(&req.type_name, req.position, req.first_page.as_ref(), req.last_page.as_ref())?;
        tracing::debug!("Added {} as {:?}", node, req.position);
        Ok((View::StructureTree, editor.tree()?))
    })
    .await
}

pub async fn move_node(State(state): State<AppState>, Path(id): Path<Uuid>, Json(target): Json<MoveTarget>) -> TreeResponse {
    with_editor(&state, id, move |editor| {
        let view = editor.move_node(target)?;
        Ok((view, editor.tree()?))
    })
    .await
}

pub async fn change_type(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ChangeTypeRequest>,
) -> TreeResponse {
    with_editor(&state, id, move |editor| {
        let view = editor.change_type(&req.type_name)?;
        Ok((view, editor.tree()?))
    })
    .await
}

/// Deletes the current element with its subtree; its parent becomes current.
pub async fn delete_node(State(state): State<AppState>, Path(id): Path<Uuid>) -> TreeResponse {
    with_editor(&state, id, |editor| {
        let view = editor.delete_node()?;
        Ok((view, editor.tree()?))
    })
    .await
}

pub async fn fields(State(state): State<AppState>, Path(id): Path<Uuid>) -> FieldsResponse {
    with_editor(&state, id, |editor| Ok((View::Stay, editor.fields()?))).await
}

pub async fn add_metadata(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AddMetadataRequest>,
) -> FieldsResponse {
    with_editor(&state, id, move |editor| {
        let view = editor.add_metadata(&req.type_name, &req.value)?;
        Ok((view, editor.fields()?))
    })
    .await
}

pub async fn update_metadata(
    State(state): State<AppState>,
    Path((id, index)): Path<(Uuid, usize)>,
    Json(req): Json<UpdateMetadataRequest>,
) -> FieldsResponse {
    with_editor(&state, id, move |editor| {
        let view = editor.update_metadata(index, &req.value)?;
        Ok((view, editor.fields()?))
    })
    .await
}

pub async fn delete_metadata(State(state): State<AppState>, Path((id, index)): Path<(Uuid, usize)>) -> FieldsResponse {
    with_editor(&state, id, move |editor| {
        let view = editor.delete_metadata(index)?;
        Ok((view, editor.fields()?))
    })
    .await
}

pub async fn add_person(State(state): State<AppState>, Path(id): Path<Uuid>, Json(person): Json<NewPerson>) -> FieldsResponse {
    with_editor(&state, id, move |editor| {
        let view = editor.add_person(person)?;
        Ok((view, editor.fields()?))
    })
    .await
}

pub async fn delete_person(State(state): State<AppState>, Path((id, index)): Path<(Uuid, usize)>) -> FieldsResponse {
    with_editor(&state, id, move |editor| {
        let view = editor.delete_person(index)?;
        Ok((view, editor.fields()?))
    })
    .await
}
