use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::document::NodeId;
use crate::editor::pages::{PageEntry, PaginateRequest};
use crate::editor::View;
use crate::error::AppResult;
use crate::images::ReconcileReport;
use crate::routes::with_editor;
use crate::state::AppState;
use crate::types::{AssignRangeRequest, EditorResponse, MovePagesRequest, PageIdsRequest, RepresentativeRequest};

type PagesResponse = AppResult<Json<EditorResponse<Vec<PageEntry>>>>;

pub async fn list_pages(State(state): State<AppState>, Path(id): Path<Uuid>) -> PagesResponse {
    with_editor(&state, id, |editor| Ok((View::Stay, editor.pages()?))).await
}

/// Assigns an inclusive page range to an element; returns the assigned pages.
pub async fn assign_range(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AssignRangeRequest>,
) -> AppResult<Json<EditorResponse<Vec<NodeId>>>> {
    with_editor(&state, id, move |editor| {
        let pages = editor.assign_page_range(req.node, &req.first, &req.last)?;
        Ok((View::Stay, pages))
    })
    .await
}

pub async fn assign_from_children(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<EditorResponse<Vec<NodeId>>>> {
    with_editor(&state, id, |editor| Ok((View::Stay, editor.assign_pages_from_children()?))).await
}

pub async fn add_pages(State(state): State<AppState>, Path(id): Path<Uuid>, Json(req): Json<PageIdsRequest>) -> PagesResponse {
    with_editor(&state, id, move |editor| {
        let view = editor.add_pages(&req.pages)?;
        Ok((view, editor.pages()?))
    })
    .await
}

pub async fn remove_pages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<PageIdsRequest>,
) -> PagesResponse {
    with_editor(&state, id, move |editor| {
        let view = editor.remove_pages(&req.pages)?;
        Ok((view, editor.pages()?))
    })
    .await
}

pub async fn paginate(State(state): State<AppState>, Path(id): Path<Uuid>, Json(req): Json<PaginateRequest>) -> PagesResponse {
    with_editor(&state, id, move |editor| {
        let view = editor.paginate(&req)?;
        Ok((view, editor.pages()?))
    })
    .await
}

/// Moves page images up or down; returns the new selection.
pub async fn move_pages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<MovePagesRequest>,
) -> AppResult<Json<EditorResponse<Vec<NodeId>>>> {
    with_editor(&state, id, move |editor| Ok((View::Pagination, editor.move_pages(&req.pages, req.direction)?))).await
}

pub async fn delete_pages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<PageIdsRequest>,
) -> PagesResponse {
    with_editor(&state, id, move |editor| {
        let view = editor.delete_pages(&req.pages)?;
        Ok((view, editor.pages()?))
    })
    .await
}

pub async fn reorder(State(state): State<AppState>, Path(id): Path<Uuid>) -> PagesResponse {
    with_editor(&state, id, |editor| {
        let view = editor.reorder_pagination()?;
        Ok((view, editor.pages()?))
    })
    .await
}

pub async fn reconcile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<EditorResponse<ReconcileReport>>> {
    with_editor(&state, id, |editor| Ok((View::Pagination, editor.reconcile()?))).await
}

pub async fn set_representative(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<RepresentativeRequest>,
) -> PagesResponse {
    with_editor(&state, id, move |editor| {
        let view = editor.set_representative(&req.page)?;
        Ok((view, editor.pages()?))
    })
    .await
}
