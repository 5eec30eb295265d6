use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::db::{self, ProcessRow};
use crate::document::{DigitalDocument, TITLE};
use crate::error::{validation, AppError, AppResult, OptionExt};
use crate::routes::blocking;
use crate::state::AppState;
use crate::types::{CreateProcessRequest, ListQuery};

/// Registers a process and writes its initial metadata file.
pub async fn create_process(
    State(state): State<AppState>,
    Json(req): Json<CreateProcessRequest>,
) -> AppResult<(StatusCode, Json<ProcessRow>)> {
    validation::validate_title(&req.title)?;
    if db::find_process_by_title(&state.db, &req.title).await?.is_some() {
        return Err(AppError::Conflict(format!("Process '{}' already exists", req.title)));
    }

    let rulesets = state.rulesets.clone();
    let ruleset_name = req.ruleset.clone();
    let requested_type = req.logical_type.clone();
    let title = req.title.clone();
    let doc = blocking(move || {
        let ruleset = rulesets.get(&ruleset_name)?;
        let logical_type = match requested_type {
            Some(t) => {
                let top = ruleset.docstruct_type(&t).map(|d| d.top_struct).unwrap_or(false);
                if !top {
                    return Err(AppError::NotAllowed(format!("'{}' is not a top-level structure type", t)));
                }
                t
            }
            None => ruleset
                .docstruct_types()
                .iter()
                .find(|d| d.top_struct)
                .map(|d| d.name.clone())
                .ok_or_else(|| AppError::NotAllowed(format!("ruleset '{}' defines no top-level type", ruleset_name)))?,
        };
        let mut doc = DigitalDocument::with_logical_root(&logical_type);
        if let Some(root) = doc.logical_root() {
            if ruleset.is_metadata_allowed(&logical_type, TITLE) {
                doc.set_value(root, TITLE, &title)?;
            }
        }
        Ok(doc)
    })
    .await?;

    let row = db::insert_process(&state.db, &req.title, &req.ruleset).await?;
    let layout = state.editor_env.settings.layout(row.id, &row.title);
    blocking(move || layout.initialize(&doc).map_err(AppError::from)).await?;

    tracing::info!("Process {} '{}' created with ruleset {}", row.id, row.title, row.ruleset);
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn list_processes(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<ProcessRow>>> {
    validation::validate_positive_number(query.limit, "limit")?;
    let limit = query.limit.unwrap_or(100).min(1000);
    let offset = query.offset.unwrap_or(0).max(0);
    Ok(Json(db::list_processes(&state.db, limit, offset).await?))
}

pub async fn get_process(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<ProcessRow>> {
    let row = db::get_process(&state.db, id).await?.ok_or_not_found("Process")?;
    Ok(Json(row))
}
