use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::ResumeUpload;
use crate::auth::Session;
use crate::errors::AppError;
use crate::intake::IntakeFile;
use crate::pipeline::StageReport;
use crate::state::AppState;

/// Multipart field that carries resume files. Any other field is ignored.
pub const FILES_FIELD: &str = "files";

#[derive(Serialize)]
pub struct UploadListResponse {
    pub uploads: Vec<ResumeUpload>,
    pub busy: bool,
}

#[derive(Serialize)]
pub struct ClearedResponse {
    pub cleared: usize,
}

/// Collects every file part of a multipart body. A part with no declared
/// content type is kept and rejected later by intake.
pub async fn read_files(mut multipart: Multipart) -> Result<Vec<IntakeFile>, AppError> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some(FILES_FIELD) {
            continue;
        }
        let name = field.file_name().unwrap_or("resume.pdf").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes: Bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Could not read {name}: {e}")))?;
        debug!("Received {name} ({} bytes)", bytes.len());
        files.push(IntakeFile {
            name,
            content_type,
            bytes,
        });
    }
    if files.is_empty() {
        return Err(AppError::Validation(format!(
            "No files found in multipart field '{FILES_FIELD}'"
        )));
    }
    Ok(files)
}

/// GET /api/v1/uploads
pub async fn handle_list_uploads(
    State(state): State<AppState>,
    session: Session,
) -> Json<UploadListResponse> {
    Json(UploadListResponse {
        uploads: state.uploads.list(session.owner_id),
        busy: state.uploads.is_busy(session.owner_id),
    })
}

/// POST /api/v1/uploads
pub async fn handle_stage_uploads(
    State(state): State<AppState>,
    session: Session,
    multipart: Multipart,
) -> Result<Json<StageReport>, AppError> {
    let files = read_files(multipart).await?;
    Ok(Json(state.pipeline(&session).stage_uploads(files).await))
}

/// DELETE /api/v1/uploads/:id
pub async fn handle_remove_upload(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.uploads.remove(session.owner_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/uploads/clear-completed
pub async fn handle_clear_completed(
    State(state): State<AppState>,
    session: Session,
) -> Json<ClearedResponse> {
    Json(ClearedResponse {
        cleared: state.uploads.clear_completed(session.owner_id),
    })
}
