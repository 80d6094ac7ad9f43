use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{CreatedScreening, MigrationOutcome, ResumeBatchReport};
use crate::auth::Session;
use crate::errors::AppError;
use crate::models::screening::NewScreening;
use crate::state::AppState;
use crate::uploads::handlers::read_files;

#[derive(Deserialize)]
pub struct CreateScreeningRequest {
    #[serde(flatten)]
    pub screening: NewScreening,
    /// Staged temp uploads to turn into candidates.
    #[serde(default)]
    pub upload_ids: Vec<Uuid>,
}

#[derive(Deserialize)]
pub struct MigrationRequest {
    pub upload_ids: Vec<Uuid>,
}

/// POST /api/v1/screenings
pub async fn handle_create_screening(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<CreateScreeningRequest>,
) -> Result<(StatusCode, Json<CreatedScreening>), AppError> {
    let created = state
        .pipeline(&session)
        .create_screening(req.screening, &req.upload_ids)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// POST /api/v1/screenings/:id/resumes
pub async fn handle_upload_resumes(
    State(state): State<AppState>,
    session: Session,
    Path(screening_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<ResumeBatchReport>, AppError> {
    let files = read_files(multipart).await?;
    let report = state
        .pipeline(&session)
        .upload_resumes(screening_id, files)
        .await?;
    Ok(Json(report))
}

/// POST /api/v1/screenings/:id/migrations
pub async fn handle_retry_migration(
    State(state): State<AppState>,
    session: Session,
    Path(screening_id): Path<Uuid>,
    Json(req): Json<MigrationRequest>,
) -> Result<Json<MigrationOutcome>, AppError> {
    if req.upload_ids.is_empty() {
        return Err(AppError::Validation("upload_ids must not be empty".into()));
    }
    let outcome = state
        .pipeline(&session)
        .retry_migration(screening_id, &req.upload_ids)
        .await?;
    Ok(Json(outcome))
}

/// DELETE /api/v1/screenings/:id
pub async fn handle_delete_screening(
    State(state): State<AppState>,
    session: Session,
    Path(screening_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.pipeline(&session).delete_screening(screening_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
