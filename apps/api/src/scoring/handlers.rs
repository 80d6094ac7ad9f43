use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::AnalysisJob;
use crate::auth::Session;
use crate::errors::AppError;
use crate::state::AppState;

/// POST /api/v1/screenings/:id/analysis
pub async fn handle_start_analysis(
    State(state): State<AppState>,
    session: Session,
    Path(screening_id): Path<Uuid>,
) -> Result<(StatusCode, Json<AnalysisJob>), AppError> {
    let job = state.analysis(&session)?.start(screening_id).await?;
    Ok((StatusCode::ACCEPTED, Json(job)))
}

/// GET /api/v1/screenings/:id/analysis
pub async fn handle_analysis_status(
    State(state): State<AppState>,
    session: Session,
    Path(screening_id): Path<Uuid>,
) -> Result<Json<AnalysisJob>, AppError> {
    state.screenings(&session).get(screening_id).await?;
    state
        .jobs
        .get(screening_id)
        .map(Json)
        .ok_or_else(|| {
            AppError::NotFound(format!("No analysis has run for screening {screening_id}"))
        })
}
