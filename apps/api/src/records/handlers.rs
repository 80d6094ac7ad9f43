use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::Session;
use crate::errors::AppError;
use crate::models::candidate::{Candidate, CandidateChanges, CandidateStatus, NewCandidate};
use crate::models::screening::{DashboardStats, Screening, ScreeningChanges};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub refresh: bool,
}

/// Fields a user may edit. Status and counters belong to the scoring job.
#[derive(Deserialize)]
pub struct UpdateScreeningRequest {
    pub title: Option<String>,
    pub job_description: Option<String>,
    pub department: Option<String>,
    pub location: Option<String>,
}

impl From<UpdateScreeningRequest> for ScreeningChanges {
    fn from(req: UpdateScreeningRequest) -> Self {
        ScreeningChanges {
            title: req.title,
            job_description: req.job_description,
            department: req.department,
            location: req.location,
            ..ScreeningChanges::default()
        }
    }
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: CandidateStatus,
}

/// GET /api/v1/screenings
pub async fn handle_list_screenings(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Screening>>, AppError> {
    let screenings = state.screenings(&session);
    let list = if query.refresh {
        screenings.refresh().await?
    } else {
        screenings.list().await?
    };
    Ok(Json(list))
}

/// GET /api/v1/screenings/stats
pub async fn handle_stats(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<DashboardStats>, AppError> {
    Ok(Json(state.screenings(&session).stats().await?))
}

/// GET /api/v1/screenings/:id
pub async fn handle_get_screening(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<Screening>, AppError> {
    Ok(Json(state.screenings(&session).get(id).await?))
}

/// PATCH /api/v1/screenings/:id
pub async fn handle_update_screening(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateScreeningRequest>,
) -> Result<Json<Screening>, AppError> {
    let updated = state.screenings(&session).update(id, req.into()).await?;
    Ok(Json(updated))
}

/// GET /api/v1/screenings/:id/candidates
pub async fn handle_list_candidates(
    State(state): State<AppState>,
    session: Session,
    Path(screening_id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Candidate>>, AppError> {
    let candidates = state.candidates(&session);
    let list = if query.refresh {
        candidates.refresh(screening_id).await?
    } else {
        candidates.list(screening_id).await?
    };
    Ok(Json(list))
}

/// POST /api/v1/screenings/:id/candidates
pub async fn handle_create_candidate(
    State(state): State<AppState>,
    session: Session,
    Path(screening_id): Path<Uuid>,
    Json(req): Json<NewCandidate>,
) -> Result<(StatusCode, Json<Candidate>), AppError> {
    let candidate = state.candidates(&session).create(screening_id, req).await?;
    Ok((StatusCode::CREATED, Json(candidate)))
}

/// GET /api/v1/candidates/:id
pub async fn handle_get_candidate(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<Candidate>, AppError> {
    Ok(Json(state.candidates(&session).get(id).await?))
}

/// PATCH /api/v1/candidates/:id
pub async fn handle_update_candidate(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(changes): Json<CandidateChanges>,
) -> Result<Json<Candidate>, AppError> {
    Ok(Json(state.candidates(&session).update(id, changes).await?))
}

/// PUT /api/v1/candidates/:id/status
pub async fn handle_update_status(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<Candidate>, AppError> {
    let candidate = state
        .candidates(&session)
        .update_status(id, req.status)
        .await?;
    Ok(Json(candidate))
}

/// DELETE /api/v1/candidates/:id
pub async fn handle_delete_candidate(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.candidates(&session).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
