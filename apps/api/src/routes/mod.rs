pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};

use crate::auth;
use crate::pipeline::handlers as pipeline;
use crate::records::handlers as records;
use crate::scoring::handlers as scoring;
use crate::state::AppState;
use crate::uploads::handlers as uploads;

pub fn build_router(state: AppState, upload_body_limit: usize) -> Router {
    let upload_limit = DefaultBodyLimit::max(upload_body_limit);

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/me", get(auth::handle_me))
        // Screenings
        .route(
            "/api/v1/screenings",
            get(records::handle_list_screenings).post(pipeline::handle_create_screening),
        )
        .route("/api/v1/screenings/stats", get(records::handle_stats))
        .route(
            "/api/v1/screenings/:id",
            get(records::handle_get_screening)
                .patch(records::handle_update_screening)
                .delete(pipeline::handle_delete_screening),
        )
        .route(
            "/api/v1/screenings/:id/candidates",
            get(records::handle_list_candidates).post(records::handle_create_candidate),
        )
        .route(
            "/api/v1/screenings/:id/resumes",
            post(pipeline::handle_upload_resumes).layer(upload_limit.clone()),
        )
        .route(
            "/api/v1/screenings/:id/migrations",
            post(pipeline::handle_retry_migration),
        )
        .route(
            "/api/v1/screenings/:id/analysis",
            get(scoring::handle_analysis_status).post(scoring::handle_start_analysis),
        )
        // Candidates
        .route(
            "/api/v1/candidates/:id",
            get(records::handle_get_candidate)
                .patch(records::handle_update_candidate)
                .delete(records::handle_delete_candidate),
        )
        .route("/api/v1/candidates/:id/status", put(records::handle_update_status))
        // Uploads
        .route(
            "/api/v1/uploads",
            get(uploads::handle_list_uploads)
                .post(uploads::handle_stage_uploads)
                .layer(upload_limit),
        )
        .route(
            "/api/v1/uploads/:id",
            axum::routing::delete(uploads::handle_remove_upload),
        )
        .route(
            "/api/v1/uploads/clear-completed",
            post(uploads::handle_clear_completed),
        )
        .with_state(state)
}
