use std::sync::Arc;

use crate::auth::Session;
use crate::config::ScoringSettings;
use crate::errors::AppError;
use crate::intake::IntakeLimits;
use crate::pipeline::ScreeningPipeline;
use crate::records::{CandidateManager, RecordCache, ScreeningManager};
use crate::scoring::{AnalysisJobs, AnalysisRunner, ScoringService};
use crate::storage::BlobStore;
use crate::store::{CandidateStore, ProfileStore, ScreeningStore};
use crate::uploads::UploadCoordinator;

/// Shared application state injected into all route handlers via Axum extractors.
///
/// Managers are not stored here: handlers build them per request around the
/// caller's [`Session`].
#[derive(Clone)]
pub struct AppState {
    pub screening_store: Arc<dyn ScreeningStore>,
    pub candidate_store: Arc<dyn CandidateStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub cache: Arc<RecordCache>,
    pub uploads: UploadCoordinator,
    /// `None` when no scoring service is configured; analysis is then refused.
    pub scoring: Option<Arc<dyn ScoringService>>,
    pub jobs: AnalysisJobs,
    pub scoring_settings: ScoringSettings,
    pub intake_limits: IntakeLimits,
}

impl AppState {
    pub fn screenings(&self, session: &Session) -> ScreeningManager {
        ScreeningManager::new(
            self.screening_store.clone(),
            self.cache.clone(),
            session.clone(),
        )
    }

    pub fn candidates(&self, session: &Session) -> CandidateManager {
        CandidateManager::new(
            self.candidate_store.clone(),
            self.screenings(session),
            self.cache.clone(),
        )
    }

    pub fn pipeline(&self, session: &Session) -> ScreeningPipeline {
        ScreeningPipeline::new(
            self.screenings(session),
            self.candidates(session),
            self.uploads.clone(),
            self.intake_limits,
        )
    }

    pub fn analysis(&self, session: &Session) -> Result<AnalysisRunner, AppError> {
        let scoring = self.scoring.clone().ok_or(AppError::ScoringUnavailable)?;
        Ok(AnalysisRunner::new(
            scoring,
            self.jobs.clone(),
            self.screenings(session),
            self.candidates(session),
            self.blobs.clone(),
            self.scoring_settings,
        ))
    }
}
