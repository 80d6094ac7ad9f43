use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::client::{CandidateResult, JobStatus, ScoringError, ScoringRequest, ScoringService};
use super::documents::build_documents;
use crate::config::ScoringSettings;
use crate::errors::AppError;
use crate::models::candidate::{CandidateAssessment, CandidateStatus};
use crate::models::screening::{Screening, ScreeningChanges, ScreeningStatus};
use crate::records::{CandidateManager, ScreeningManager};
use crate::storage::BlobStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisState {
    Submitting,
    Running,
    Completed,
    Failed,
}

impl AnalysisState {
    pub fn is_active(self) -> bool {
        matches!(self, AnalysisState::Submitting | AnalysisState::Running)
    }
}

/// Latest analysis run of one screening.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisJob {
    pub screening_id: Uuid,
    pub job_id: Option<String>,
    pub state: AnalysisState,
    pub submitted_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// Process-wide registry of analysis runs, keyed by screening.
#[derive(Clone, Default)]
pub struct AnalysisJobs {
    inner: Arc<Mutex<HashMap<Uuid, AnalysisJob>>>,
}

impl AnalysisJobs {
    fn jobs(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, AnalysisJob>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, screening_id: Uuid) -> Option<AnalysisJob> {
        self.jobs().get(&screening_id).cloned()
    }

    /// Claims the screening for a new run; fails while one is active.
    fn begin(&self, screening_id: Uuid) -> Result<AnalysisJob, AppError> {
        let mut jobs = self.jobs();
        if jobs.get(&screening_id).is_some_and(|j| j.state.is_active()) {
            return Err(AppError::Conflict(format!(
                "Analysis is already running for screening {screening_id}"
            )));
        }
        let job = AnalysisJob {
            screening_id,
            job_id: None,
            state: AnalysisState::Submitting,
            submitted_at: Utc::now(),
            finished_at: None,
            error: None,
        };
        jobs.insert(screening_id, job.clone());
        Ok(job)
    }

    fn running(&self, screening_id: Uuid, job_id: &str) -> Option<AnalysisJob> {
        let mut jobs = self.jobs();
        let job = jobs.get_mut(&screening_id)?;
        job.job_id = Some(job_id.to_string());
        job.state = AnalysisState::Running;
        Some(job.clone())
    }

    fn finish(&self, screening_id: Uuid, state: AnalysisState, error: Option<String>) {
        if let Some(job) = self.jobs().get_mut(&screening_id) {
            job.state = state;
            job.finished_at = Some(Utc::now());
            job.error = error;
        }
    }
}

/// Drives one screening's candidates through the external scoring service.
#[derive(Clone)]
pub struct AnalysisRunner {
    scoring: Arc<dyn ScoringService>,
    jobs: AnalysisJobs,
    screenings: ScreeningManager,
    candidates: CandidateManager,
    blobs: Arc<dyn BlobStore>,
    settings: ScoringSettings,
}

impl AnalysisRunner {
    pub fn new(
        scoring: Arc<dyn ScoringService>,
        jobs: AnalysisJobs,
        screenings: ScreeningManager,
        candidates: CandidateManager,
        blobs: Arc<dyn BlobStore>,
        settings: ScoringSettings,
    ) -> Self {
        Self {
            scoring,
            jobs,
            screenings,
            candidates,
            blobs,
            settings,
        }
    }

    /// Submits the screening for scoring and starts tracking the job in the
    /// background.
    pub async fn start(&self, screening_id: Uuid) -> Result<AnalysisJob, AppError> {
        let screening = self.screenings.get(screening_id).await?;
        if self.candidates.list(screening_id).await?.is_empty() {
            return Err(AppError::Validation(
                "Add at least one candidate before running analysis".into(),
            ));
        }
        self.jobs.begin(screening_id)?;

        let job_id = match self.submit(&screening).await {
            Ok(job_id) => job_id,
            Err(e) => {
                self.fail(screening_id, &e.to_string()).await;
                return Err(e);
            }
        };

        let job = self
            .jobs
            .running(screening_id, &job_id)
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("analysis job vanished")))?;
        info!("Scoring job {job_id} started for screening {screening_id}");

        let runner = self.clone();
        tokio::spawn(async move { runner.track(screening_id, job_id).await });
        Ok(job)
    }

    async fn submit(&self, screening: &Screening) -> Result<String, AppError> {
        self.candidates.mark_processing(screening.id).await?;
        self.screenings
            .update(screening.id, ScreeningChanges::status(ScreeningStatus::Processing))
            .await?;

        let candidates = self.candidates.list(screening.id).await?;
        let request = ScoringRequest {
            screening_id: screening.id,
            title: screening.title.clone(),
            job_description: screening.job_description.clone(),
            candidates: build_documents(&self.blobs, &candidates).await,
        };
        Ok(self.scoring.submit(&request).await?)
    }

    /// Polls until the job finishes or the poll budget runs out.
    pub async fn track(&self, screening_id: Uuid, job_id: String) {
        for poll in 1..=self.settings.max_polls {
            tokio::time::sleep(self.settings.poll_interval).await;

            let report = match self.scoring.poll(&job_id).await {
                Ok(report) => report,
                Err(e) => {
                    warn!("Poll {poll} of scoring job {job_id} failed: {e}");
                    continue;
                }
            };

            match report.status {
                JobStatus::Queued | JobStatus::Running => continue,
                JobStatus::Completed => {
                    if let Err(e) = self.complete(screening_id, &report.results).await {
                        error!("Applying results of scoring job {job_id} failed: {e}");
                        self.fail(screening_id, &e.to_string()).await;
                    }
                    return;
                }
                JobStatus::Failed => {
                    let reason = report.error.unwrap_or_else(|| "no reason given".to_string());
                    let e = ScoringError::JobFailed(reason);
                    warn!("Scoring job {job_id} for screening {screening_id} failed: {e}");
                    self.fail(screening_id, &e.to_string()).await;
                    return;
                }
            }
        }

        let e = ScoringError::TimedOut {
            polls: self.settings.max_polls,
        };
        warn!("Scoring job {job_id} for screening {screening_id}: {e}");
        self.fail(screening_id, &e.to_string()).await;
    }

    async fn complete(
        &self,
        screening_id: Uuid,
        results: &[CandidateResult],
    ) -> Result<(), AppError> {
        let mut applied = 0;
        for result in results {
            let current = match self.candidates.get(result.candidate_id).await {
                Ok(c) if c.screening_id == screening_id => c,
                Ok(_) | Err(AppError::NotFound(_)) => {
                    warn!(
                        "Skipping result for unknown candidate {} in screening {screening_id}",
                        result.candidate_id
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };

            // A decision made while the job ran is kept.
            let status = (current.status == CandidateStatus::Processing)
                .then(|| CandidateStatus::from(result.recommendation));
            let assessment = CandidateAssessment {
                score: result.score,
                summary: result.summary.clone(),
                strengths: result.strengths.clone(),
                concerns: result.concerns.clone(),
                status,
            };
            self.candidates.apply_assessment(current.id, &assessment).await?;
            applied += 1;
        }

        self.candidates.reset_processing(screening_id).await?;
        self.screenings
            .update(screening_id, ScreeningChanges::status(ScreeningStatus::Completed))
            .await?;
        self.jobs.finish(screening_id, AnalysisState::Completed, None);
        info!("Scoring applied to {applied} candidates of screening {screening_id}");
        Ok(())
    }

    /// Marks the run failed and hands `processing` candidates back to review.
    async fn fail(&self, screening_id: Uuid, reason: &str) {
        if let Err(e) = self
            .screenings
            .update(screening_id, ScreeningChanges::status(ScreeningStatus::Failed))
            .await
        {
            error!("Could not mark screening {screening_id} failed: {e}");
        }
        if let Err(e) = self.candidates.reset_processing(screening_id).await {
            error!("Could not reset candidates of screening {screening_id}: {e}");
        }
        self.jobs
            .finish(screening_id, AnalysisState::Failed, Some(reason.to_string()));
    }
}
