//! Screening pipeline: the multi-step flows that span uploads, screenings
//! and candidates.
//!
//! Nothing here is transactional. Each step commits on its own and partial
//! progress is reported back so the caller can retry only what failed.

pub mod handlers;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::Session;
use crate::errors::AppError;
use crate::intake::{IntakeFile, IntakeLimits, IntakeRejection};
use crate::models::candidate::{name_from_filename, Candidate, NewCandidate};
use crate::models::screening::{NewScreening, Screening};
use crate::records::{CandidateManager, ScreeningManager};
use crate::storage::Destination;
use crate::uploads::{MigrationFailure, ResumeUpload, UploadCoordinator, UploadStatus};

/// Result of staging files into the temp namespace.
#[derive(Debug, Serialize)]
pub struct StageReport {
    pub uploads: Vec<ResumeUpload>,
    pub rejected: Vec<IntakeRejection>,
    pub capacity_notice: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreatedScreening {
    pub screening: Screening,
    pub candidates: Vec<Candidate>,
    /// Uploads that did not become candidates; retry them via migrations.
    pub failed: Vec<MigrationFailure>,
}

#[derive(Debug, Default, Serialize)]
pub struct MigrationOutcome {
    pub candidates: Vec<Candidate>,
    pub failed: Vec<MigrationFailure>,
}

#[derive(Debug, Serialize)]
pub struct ResumeBatchReport {
    pub candidates: Vec<Candidate>,
    pub rejected: Vec<IntakeRejection>,
    pub capacity_notice: Option<String>,
    pub failed: Vec<MigrationFailure>,
}

#[derive(Clone)]
pub struct ScreeningPipeline {
    screenings: ScreeningManager,
    candidates: CandidateManager,
    uploads: UploadCoordinator,
    limits: IntakeLimits,
}

impl ScreeningPipeline {
    pub fn new(
        screenings: ScreeningManager,
        candidates: CandidateManager,
        uploads: UploadCoordinator,
        limits: IntakeLimits,
    ) -> Self {
        Self {
            screenings,
            candidates,
            uploads,
            limits,
        }
    }

    fn session(&self) -> &Session {
        self.screenings.session()
    }

    fn owner(&self) -> Uuid {
        self.session().owner_id
    }

    /// Validates files and uploads the accepted ones to the temp namespace.
    pub async fn stage_uploads(&self, files: Vec<IntakeFile>) -> StageReport {
        let batch = self
            .uploads
            .upload_batch(self.owner(), Destination::Temp, files, self.limits)
            .await;
        StageReport {
            uploads: batch.uploads,
            rejected: batch.rejected,
            capacity_notice: batch.capacity_notice,
        }
    }

    /// Creates the screening, then turns each selected temp upload into a
    /// candidate. Only screening creation can fail the call.
    pub async fn create_screening(
        &self,
        new: NewScreening,
        upload_ids: &[Uuid],
    ) -> Result<CreatedScreening, AppError> {
        let screening = self.screenings.create(new).await?;
        if upload_ids.is_empty() {
            return Ok(CreatedScreening {
                screening,
                candidates: vec![],
                failed: vec![],
            });
        }

        let outcome = self.migrate_into(screening.id, upload_ids).await;
        let screening = self.screenings.get(screening.id).await?;
        if !outcome.failed.is_empty() {
            warn!(
                "Screening {} created with {} of {} resumes; {} failed",
                screening.id,
                outcome.candidates.len(),
                upload_ids.len(),
                outcome.failed.len()
            );
        }
        Ok(CreatedScreening {
            screening,
            candidates: outcome.candidates,
            failed: outcome.failed,
        })
    }

    /// Re-attempts uploads that did not make it into `screening_id`.
    pub async fn retry_migration(
        &self,
        screening_id: Uuid,
        upload_ids: &[Uuid],
    ) -> Result<MigrationOutcome, AppError> {
        self.screenings.get(screening_id).await?;
        Ok(self.migrate_into(screening_id, upload_ids).await)
    }

    async fn migrate_into(&self, screening_id: Uuid, upload_ids: &[Uuid]) -> MigrationOutcome {
        let report = self
            .uploads
            .migrate(self.owner(), screening_id, upload_ids)
            .await;
        let mut outcome = MigrationOutcome {
            candidates: Vec::with_capacity(report.migrated.len()),
            failed: report.failed,
        };

        for resume in report.migrated {
            let new = NewCandidate {
                name: name_from_filename(&resume.filename),
                resume_url: Some(resume.public_url),
                resume_filename: Some(resume.filename.clone()),
                ..NewCandidate::default()
            };
            match self.candidates.create(screening_id, new).await {
                Ok(candidate) => {
                    self.uploads.forget(&[resume.upload_id]);
                    outcome.candidates.push(candidate);
                }
                Err(e) => {
                    warn!("Candidate for {} not created: {e}", resume.filename);
                    self.uploads.release(&[resume.upload_id]);
                    outcome.failed.push(MigrationFailure {
                        upload_id: resume.upload_id,
                        filename: resume.filename,
                        reason: e.to_string(),
                    });
                }
            }
        }
        outcome
    }

    /// Uploads resumes straight into an existing screening and creates a
    /// candidate for each stored file.
    pub async fn upload_resumes(
        &self,
        screening_id: Uuid,
        files: Vec<IntakeFile>,
    ) -> Result<ResumeBatchReport, AppError> {
        self.screenings.get(screening_id).await?;
        let batch = self
            .uploads
            .upload_batch(
                self.owner(),
                Destination::Screening(screening_id),
                files,
                self.limits,
            )
            .await;

        let mut failed = Vec::new();
        let mut stored = Vec::new();
        for upload in batch.uploads {
            match upload.status {
                UploadStatus::Completed => stored.push(upload.id),
                _ => {
                    failed.push(MigrationFailure {
                        upload_id: upload.id,
                        filename: upload.name.clone(),
                        reason: upload
                            .error
                            .clone()
                            .unwrap_or_else(|| "Upload failed".to_string()),
                    });
                    self.uploads.forget(&[upload.id]);
                }
            }
        }

        // Already in the screening's namespace, so this only creates candidates.
        let outcome = self.migrate_into(screening_id, &stored).await;
        failed.extend(outcome.failed);
        info!(
            "Added {} candidates to screening {screening_id} ({} rejected, {} failed)",
            outcome.candidates.len(),
            batch.rejected.len(),
            failed.len()
        );

        Ok(ResumeBatchReport {
            candidates: outcome.candidates,
            rejected: batch.rejected,
            capacity_notice: batch.capacity_notice,
            failed,
        })
    }

    /// Deletes the screening and its candidates, then the stored resumes
    /// best-effort.
    pub async fn delete_screening(&self, screening_id: Uuid) -> Result<(), AppError> {
        let candidates = self.candidates.refresh(screening_id).await?;
        self.screenings.delete(screening_id).await?;
        // Uploads that never became candidates still have blobs in the
        // screening's namespace.
        let mut paths = self.uploads.forget_screening(screening_id);
        paths.extend(
            candidates
                .iter()
                .filter_map(|c| c.resume_url.as_deref())
                .filter_map(|url| self.uploads.blob_path(url)),
        );
        paths.sort();
        paths.dedup();
        if !paths.is_empty() {
            if let Err(e) = self.uploads.remove_blobs(&paths).await {
                warn!("Could not delete resumes of screening {screening_id}: {e}");
            }
        }
        Ok(())
    }
}
