use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{ResumeUpload, UploadStatus};
use crate::errors::AppError;
use crate::intake::{classify_batch, IntakeFile, IntakeLimits, IntakeRejection, PDF_MIME};
use crate::storage::{resume_path, BlobStore, Destination};

type Registry = HashMap<Uuid, ResumeUpload>;

/// Files accepted from one batch once they have settled, plus what intake
/// turned away.
#[derive(Debug, Default)]
pub struct BatchUpload {
    pub uploads: Vec<ResumeUpload>,
    pub rejected: Vec<IntakeRejection>,
    pub capacity_notice: Option<String>,
}

/// A temp upload that now lives in a screening's namespace.
#[derive(Debug, Clone, Serialize)]
pub struct MigratedResume {
    pub upload_id: Uuid,
    pub filename: String,
    pub storage_path: String,
    pub public_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationFailure {
    pub upload_id: Uuid,
    pub filename: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct MigrationReport {
    pub migrated: Vec<MigratedResume>,
    pub failed: Vec<MigrationFailure>,
}

/// Writes resumes to blob storage and keeps per-owner upload bookkeeping.
#[derive(Clone)]
pub struct UploadCoordinator {
    blobs: Arc<dyn BlobStore>,
    registry: Arc<Mutex<Registry>>,
}

impl UploadCoordinator {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            blobs,
            registry: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Oldest first.
    pub fn list(&self, owner_id: Uuid) -> Vec<ResumeUpload> {
        let mut uploads: Vec<_> = self
            .registry()
            .values()
            .filter(|u| u.owner_id == owner_id)
            .cloned()
            .collect();
        uploads.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        uploads
    }

    pub fn is_busy(&self, owner_id: Uuid) -> bool {
        self.registry()
            .values()
            .any(|u| u.owner_id == owner_id && u.status == UploadStatus::Uploading)
    }

    /// Classifies `files` against the owner's entries for `destination`
    /// (errors included), then uploads the accepted ones concurrently and
    /// returns once all have settled, in input order.
    ///
    /// Counting and reserving happen under one lock, so concurrent batches
    /// cannot overshoot the file cap together. Entries removed while their
    /// upload was running are left out of the result.
    pub async fn upload_batch(
        &self,
        owner_id: Uuid,
        destination: Destination,
        files: Vec<IntakeFile>,
        limits: IntakeLimits,
    ) -> BatchUpload {
        let now = Utc::now();
        let (ids, accepted, mut batch) = {
            let mut registry = self.registry();
            let held = registry
                .values()
                .filter(|u| u.owner_id == owner_id && u.screening_id == destination.screening_id())
                .count();
            let intake = classify_batch(files, held, limits);
            if intake.dropped > 0 {
                debug!("File cap reached for owner {owner_id}; {} files dropped", intake.dropped);
            }
            let ids: Vec<Uuid> = intake
                .accepted
                .iter()
                .map(|file| {
                    let upload = ResumeUpload {
                        id: Uuid::new_v4(),
                        owner_id,
                        screening_id: destination.screening_id(),
                        name: file.name.clone(),
                        size: file.size(),
                        progress: 0,
                        status: UploadStatus::Pending,
                        error: None,
                        storage_path: None,
                        public_url: None,
                        created_at: now,
                        claimed: false,
                    };
                    let id = upload.id;
                    registry.insert(id, upload);
                    id
                })
                .collect();
            let batch = BatchUpload {
                uploads: vec![],
                rejected: intake.rejected,
                capacity_notice: intake.capacity_notice,
            };
            (ids, intake.accepted, batch)
        };

        let mut tasks = JoinSet::new();
        for (id, file) in ids.iter().copied().zip(accepted) {
            self.update(id, |u| u.status = UploadStatus::Uploading);
            let coordinator = self.clone();
            tasks.spawn(async move {
                coordinator.upload_one(owner_id, destination, id, file).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!("Upload task failed: {e}");
            }
        }

        // A task that died never reported back; its entry must not stay busy.
        let mut registry = self.registry();
        batch.uploads = ids
            .iter()
            .filter_map(|id| {
                let upload = registry.get_mut(id)?;
                if !upload.is_settled() {
                    upload.status = UploadStatus::Error;
                    upload.error = Some("Upload interrupted".to_string());
                }
                Some(upload.clone())
            })
            .collect();
        batch
    }

    async fn upload_one(
        &self,
        owner_id: Uuid,
        destination: Destination,
        id: Uuid,
        file: IntakeFile,
    ) {
        let path = resume_path(owner_id, destination, &file.name, Utc::now());
        let result = self.blobs.upload(&path, file.bytes, PDF_MIME).await;

        let still_tracked = {
            let mut registry = self.registry();
            match registry.get_mut(&id) {
                Some(upload) => {
                    match &result {
                        Ok(()) => {
                            upload.status = UploadStatus::Completed;
                            upload.progress = 100;
                            upload.public_url = Some(self.blobs.public_url(&path));
                            upload.storage_path = Some(path.clone());
                        }
                        Err(e) => {
                            upload.status = UploadStatus::Error;
                            upload.error = Some(upload_error_message(e));
                        }
                    }
                    true
                }
                None => false,
            }
        };

        match result {
            Ok(()) if !still_tracked => {
                debug!("Upload {id} was removed mid-flight; deleting {path}");
                self.remove_blob_quietly(&path).await;
            }
            Ok(()) => debug!("Upload {id} stored at {path}"),
            Err(e) => warn!("Upload of {} failed: {e}", file.name),
        }
    }

    /// Forgets an upload and deletes its blob best-effort. An upload that is
    /// being turned into a candidate cannot be removed.
    pub async fn remove(&self, owner_id: Uuid, id: Uuid) -> Result<(), AppError> {
        let removed = {
            let mut registry = self.registry();
            let held = registry
                .get(&id)
                .filter(|u| u.owner_id == owner_id)
                .map(|u| (u.claimed, u.name.clone()));
            match held {
                Some((true, name)) => {
                    return Err(AppError::Conflict(format!("{name} is being added to a screening")));
                }
                Some((false, _)) => registry.remove(&id),
                None => None,
            }
        };
        let upload = removed.ok_or_else(|| AppError::NotFound(format!("Upload {id} not found")))?;

        if let Some(path) = upload.storage_path {
            self.remove_blob_quietly(&path).await;
        }
        Ok(())
    }

    async fn remove_blob_quietly(&self, path: &str) {
        if let Err(e) = self.blobs.remove(&[path.to_string()]).await {
            warn!("Could not delete resume blob {path}: {e}");
        }
    }

    /// Storage path behind a public resume URL.
    pub fn blob_path(&self, url: &str) -> Option<String> {
        self.blobs.path_for_url(url)
    }

    pub async fn remove_blobs(&self, paths: &[String]) -> Result<(), AppError> {
        self.blobs.remove(paths).await
    }

    /// Drops completed entries from bookkeeping. Their blobs stay.
    pub fn clear_completed(&self, owner_id: Uuid) -> usize {
        let mut registry = self.registry();
        let before = registry.len();
        registry.retain(|_, u| {
            !(u.owner_id == owner_id && u.status == UploadStatus::Completed && !u.claimed)
        });
        before - registry.len()
    }

    /// Forgets entries that have been superseded by candidate records.
    pub fn forget(&self, ids: &[Uuid]) {
        let mut registry = self.registry();
        for id in ids {
            registry.remove(id);
        }
    }

    /// Hands claimed entries back so a later migration can pick them up.
    pub fn release(&self, ids: &[Uuid]) {
        let mut registry = self.registry();
        for id in ids {
            if let Some(upload) = registry.get_mut(id) {
                upload.claimed = false;
            }
        }
    }

    /// Drops every entry that belongs to a screening and returns the blobs
    /// they had written.
    pub fn forget_screening(&self, screening_id: Uuid) -> Vec<String> {
        let mut paths = Vec::new();
        self.registry().retain(|_, u| {
            if u.screening_id != Some(screening_id) {
                return true;
            }
            paths.extend(u.storage_path.take());
            false
        });
        paths
    }

    /// Marks a completed upload as being turned into a candidate so no other
    /// migration can take it at the same time.
    fn claim(
        &self,
        owner_id: Uuid,
        screening_id: Uuid,
        upload_id: Uuid,
    ) -> Result<(ResumeUpload, String), MigrationFailure> {
        let mut registry = self.registry();
        let Some(upload) = registry.get_mut(&upload_id).filter(|u| u.owner_id == owner_id) else {
            return Err(MigrationFailure {
                upload_id,
                filename: String::new(),
                reason: "Upload not found".to_string(),
            });
        };
        let fail = |reason: String| MigrationFailure {
            upload_id,
            filename: upload.name.clone(),
            reason,
        };

        let (Some(path), UploadStatus::Completed) = (upload.storage_path.clone(), upload.status)
        else {
            return Err(fail(format!("{} has not finished uploading", upload.name)));
        };
        if upload.screening_id.is_some_and(|sid| sid != screening_id) {
            return Err(fail(format!("{} belongs to another screening", upload.name)));
        }
        if upload.claimed {
            return Err(fail(format!("{} is already being added", upload.name)));
        }
        upload.claimed = true;
        Ok((upload.clone(), path))
    }

    /// Moves completed temp uploads into `screening_id`'s namespace, one at a
    /// time. Uploads already moved into this screening count as migrated, so
    /// a partially failed run can be retried with the same ids.
    ///
    /// Every migrated entry stays claimed until the caller either forgets it
    /// or releases it. Repeated ids are taken once.
    pub async fn migrate(
        &self,
        owner_id: Uuid,
        screening_id: Uuid,
        upload_ids: &[Uuid],
    ) -> MigrationReport {
        let mut report = MigrationReport::default();
        let mut seen = HashSet::new();

        for &upload_id in upload_ids {
            if !seen.insert(upload_id) {
                continue;
            }
            let (upload, from) = match self.claim(owner_id, screening_id, upload_id) {
                Ok(claimed) => claimed,
                Err(failure) => {
                    report.failed.push(failure);
                    continue;
                }
            };

            if upload.screening_id == Some(screening_id) {
                report.migrated.push(MigratedResume {
                    upload_id,
                    filename: upload.name,
                    public_url: self.blobs.public_url(&from),
                    storage_path: from,
                });
                continue;
            }

            let to = resume_path(
                owner_id,
                Destination::Screening(screening_id),
                &upload.name,
                Utc::now(),
            );
            if let Err(e) = self.blobs.move_object(&from, &to).await {
                warn!("Moving {from} into screening {screening_id} failed: {e}");
                self.release(&[upload_id]);
                report.failed.push(MigrationFailure {
                    upload_id,
                    filename: upload.name,
                    reason: upload_error_message(&e),
                });
                continue;
            }

            let public_url = self.blobs.public_url(&to);
            self.update(upload_id, |u| {
                u.screening_id = Some(screening_id);
                u.storage_path = Some(to.clone());
                u.public_url = Some(public_url.clone());
            });
            report.migrated.push(MigratedResume {
                upload_id,
                filename: upload.name,
                storage_path: to,
                public_url,
            });
        }

        info!(
            "Migrated {} of {} uploads into screening {screening_id}",
            report.migrated.len(),
            seen.len()
        );
        report
    }

    fn update(&self, id: Uuid, f: impl FnOnce(&mut ResumeUpload)) {
        if let Some(upload) = self.registry().get_mut(&id) {
            f(upload);
        }
    }
}

fn upload_error_message(e: &AppError) -> String {
    match e {
        AppError::Storage(msg) => msg.clone(),
        other => other.to_string(),
    }
}
