use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::index::RecordCache;
use crate::auth::Session;
use crate::errors::AppError;
use crate::models::screening::{
    non_blank, DashboardStats, NewScreening, Screening, ScreeningChanges,
    MAX_JOB_DESCRIPTION_CHARS,
};
use crate::store::ScreeningStore;

/// Screening records of one owner.
///
/// Reads come from the shared index once the owner's list has been loaded;
/// every acknowledged write is applied to the index directly.
#[derive(Clone)]
pub struct ScreeningManager {
    store: Arc<dyn ScreeningStore>,
    cache: Arc<RecordCache>,
    session: Session,
}

impl ScreeningManager {
    pub fn new(store: Arc<dyn ScreeningStore>, cache: Arc<RecordCache>, session: Session) -> Self {
        Self {
            store,
            cache,
            session,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn owner(&self) -> Uuid {
        self.session.owner_id
    }

    /// Newest first.
    pub async fn list(&self) -> Result<Vec<Screening>, AppError> {
        match self.cache.screenings.snapshot(self.owner()) {
            Some(mut screenings) => {
                screenings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                Ok(screenings)
            }
            None => self.refresh().await,
        }
    }

    /// Full refetch of the owner's screenings.
    pub async fn refresh(&self) -> Result<Vec<Screening>, AppError> {
        let read_at = self.cache.screenings.generation(self.owner());
        let screenings = self.store.list_screenings(self.owner()).await?;
        if !self
            .cache
            .screenings
            .replace_scope(self.owner(), read_at, &screenings)
        {
            debug!("Screenings of owner {} changed during refetch; left stale", self.owner());
        }
        Ok(screenings)
    }

    pub async fn get(&self, id: Uuid) -> Result<Screening, AppError> {
        if let Some(s) = self.cache.screenings.get(id) {
            return if s.owner_id == self.owner() {
                Ok(s)
            } else {
                Err(not_found(id))
            };
        }
        let screening = self
            .store
            .fetch_screening(self.owner(), id)
            .await?
            .ok_or_else(|| not_found(id))?;
        self.cache.screenings.upsert(screening.clone());
        Ok(screening)
    }

    /// Re-reads a single screening, e.g. after its candidate counters moved.
    pub async fn reload(&self, id: Uuid) -> Result<Screening, AppError> {
        match self.store.fetch_screening(self.owner(), id).await? {
            Some(screening) => {
                self.cache.screenings.upsert(screening.clone());
                Ok(screening)
            }
            None => {
                self.mark_missing(id);
                Err(not_found(id))
            }
        }
    }

    pub async fn create(&self, new: NewScreening) -> Result<Screening, AppError> {
        let new = validate_new(new)?;
        let screening = self.store.insert_screening(self.owner(), &new).await?;
        self.cache.screenings.upsert(screening.clone());
        info!(
            "Created screening {} ({:?}) for owner {}",
            screening.id,
            screening.title,
            self.owner()
        );
        Ok(screening)
    }

    pub async fn update(&self, id: Uuid, changes: ScreeningChanges) -> Result<Screening, AppError> {
        let changes = validate_changes(changes)?;
        if changes.is_empty() {
            return self.get(id).await;
        }

        if changes.total_candidates.is_some() || changes.processed_candidates.is_some() {
            let current = self.get(id).await?;
            let total = changes.total_candidates.unwrap_or(current.total_candidates);
            let processed = changes
                .processed_candidates
                .unwrap_or(current.processed_candidates);
            if total < 0 || processed < 0 || processed > total {
                return Err(AppError::Validation(format!(
                    "processed_candidates ({processed}) must be between 0 and \
                     total_candidates ({total})"
                )));
            }
        }

        match self.store.update_screening(self.owner(), id, &changes).await? {
            Some(screening) => {
                self.cache.screenings.upsert(screening.clone());
                Ok(screening)
            }
            None => {
                self.mark_missing(id);
                Err(not_found(id))
            }
        }
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        if self.store.delete_screening(self.owner(), id).await? {
            self.cache.screenings.remove(id);
            self.cache.candidates.drop_scope(id);
            info!("Deleted screening {id} for owner {}", self.owner());
            Ok(())
        } else {
            self.mark_missing(id);
            Err(not_found(id))
        }
    }

    pub async fn stats(&self) -> Result<DashboardStats, AppError> {
        Ok(DashboardStats::from_screenings(&self.list().await?))
    }

    /// The store no longer has a row the index may still hold: drop it and
    /// force the owner's next list to refetch.
    fn mark_missing(&self, id: Uuid) {
        if let Some(stale) = self.cache.screenings.remove(id) {
            warn!(
                "Screening {id} vanished from the store; invalidating index for owner {}",
                stale.owner_id
            );
            self.cache.screenings.invalidate(stale.owner_id);
            self.cache.candidates.drop_scope(id);
        }
    }
}

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Screening {id} not found"))
}

fn validate_job_description(jd: &str) -> Result<String, AppError> {
    let jd = jd.trim();
    if jd.is_empty() {
        return Err(AppError::Validation("Please enter a job description".into()));
    }
    let chars = jd.chars().count();
    if chars > MAX_JOB_DESCRIPTION_CHARS {
        return Err(AppError::Validation(format!(
            "Job description is {chars} characters; the limit is {MAX_JOB_DESCRIPTION_CHARS}"
        )));
    }
    Ok(jd.to_string())
}

fn validate_title(title: &str) -> Result<String, AppError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("Please enter a job title".into()));
    }
    Ok(title.to_string())
}

fn validate_new(new: NewScreening) -> Result<NewScreening, AppError> {
    Ok(NewScreening {
        title: validate_title(&new.title)?,
        job_description: validate_job_description(&new.job_description)?,
        department: new.department.as_deref().and_then(non_blank),
        location: new.location.as_deref().and_then(non_blank),
    })
}

fn validate_changes(changes: ScreeningChanges) -> Result<ScreeningChanges, AppError> {
    Ok(ScreeningChanges {
        title: changes.title.as_deref().map(validate_title).transpose()?,
        job_description: changes
            .job_description
            .as_deref()
            .map(validate_job_description)
            .transpose()?,
        ..changes
    })
}
