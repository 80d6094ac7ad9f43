use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::index::RecordCache;
use super::screenings::ScreeningManager;
use crate::errors::AppError;
use crate::models::candidate::{
    rank_order, Candidate, CandidateAssessment, CandidateChanges, CandidateStatus, NewCandidate,
};
use crate::models::screening::non_blank;
use crate::store::CandidateStore;

/// Candidate records, scoped through the session's screenings.
#[derive(Clone)]
pub struct CandidateManager {
    store: Arc<dyn CandidateStore>,
    screenings: ScreeningManager,
    cache: Arc<RecordCache>,
}

impl CandidateManager {
    pub fn new(
        store: Arc<dyn CandidateStore>,
        screenings: ScreeningManager,
        cache: Arc<RecordCache>,
    ) -> Self {
        Self {
            store,
            screenings,
            cache,
        }
    }

    /// Ranked: score descending, unscored last, then oldest first.
    pub async fn list(&self, screening_id: Uuid) -> Result<Vec<Candidate>, AppError> {
        self.screenings.get(screening_id).await?;
        match self.cache.candidates.snapshot(screening_id) {
            Some(mut candidates) => {
                candidates.sort_by(rank_order);
                Ok(candidates)
            }
            None => self.refetch(screening_id).await,
        }
    }

    pub async fn refresh(&self, screening_id: Uuid) -> Result<Vec<Candidate>, AppError> {
        self.screenings.get(screening_id).await?;
        self.refetch(screening_id).await
    }

    async fn refetch(&self, screening_id: Uuid) -> Result<Vec<Candidate>, AppError> {
        let read_at = self.cache.candidates.generation(screening_id);
        let candidates = self.store.list_candidates(screening_id).await?;
        if !self
            .cache
            .candidates
            .replace_scope(screening_id, read_at, &candidates)
        {
            debug!("Candidate list of screening {screening_id} changed during refetch; left stale");
        }
        Ok(candidates)
    }

    pub async fn get(&self, id: Uuid) -> Result<Candidate, AppError> {
        let candidate = match self.cache.candidates.get(id) {
            Some(c) => c,
            None => {
                let c = self
                    .store
                    .fetch_candidate(id)
                    .await?
                    .ok_or_else(|| not_found(id))?;
                self.cache.candidates.upsert(c.clone());
                c
            }
        };
        // Candidates of someone else's screening are reported as missing.
        match self.screenings.get(candidate.screening_id).await {
            Ok(_) => Ok(candidate),
            Err(AppError::NotFound(_)) => Err(not_found(id)),
            Err(e) => Err(e),
        }
    }

    pub async fn create(
        &self,
        screening_id: Uuid,
        new: NewCandidate,
    ) -> Result<Candidate, AppError> {
        self.screenings.get(screening_id).await?;
        let name = new.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("Candidate name is required".into()));
        }
        let new = NewCandidate {
            name,
            email: new.email.as_deref().and_then(non_blank),
            phone: new.phone.as_deref().and_then(non_blank),
            ..new
        };

        let candidate = self.store.insert_candidate(screening_id, &new).await?;
        self.cache.candidates.upsert(candidate.clone());
        self.screenings.reload(screening_id).await?;
        debug!("Created candidate {} in screening {screening_id}", candidate.id);
        Ok(candidate)
    }

    pub async fn update(&self, id: Uuid, changes: CandidateChanges) -> Result<Candidate, AppError> {
        let current = self.get(id).await?;
        if let Some(name) = &changes.name {
            if name.trim().is_empty() {
                return Err(AppError::Validation("Candidate name is required".into()));
            }
        }
        if changes.is_empty() {
            return Ok(current);
        }
        if let Some(next) = changes.status {
            if !current.status.can_move_to(next) {
                warn!(
                    "Candidate {id} moved off the review path: {:?} -> {:?}",
                    current.status, next
                );
            }
        }

        let changes = CandidateChanges {
            name: changes.name.map(|n| n.trim().to_string()),
            ..changes
        };
        match self.store.update_candidate(id, &changes).await? {
            Some(candidate) => {
                self.cache.candidates.upsert(candidate.clone());
                Ok(candidate)
            }
            None => Err(self.mark_missing(&current)),
        }
    }

    pub async fn update_status(
        &self,
        id: Uuid,
        status: CandidateStatus,
    ) -> Result<Candidate, AppError> {
        let candidate = self.update(id, CandidateChanges::status(status)).await?;
        info!("Candidate {id} marked {status:?}");
        Ok(candidate)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let current = self.get(id).await?;
        if !self.store.delete_candidate(id).await? {
            return Err(self.mark_missing(&current));
        }
        self.cache.candidates.remove(id);
        self.screenings.reload(current.screening_id).await?;
        info!("Deleted candidate {id} from screening {}", current.screening_id);
        Ok(())
    }

    /// Writes a scoring result. Only the scoring runner calls this.
    pub async fn apply_assessment(
        &self,
        id: Uuid,
        assessment: &CandidateAssessment,
    ) -> Result<Candidate, AppError> {
        let current = self.get(id).await?;
        match self.store.apply_assessment(id, assessment).await? {
            Some(candidate) => {
                self.cache.candidates.upsert(candidate.clone());
                Ok(candidate)
            }
            None => Err(self.mark_missing(&current)),
        }
    }

    /// Moves every `new` candidate of the screening to `processing`.
    pub async fn mark_processing(&self, screening_id: Uuid) -> Result<Vec<Candidate>, AppError> {
        self.transition_all(screening_id, CandidateStatus::New, CandidateStatus::Processing)
            .await
    }

    /// Returns candidates still `processing` to `new` after a failed or partial run.
    pub async fn reset_processing(&self, screening_id: Uuid) -> Result<Vec<Candidate>, AppError> {
        self.transition_all(screening_id, CandidateStatus::Processing, CandidateStatus::New)
            .await
    }

    async fn transition_all(
        &self,
        screening_id: Uuid,
        from: CandidateStatus,
        to: CandidateStatus,
    ) -> Result<Vec<Candidate>, AppError> {
        self.screenings.get(screening_id).await?;
        let moved = self.store.transition_all(screening_id, from, to).await?;
        for candidate in &moved {
            self.cache.candidates.upsert(candidate.clone());
        }
        Ok(moved)
    }

    fn mark_missing(&self, stale: &Candidate) -> AppError {
        warn!(
            "Candidate {} vanished from the store; invalidating screening {}",
            stale.id, stale.screening_id
        );
        self.cache.candidates.remove(stale.id);
        self.cache.candidates.invalidate(stale.screening_id);
        not_found(stale.id)
    }
}

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Candidate {id} not found"))
}
