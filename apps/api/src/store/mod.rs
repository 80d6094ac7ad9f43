//! Durable record stores.
//!
//! Managers depend on these traits rather than on `PgPool` so they can be
//! exercised against the in-memory store in tests. Every method is a single
//! round trip (or a single transaction) against the backing database.

pub mod postgres;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::candidate::{
    Candidate, CandidateAssessment, CandidateChanges, CandidateStatus, NewCandidate,
};
use crate::models::profile::UserProfile;
use crate::models::screening::{NewScreening, Screening, ScreeningChanges};

pub use postgres::PgStore;

#[async_trait]
pub trait ScreeningStore: Send + Sync {
    /// Newest first.
    async fn list_screenings(&self, owner_id: Uuid) -> Result<Vec<Screening>, AppError>;

    async fn fetch_screening(&self, owner_id: Uuid, id: Uuid)
        -> Result<Option<Screening>, AppError>;

    async fn insert_screening(&self, owner_id: Uuid, new: &NewScreening)
        -> Result<Screening, AppError>;

    /// Returns `None` when no row owned by `owner_id` matched.
    async fn update_screening(
        &self,
        owner_id: Uuid,
        id: Uuid,
        changes: &ScreeningChanges,
    ) -> Result<Option<Screening>, AppError>;

    /// Deletes the screening; its candidates go with it.
    async fn delete_screening(&self, owner_id: Uuid, id: Uuid) -> Result<bool, AppError>;
}

/// Candidate rows. Mutations that change the candidate set or scores also
/// recount the parent screening's `total_candidates` / `processed_candidates`.
#[async_trait]
pub trait CandidateStore: Send + Sync {
    /// Score descending, unscored last, then oldest first.
    async fn list_candidates(&self, screening_id: Uuid) -> Result<Vec<Candidate>, AppError>;

    async fn fetch_candidate(&self, id: Uuid) -> Result<Option<Candidate>, AppError>;

    async fn insert_candidate(
        &self,
        screening_id: Uuid,
        new: &NewCandidate,
    ) -> Result<Candidate, AppError>;

    async fn update_candidate(
        &self,
        id: Uuid,
        changes: &CandidateChanges,
    ) -> Result<Option<Candidate>, AppError>;

    async fn apply_assessment(
        &self,
        id: Uuid,
        assessment: &CandidateAssessment,
    ) -> Result<Option<Candidate>, AppError>;

    /// Moves every candidate of a screening in status `from` to `to`,
    /// returning the updated rows.
    async fn transition_all(
        &self,
        screening_id: Uuid,
        from: CandidateStatus,
        to: CandidateStatus,
    ) -> Result<Vec<Candidate>, AppError>;

    async fn delete_candidate(&self, id: Uuid) -> Result<bool, AppError>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn fetch_profile(&self, id: Uuid) -> Result<Option<UserProfile>, AppError>;
}
