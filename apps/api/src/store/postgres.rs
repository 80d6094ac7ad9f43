use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use super::{CandidateStore, ProfileStore, ScreeningStore};
use crate::errors::AppError;
use crate::models::candidate::{
    Candidate, CandidateAssessment, CandidateChanges, CandidateStatus, NewCandidate,
};
use crate::models::profile::UserProfile;
use crate::models::screening::{NewScreening, Screening, ScreeningChanges};

/// PostgreSQL-backed implementation of every record store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Recomputes the candidate counters of a screening from its candidate rows.
async fn recount_screening(
    tx: &mut Transaction<'_, Postgres>,
    screening_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE screenings SET
            total_candidates = (SELECT COUNT(*) FROM candidates WHERE screening_id = $1),
            processed_candidates = (
                SELECT COUNT(*) FROM candidates WHERE screening_id = $1 AND score IS NOT NULL
            ),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(screening_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl ScreeningStore for PgStore {
    async fn list_screenings(&self, owner_id: Uuid) -> Result<Vec<Screening>, AppError> {
        Ok(sqlx::query_as::<_, Screening>(
            "SELECT * FROM screenings WHERE owner_id = $1 ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn fetch_screening(
        &self,
        owner_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Screening>, AppError> {
        Ok(sqlx::query_as::<_, Screening>(
            "SELECT * FROM screenings WHERE id = $1 AND owner_id = $2",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn insert_screening(
        &self,
        owner_id: Uuid,
        new: &NewScreening,
    ) -> Result<Screening, AppError> {
        let screening = sqlx::query_as::<_, Screening>(
            r#"
            INSERT INTO screenings
                (owner_id, title, job_description, department, location,
                 status, total_candidates, processed_candidates)
            VALUES ($1, $2, $3, $4, $5, 'draft', 0, 0)
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(&new.title)
        .bind(&new.job_description)
        .bind(&new.department)
        .bind(&new.location)
        .fetch_one(&self.pool)
        .await?;

        debug!("Inserted screening {} for owner {owner_id}", screening.id);
        Ok(screening)
    }

    async fn update_screening(
        &self,
        owner_id: Uuid,
        id: Uuid,
        changes: &ScreeningChanges,
    ) -> Result<Option<Screening>, AppError> {
        Ok(sqlx::query_as::<_, Screening>(
            r#"
            UPDATE screenings SET
                title = COALESCE($3, title),
                job_description = COALESCE($4, job_description),
                department = CASE WHEN $5::text IS NULL THEN department
                                  ELSE NULLIF(BTRIM($5), '') END,
                location = CASE WHEN $6::text IS NULL THEN location
                                ELSE NULLIF(BTRIM($6), '') END,
                status = COALESCE($7, status),
                total_candidates = COALESCE($8, total_candidates),
                processed_candidates = COALESCE($9, processed_candidates),
                completed_at = CASE WHEN $7::screening_status = 'completed' THEN NOW()
                                    ELSE completed_at END,
                updated_at = NOW()
            WHERE id = $1 AND owner_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .bind(&changes.title)
        .bind(&changes.job_description)
        .bind(&changes.department)
        .bind(&changes.location)
        .bind(changes.status)
        .bind(changes.total_candidates)
        .bind(changes.processed_candidates)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_screening(&self, owner_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        // candidates.screening_id is ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM screenings WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CandidateStore for PgStore {
    async fn list_candidates(&self, screening_id: Uuid) -> Result<Vec<Candidate>, AppError> {
        Ok(sqlx::query_as::<_, Candidate>(
            r#"
            SELECT * FROM candidates
            WHERE screening_id = $1
            ORDER BY score DESC NULLS LAST, created_at ASC
            "#,
        )
        .bind(screening_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn fetch_candidate(&self, id: Uuid) -> Result<Option<Candidate>, AppError> {
        Ok(sqlx::query_as::<_, Candidate>("SELECT * FROM candidates WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert_candidate(
        &self,
        screening_id: Uuid,
        new: &NewCandidate,
    ) -> Result<Candidate, AppError> {
        let mut tx = self.pool.begin().await?;
        let candidate = sqlx::query_as::<_, Candidate>(
            r#"
            INSERT INTO candidates
                (screening_id, name, email, phone, resume_url, resume_filename, status)
            VALUES ($1, $2, $3, $4, $5, $6, 'new')
            RETURNING *
            "#,
        )
        .bind(screening_id)
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.phone)
        .bind(&new.resume_url)
        .bind(&new.resume_filename)
        .fetch_one(&mut *tx)
        .await?;
        recount_screening(&mut tx, screening_id).await?;
        tx.commit().await?;

        debug!("Inserted candidate {} into screening {screening_id}", candidate.id);
        Ok(candidate)
    }

    async fn update_candidate(
        &self,
        id: Uuid,
        changes: &CandidateChanges,
    ) -> Result<Option<Candidate>, AppError> {
        Ok(sqlx::query_as::<_, Candidate>(
            r#"
            UPDATE candidates SET
                name = COALESCE($2, name),
                email = CASE WHEN $3::text IS NULL THEN email ELSE NULLIF(BTRIM($3), '') END,
                phone = CASE WHEN $4::text IS NULL THEN phone ELSE NULLIF(BTRIM($4), '') END,
                status = COALESCE($5, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.email)
        .bind(&changes.phone)
        .bind(changes.status)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn apply_assessment(
        &self,
        id: Uuid,
        assessment: &CandidateAssessment,
    ) -> Result<Option<Candidate>, AppError> {
        let mut tx = self.pool.begin().await?;
        let candidate = sqlx::query_as::<_, Candidate>(
            r#"
            UPDATE candidates SET
                score = $2,
                summary = $3,
                strengths = $4,
                concerns = $5,
                status = COALESCE($6, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(assessment.score.clamp(0, 100))
        .bind(&assessment.summary)
        .bind(&assessment.strengths)
        .bind(&assessment.concerns)
        .bind(assessment.status)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(c) = &candidate {
            recount_screening(&mut tx, c.screening_id).await?;
        }
        tx.commit().await?;
        Ok(candidate)
    }

    async fn transition_all(
        &self,
        screening_id: Uuid,
        from: CandidateStatus,
        to: CandidateStatus,
    ) -> Result<Vec<Candidate>, AppError> {
        Ok(sqlx::query_as::<_, Candidate>(
            r#"
            UPDATE candidates SET status = $3, updated_at = NOW()
            WHERE screening_id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(screening_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn delete_candidate(&self, id: Uuid) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;
        let screening_id: Option<Uuid> =
            sqlx::query_scalar("DELETE FROM candidates WHERE id = $1 RETURNING screening_id")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        if let Some(screening_id) = screening_id {
            recount_screening(&mut tx, screening_id).await?;
        }
        tx.commit().await?;
        Ok(screening_id.is_some())
    }
}

#[async_trait]
impl ProfileStore for PgStore {
    async fn fetch_profile(&self, id: Uuid) -> Result<Option<UserProfile>, AppError> {
        Ok(sqlx::query_as::<_, UserProfile>("SELECT * FROM profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }
}
