use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{CandidateStore, ProfileStore, ScreeningStore};
use crate::errors::AppError;
use crate::models::candidate::{
    rank_order, Candidate, CandidateAssessment, CandidateChanges, CandidateStatus, NewCandidate,
};
use crate::models::profile::UserProfile;
use crate::models::screening::{
    non_blank, NewScreening, Screening, ScreeningChanges, ScreeningStatus,
};

#[derive(Default)]
struct Tables {
    screenings: HashMap<Uuid, Screening>,
    candidates: HashMap<Uuid, Candidate>,
    profiles: HashMap<Uuid, UserProfile>,
}

/// In-memory stand-in for `PgStore`, with the same ordering, cascade and
/// recount behaviour.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    failing_candidate_names: Mutex<HashSet<String>>,
    fail_reads: Mutex<bool>,
    list_delay: Mutex<Duration>,
}

impl MemoryStore {
    pub fn fail_candidate_named(&self, name: &str) {
        self.failing_candidate_names
            .lock()
            .unwrap()
            .insert(name.to_string());
    }

    pub fn clear_failures(&self) {
        self.failing_candidate_names.lock().unwrap().clear();
        *self.fail_reads.lock().unwrap() = false;
    }

    pub fn fail_reads(&self, fail: bool) {
        *self.fail_reads.lock().unwrap() = fail;
    }

    /// Full list reads take their snapshot, then wait this long before
    /// returning it, like a slow query racing other writes.
    pub fn delay_lists(&self, delay: Duration) {
        *self.list_delay.lock().unwrap() = delay;
    }

    async fn wait_list_delay(&self) {
        let delay = *self.list_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    pub fn insert_profile(&self, profile: UserProfile) {
        self.tables
            .lock()
            .unwrap()
            .profiles
            .insert(profile.id, profile);
    }

    /// Deletes a screening behind the managers' back, as another client would.
    pub fn delete_out_of_band(&self, id: Uuid) {
        let mut tables = self.tables.lock().unwrap();
        tables.screenings.remove(&id);
        tables.candidates.retain(|_, c| c.screening_id != id);
    }

    pub fn candidate_count(&self) -> usize {
        self.tables.lock().unwrap().candidates.len()
    }

    fn check_reads(&self) -> Result<(), AppError> {
        if *self.fail_reads.lock().unwrap() {
            return Err(AppError::Internal(anyhow::anyhow!("injected read failure")));
        }
        Ok(())
    }
}

// The three functions below mirror the UPDATE statements in `PgStore`.

fn apply_screening_changes(
    screening: &mut Screening,
    changes: &ScreeningChanges,
    now: DateTime<Utc>,
) {
    if let Some(title) = &changes.title {
        screening.title = title.clone();
    }
    if let Some(jd) = &changes.job_description {
        screening.job_description = jd.clone();
    }
    if let Some(department) = &changes.department {
        screening.department = non_blank(department);
    }
    if let Some(location) = &changes.location {
        screening.location = non_blank(location);
    }
    if let Some(status) = changes.status {
        screening.status = status;
        if status == ScreeningStatus::Completed {
            screening.completed_at = Some(now);
        }
    }
    if let Some(total) = changes.total_candidates {
        screening.total_candidates = total;
    }
    if let Some(processed) = changes.processed_candidates {
        screening.processed_candidates = processed;
    }
    screening.updated_at = now;
}

fn apply_candidate_changes(
    candidate: &mut Candidate,
    changes: &CandidateChanges,
    now: DateTime<Utc>,
) {
    if let Some(name) = &changes.name {
        candidate.name = name.clone();
    }
    if let Some(email) = &changes.email {
        candidate.email = non_blank(email);
    }
    if let Some(phone) = &changes.phone {
        candidate.phone = non_blank(phone);
    }
    if let Some(status) = changes.status {
        candidate.status = status;
    }
    candidate.updated_at = now;
}

fn apply_assessment_to(
    candidate: &mut Candidate,
    assessment: &CandidateAssessment,
    now: DateTime<Utc>,
) {
    candidate.score = Some(assessment.score.clamp(0, 100));
    candidate.summary = Some(assessment.summary.clone());
    candidate.strengths = assessment.strengths.clone();
    candidate.concerns = assessment.concerns.clone();
    if let Some(status) = assessment.status {
        candidate.status = status;
    }
    candidate.updated_at = now;
}

fn recount(tables: &mut Tables, screening_id: Uuid) {
    let (total, processed) = tables
        .candidates
        .values()
        .filter(|c| c.screening_id == screening_id)
        .fold((0, 0), |(t, p), c| (t + 1, p + i32::from(c.score.is_some())));
    if let Some(s) = tables.screenings.get_mut(&screening_id) {
        s.total_candidates = total;
        s.processed_candidates = processed;
        s.updated_at = Utc::now();
    }
}

#[async_trait]
impl ScreeningStore for MemoryStore {
    async fn list_screenings(&self, owner_id: Uuid) -> Result<Vec<Screening>, AppError> {
        self.check_reads()?;
        let mut list: Vec<_> = self
            .tables
            .lock()
            .unwrap()
            .screenings
            .values()
            .filter(|s| s.owner_id == owner_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self.wait_list_delay().await;
        Ok(list)
    }

    async fn fetch_screening(
        &self,
        owner_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Screening>, AppError> {
        self.check_reads()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .screenings
            .get(&id)
            .filter(|s| s.owner_id == owner_id)
            .cloned())
    }

    async fn insert_screening(
        &self,
        owner_id: Uuid,
        new: &NewScreening,
    ) -> Result<Screening, AppError> {
        let now = Utc::now();
        let screening = Screening {
            id: Uuid::new_v4(),
            owner_id,
            title: new.title.clone(),
            job_description: new.job_description.clone(),
            department: new.department.clone(),
            location: new.location.clone(),
            status: ScreeningStatus::Draft,
            total_candidates: 0,
            processed_candidates: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        self.tables
            .lock()
            .unwrap()
            .screenings
            .insert(screening.id, screening.clone());
        Ok(screening)
    }

    async fn update_screening(
        &self,
        owner_id: Uuid,
        id: Uuid,
        changes: &ScreeningChanges,
    ) -> Result<Option<Screening>, AppError> {
        let mut tables = self.tables.lock().unwrap();
        Ok(tables
            .screenings
            .get_mut(&id)
            .filter(|s| s.owner_id == owner_id)
            .map(|s| {
                apply_screening_changes(s, changes, Utc::now());
                s.clone()
            }))
    }

    async fn delete_screening(&self, owner_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let mut tables = self.tables.lock().unwrap();
        let owned = tables
            .screenings
            .get(&id)
            .map(|s| s.owner_id == owner_id)
            .unwrap_or(false);
        if !owned {
            return Ok(false);
        }
        tables.screenings.remove(&id);
        tables.candidates.retain(|_, c| c.screening_id != id);
        Ok(true)
    }
}

#[async_trait]
impl CandidateStore for MemoryStore {
    async fn list_candidates(&self, screening_id: Uuid) -> Result<Vec<Candidate>, AppError> {
        self.check_reads()?;
        let mut list: Vec<_> = self
            .tables
            .lock()
            .unwrap()
            .candidates
            .values()
            .filter(|c| c.screening_id == screening_id)
            .cloned()
            .collect();
        list.sort_by(rank_order);
        self.wait_list_delay().await;
        Ok(list)
    }

    async fn fetch_candidate(&self, id: Uuid) -> Result<Option<Candidate>, AppError> {
        self.check_reads()?;
        Ok(self.tables.lock().unwrap().candidates.get(&id).cloned())
    }

    async fn insert_candidate(
        &self,
        screening_id: Uuid,
        new: &NewCandidate,
    ) -> Result<Candidate, AppError> {
        if self.failing_candidate_names.lock().unwrap().contains(&new.name) {
            return Err(AppError::Internal(anyhow::anyhow!(
                "injected insert failure for {}",
                new.name
            )));
        }
        let mut tables = self.tables.lock().unwrap();
        if !tables.screenings.contains_key(&screening_id) {
            return Err(AppError::Internal(anyhow::anyhow!(
                "foreign key violation: screening {screening_id}"
            )));
        }
        let now = Utc::now();
        let candidate = Candidate {
            id: Uuid::new_v4(),
            screening_id,
            name: new.name.clone(),
            email: new.email.clone(),
            phone: new.phone.clone(),
            score: None,
            summary: None,
            strengths: vec![],
            concerns: vec![],
            status: CandidateStatus::New,
            resume_url: new.resume_url.clone(),
            resume_filename: new.resume_filename.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.candidates.insert(candidate.id, candidate.clone());
        recount(&mut tables, screening_id);
        Ok(candidate)
    }

    async fn update_candidate(
        &self,
        id: Uuid,
        changes: &CandidateChanges,
    ) -> Result<Option<Candidate>, AppError> {
        let mut tables = self.tables.lock().unwrap();
        Ok(tables.candidates.get_mut(&id).map(|c| {
            apply_candidate_changes(c, changes, Utc::now());
            c.clone()
        }))
    }

    async fn apply_assessment(
        &self,
        id: Uuid,
        assessment: &CandidateAssessment,
    ) -> Result<Option<Candidate>, AppError> {
        let mut tables = self.tables.lock().unwrap();
        let updated = tables.candidates.get_mut(&id).map(|c| {
            apply_assessment_to(c, assessment, Utc::now());
            c.clone()
        });
        if let Some(c) = &updated {
            recount(&mut tables, c.screening_id);
        }
        Ok(updated)
    }

    async fn transition_all(
        &self,
        screening_id: Uuid,
        from: CandidateStatus,
        to: CandidateStatus,
    ) -> Result<Vec<Candidate>, AppError> {
        let mut tables = self.tables.lock().unwrap();
        let now = Utc::now();
        Ok(tables
            .candidates
            .values_mut()
            .filter(|c| c.screening_id == screening_id && c.status == from)
            .map(|c| {
                c.status = to;
                c.updated_at = now;
                c.clone()
            })
            .collect())
    }

    async fn delete_candidate(&self, id: Uuid) -> Result<bool, AppError> {
        let mut tables = self.tables.lock().unwrap();
        match tables.candidates.remove(&id) {
            Some(c) => {
                recount(&mut tables, c.screening_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn fetch_profile(&self, id: Uuid) -> Result<Option<UserProfile>, AppError> {
        self.check_reads()?;
        Ok(self.tables.lock().unwrap().profiles.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{new_candidate, new_screening};

    #[tokio::test]
    async fn test_completed_status_stamps_completed_at() {
        let store = MemoryStore::default();
        let owner = Uuid::new_v4();
        let s = store
            .insert_screening(owner, &new_screening("Role", "jd"))
            .await
            .unwrap();
        let done = store
            .update_screening(owner, s.id, &ScreeningChanges::status(ScreeningStatus::Completed))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(done.status, ScreeningStatus::Completed);
        assert!(done.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_blank_department_clears_column() {
        let store = MemoryStore::default();
        let owner = Uuid::new_v4();
        let mut new = new_screening("Role", "jd");
        new.department = Some("Platform".into());
        let s = store.insert_screening(owner, &new).await.unwrap();
        let changes = ScreeningChanges {
            department: Some("   ".into()),
            ..Default::default()
        };
        let updated = store
            .update_screening(owner, s.id, &changes)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.department, None);
    }

    #[tokio::test]
    async fn test_assessment_clamps_score_and_recounts() {
        let store = MemoryStore::default();
        let s = store
            .insert_screening(Uuid::new_v4(), &new_screening("Role", "jd"))
            .await
            .unwrap();
        let c = store
            .insert_candidate(s.id, &new_candidate("Ada"))
            .await
            .unwrap();
        let assessment = CandidateAssessment {
            score: 140,
            summary: "Strong Go background".into(),
            strengths: vec!["Go".into()],
            concerns: vec![],
            status: Some(CandidateStatus::Hire),
        };
        let scored = store
            .apply_assessment(c.id, &assessment)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(scored.score, Some(100));
        assert_eq!(scored.status, CandidateStatus::Hire);
        assert_eq!(scored.strengths, vec!["Go".to_string()]);

        let tables = store.tables.lock().unwrap();
        assert_eq!(tables.screenings[&s.id].processed_candidates, 1);
    }
}
