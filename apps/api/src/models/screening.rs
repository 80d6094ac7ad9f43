use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Maximum length of a job description, in characters.
pub const MAX_JOB_DESCRIPTION_CHARS: usize = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "screening_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ScreeningStatus {
    Draft,
    Processing,
    Completed,
    Failed,
}

impl ScreeningStatus {
    /// Draft and processing screenings count as active on the dashboard.
    pub fn is_active(self) -> bool {
        matches!(self, ScreeningStatus::Draft | ScreeningStatus::Processing)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Screening {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub job_description: String,
    pub department: Option<String>,
    pub location: Option<String>,
    pub status: ScreeningStatus,
    pub total_candidates: i32,
    pub processed_candidates: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Insert payload. Status and counters are fixed at `draft` / 0 by the store.
#[derive(Debug, Clone, Deserialize)]
pub struct NewScreening {
    pub title: String,
    pub job_description: String,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

/// Partial update. `None` leaves a column untouched; a blank department or
/// location clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScreeningChanges {
    pub title: Option<String>,
    pub job_description: Option<String>,
    pub department: Option<String>,
    pub location: Option<String>,
    pub status: Option<ScreeningStatus>,
    pub total_candidates: Option<i32>,
    pub processed_candidates: Option<i32>,
}

impl ScreeningChanges {
    pub fn status(status: ScreeningStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.job_description.is_none()
            && self.department.is_none()
            && self.location.is_none()
            && self.status.is_none()
            && self.total_candidates.is_none()
            && self.processed_candidates.is_none()
    }
}

/// Aggregate numbers shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_candidates: i64,
    pub time_saved_minutes: f64,
    pub active_screenings: usize,
    pub total_screenings: usize,
}

/// Manual review time each screened candidate saves, in minutes.
pub const MINUTES_SAVED_PER_CANDIDATE: f64 = 8.5;

impl DashboardStats {
    pub fn from_screenings(screenings: &[Screening]) -> Self {
        let total_candidates: i64 = screenings
            .iter()
            .map(|s| i64::from(s.total_candidates))
            .sum();
        Self {
            total_candidates,
            time_saved_minutes: total_candidates as f64 * MINUTES_SAVED_PER_CANDIDATE,
            active_screenings: screenings.iter().filter(|s| s.status.is_active()).count(),
            total_screenings: screenings.len(),
        }
    }
}

/// Trims a value and maps blank strings to `None`.
pub fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
