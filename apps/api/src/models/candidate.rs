use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "candidate_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CandidateStatus {
    New,
    Processing,
    Hire,
    Maybe,
    Reject,
}

impl CandidateStatus {
    pub fn is_decision(self) -> bool {
        matches!(
            self,
            CandidateStatus::Hire | CandidateStatus::Maybe | CandidateStatus::Reject
        )
    }

    /// Whether `self → next` is on the review state machine:
    /// `new → processing → decision`, `new → decision`, and decision overrides.
    /// Advisory only; callers log off-machine moves instead of refusing them.
    pub fn can_move_to(self, next: CandidateStatus) -> bool {
        use CandidateStatus::*;
        match (self, next) {
            (a, b) if a == b => true,
            (New, Processing) => true,
            (New | Processing, d) if d.is_decision() => true,
            (a, b) if a.is_decision() && b.is_decision() => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Candidate {
    pub id: Uuid,
    pub screening_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub score: Option<i32>,
    pub summary: Option<String>,
    pub strengths: Vec<String>,
    pub concerns: Vec<String>,
    pub status: CandidateStatus,
    pub resume_url: Option<String>,
    pub resume_filename: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Ranking order for candidate lists: score descending with unscored
/// candidates last, then oldest first.
pub fn rank_order(a: &Candidate, b: &Candidate) -> Ordering {
    match (a.score, b.score) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.created_at.cmp(&b.created_at))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCandidate {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub resume_url: Option<String>,
    #[serde(default)]
    pub resume_filename: Option<String>,
}

/// User-editable fields. Scores and notes are only written through
/// [`CandidateAssessment`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: Option<CandidateStatus>,
}

impl CandidateChanges {
    pub fn status(status: CandidateStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.phone.is_none() && self.status.is_none()
    }
}

/// Result of the external scoring process for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateAssessment {
    pub score: i32,
    pub summary: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub concerns: Vec<String>,
    /// Status to apply. Set by the scoring runner only while the candidate is
    /// still `processing`, so manual decisions win.
    pub status: Option<CandidateStatus>,
}

/// Candidate name derived from an uploaded resume filename.
pub fn name_from_filename(filename: &str) -> String {
    let trimmed = filename.trim();
    let suffix_at = trimmed.len().saturating_sub(4);
    let stem = match trimmed.get(suffix_at..) {
        Some(ext) if ext.eq_ignore_ascii_case(".pdf") => &trimmed[..suffix_at],
        _ => trimmed,
    };
    if stem.is_empty() {
        "Unnamed candidate".to_string()
    } else {
        stem.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn candidate(score: Option<i32>, age_secs: i64) -> Candidate {
        let created = Utc::now() - Duration::seconds(age_secs);
        Candidate {
            id: Uuid::new_v4(),
            screening_id: Uuid::new_v4(),
            name: "Ada".into(),
            email: None,
            phone: None,
            score,
            summary: None,
            strengths: vec![],
            concerns: vec![],
            status: CandidateStatus::New,
            resume_url: None,
            resume_filename: None,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn test_rank_order_puts_unscored_last() {
        let mut list = vec![
            candidate(None, 30),
            candidate(Some(40), 20),
            candidate(Some(90), 10),
        ];
        list.sort_by(rank_order);
        let scores: Vec<_> = list.iter().map(|c| c.score).collect();
        assert_eq!(scores, vec![Some(90), Some(40), None]);
    }

    #[test]
    fn test_rank_order_ties_break_by_creation() {
        let older = candidate(Some(70), 100);
        let newer = candidate(Some(70), 5);
        let mut list = vec![newer.clone(), older.clone()];
        list.sort_by(rank_order);
        assert_eq!(list[0].id, older.id);
    }

    #[test]
    fn test_status_machine() {
        use CandidateStatus::*;
        assert!(New.can_move_to(Processing));
        assert!(New.can_move_to(Hire));
        assert!(Processing.can_move_to(Reject));
        assert!(Hire.can_move_to(Maybe));
        assert!(Hire.can_move_to(Hire));
        assert!(!Hire.can_move_to(New));
        assert!(!Reject.can_move_to(Processing));
        assert!(!Processing.can_move_to(New));
    }

    #[test]
    fn test_name_from_filename() {
        assert_eq!(name_from_filename("Jane Doe.pdf"), "Jane Doe");
        assert_eq!(name_from_filename("resume.PDF"), "resume");
        assert_eq!(name_from_filename("notes"), "notes");
        assert_eq!(name_from_filename(".pdf"), "Unnamed candidate");
    }
}
