//! Resume uploads in flight.
//!
//! Uploads live only in memory: they are created when files are accepted,
//! tracked through `pending → uploading → completed | error`, and forgotten
//! once a candidate supersedes them or the user removes them.

pub mod coordinator;
pub mod handlers;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

pub use coordinator::{MigrationFailure, UploadCoordinator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Uploading,
    Completed,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResumeUpload {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub screening_id: Option<Uuid>,
    pub name: String,
    pub size: usize,
    pub progress: u8,
    pub status: UploadStatus,
    pub error: Option<String>,
    pub storage_path: Option<String>,
    pub public_url: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Held by a migration while the upload becomes a candidate.
    #[serde(skip)]
    pub claimed: bool,
}

impl ResumeUpload {
    pub fn is_settled(&self) -> bool {
        matches!(self.status, UploadStatus::Completed | UploadStatus::Error)
    }
}
