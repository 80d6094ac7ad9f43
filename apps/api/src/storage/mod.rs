//! Resume blob storage.
//!
//! `BlobStore` is the seam between the upload coordinator and the object
//! store. `S3BlobStore` talks to S3/MinIO; tests use an in-memory store.

pub mod s3;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::AppError;

pub use s3::S3BlobStore;

/// Cache lifetime attached to every uploaded resume, in seconds.
pub const CACHE_CONTROL_SECS: u32 = 3600;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Writes a new object. Fails if `path` already exists.
    async fn upload(&self, path: &str, bytes: Bytes, content_type: &str) -> Result<(), AppError>;

    async fn move_object(&self, from: &str, to: &str) -> Result<(), AppError>;

    async fn remove(&self, paths: &[String]) -> Result<(), AppError>;

    async fn download(&self, path: &str) -> Result<Bytes, AppError>;

    fn public_url(&self, path: &str) -> String;

    /// Inverse of [`BlobStore::public_url`]; `None` for foreign URLs.
    fn path_for_url(&self, url: &str) -> Option<String>;
}

/// Namespace a resume is written into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// No screening exists yet; files wait under `{owner}/temp/`.
    Temp,
    Screening(Uuid),
}

impl Destination {
    pub fn screening_id(self) -> Option<Uuid> {
        match self {
            Destination::Temp => None,
            Destination::Screening(id) => Some(id),
        }
    }
}

/// `{owner_id}/{screening_id | temp}/{unix_millis}_{filename}`
pub fn resume_path(
    owner_id: Uuid,
    destination: Destination,
    filename: &str,
    at: DateTime<Utc>,
) -> String {
    let namespace = match destination {
        Destination::Temp => "temp".to_string(),
        Destination::Screening(id) => id.to_string(),
    };
    format!(
        "{owner_id}/{namespace}/{}_{}",
        at.timestamp_millis(),
        sanitize_filename(filename)
    )
}

/// Replaces path separators and control characters so a filename cannot
/// escape its namespace.
pub fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "resume.pdf".to_string(),
        _ => cleaned,
    }
}
