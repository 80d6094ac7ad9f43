//! Resume text for scoring requests.
//!
//! Extraction is best effort: a resume that cannot be downloaded or parsed is
//! still submitted, with its URL only.

use std::sync::Arc;

use tracing::{debug, warn};

use super::client::CandidateDocument;
use crate::models::candidate::Candidate;
use crate::storage::BlobStore;

/// Upper bound on text sent per resume.
pub const MAX_RESUME_TEXT_CHARS: usize = 20_000;

pub async fn build_documents(
    blobs: &Arc<dyn BlobStore>,
    candidates: &[Candidate],
) -> Vec<CandidateDocument> {
    let mut documents = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let resume_text = match candidate.resume_url.as_deref() {
            Some(url) => resume_text(blobs, url).await,
            None => None,
        };
        documents.push(CandidateDocument {
            candidate_id: candidate.id,
            name: candidate.name.clone(),
            resume_url: candidate.resume_url.clone(),
            resume_text,
        });
    }
    documents
}

async fn resume_text(blobs: &Arc<dyn BlobStore>, url: &str) -> Option<String> {
    let path = blobs.path_for_url(url)?;
    let bytes = match blobs.download(&path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Could not download {path} for scoring: {e}");
            return None;
        }
    };

    // pdf-extract is CPU-bound and can panic on malformed input.
    let extracted =
        tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes)).await;
    match extracted {
        Ok(Ok(text)) => {
            let text = normalize_text(&text, MAX_RESUME_TEXT_CHARS);
            debug!("Extracted {} chars from {path}", text.chars().count());
            (!text.is_empty()).then_some(text)
        }
        Ok(Err(e)) => {
            warn!("No text extracted from {path}: {e}");
            None
        }
        Err(e) => {
            warn!("PDF extraction aborted for {path}: {e}");
            None
        }
    }
}

/// Collapses whitespace runs and cuts the result at `max_chars`.
pub fn normalize_text(text: &str, max_chars: usize) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(max_chars)
        .collect()
}
