//! File intake: classifies a batch of selected resumes before anything is
//! written to storage.
//!
//! Each file is checked in order for type, size, and the per-owner file cap.
//! Type and size violations reject only that file; hitting the cap drops the
//! rest of the batch with a single notice.

use bytes::Bytes;
use serde::Serialize;

pub const PDF_MIME: &str = "application/pdf";
pub const MAX_FILE_BYTES: usize = 10 * 1024 * 1024;
pub const MAX_FILES: usize = 50;

const PDF_SIGNATURE: &[u8] = b"%PDF-";

/// A file received from the client, held in memory until it is uploaded.
#[derive(Debug, Clone)]
pub struct IntakeFile {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl IntakeFile {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IntakeLimits {
    pub max_file_bytes: usize,
    pub max_files: usize,
}

impl Default for IntakeLimits {
    fn default() -> Self {
        Self {
            max_file_bytes: MAX_FILE_BYTES,
            max_files: MAX_FILES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    NotPdf,
    TooLarge,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntakeRejection {
    pub name: String,
    pub reason: RejectionReason,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct IntakeReport {
    pub accepted: Vec<IntakeFile>,
    pub rejected: Vec<IntakeRejection>,
    /// Set once when the file cap cut the batch short.
    pub capacity_notice: Option<String>,
    /// Files silently dropped after the cap was reached.
    pub dropped: usize,
}

/// Classifies `files` given how many files the owner already has in flight.
pub fn classify_batch(
    files: Vec<IntakeFile>,
    already_accepted: usize,
    limits: IntakeLimits,
) -> IntakeReport {
    let mut report = IntakeReport::default();
    let mut files = files.into_iter();

    while let Some(file) = files.next() {
        if let Some(reason) = check_file(&file, limits) {
            let message = match reason {
                RejectionReason::NotPdf => format!("{} is not a PDF file", file.name),
                RejectionReason::TooLarge => format!(
                    "{} exceeds {}MB limit",
                    file.name,
                    limits.max_file_bytes / (1024 * 1024)
                ),
            };
            report.rejected.push(IntakeRejection {
                name: file.name,
                reason,
                message,
            });
            continue;
        }

        if already_accepted + report.accepted.len() >= limits.max_files {
            report.capacity_notice = Some(format!("Maximum {} files allowed", limits.max_files));
            report.dropped = 1 + files.count();
            break;
        }

        report.accepted.push(file);
    }

    report
}

fn check_file(file: &IntakeFile, limits: IntakeLimits) -> Option<RejectionReason> {
    let declared_pdf = file
        .content_type
        .as_deref()
        .map(|ct| ct.split(';').next().unwrap_or("").trim().eq_ignore_ascii_case(PDF_MIME))
        .unwrap_or(false);
    if !declared_pdf {
        return Some(RejectionReason::NotPdf);
    }
    if file.size() > limits.max_file_bytes {
        return Some(RejectionReason::TooLarge);
    }
    if !file.bytes.starts_with(PDF_SIGNATURE) {
        return Some(RejectionReason::NotPdf);
    }
    None
}

#[cfg(test)]
pub(crate) fn pdf_file(name: &str, size: usize) -> IntakeFile {
    let mut data = Vec::with_capacity(size.max(PDF_SIGNATURE.len()));
    data.extend_from_slice(PDF_SIGNATURE);
    data.resize(size.max(PDF_SIGNATURE.len()), b' ');
    IntakeFile {
        name: name.to_string(),
        content_type: Some(PDF_MIME.to_string()),
        bytes: Bytes::from(data),
    }
}
