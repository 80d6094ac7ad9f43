//! Client for the external scoring service.
//!
//! A job is submitted once per analysis run and then polled until it reports
//! `completed` or `failed`. Transient failures (429 and 5xx) are retried with
//! exponential backoff on every call.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::candidate::CandidateStatus;

const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Gave up after {retries} retries")]
    Exhausted { retries: u32 },

    #[error("Scoring job failed: {0}")]
    JobFailed(String),

    #[error("Scoring job did not finish after {polls} polls")]
    TimedOut { polls: u32 },
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoringRequest {
    pub screening_id: Uuid,
    pub title: String,
    pub job_description: String,
    pub candidates: Vec<CandidateDocument>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateDocument {
    pub candidate_id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    job_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Hire,
    Maybe,
    Reject,
}

impl From<Recommendation> for CandidateStatus {
    fn from(r: Recommendation) -> Self {
        match r {
            Recommendation::Hire => CandidateStatus::Hire,
            Recommendation::Maybe => CandidateStatus::Maybe,
            Recommendation::Reject => CandidateStatus::Reject,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateResult {
    pub candidate_id: Uuid,
    pub score: i32,
    pub summary: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub concerns: Vec<String>,
    pub recommendation: Recommendation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub status: JobStatus,
    #[serde(default)]
    pub results: Vec<CandidateResult>,
    #[serde(default)]
    pub error: Option<String>,
}

#[async_trait]
pub trait ScoringService: Send + Sync {
    /// Returns the job id assigned by the service.
    async fn submit(&self, request: &ScoringRequest) -> Result<String, ScoringError>;

    async fn poll(&self, job_id: &str) -> Result<JobReport, ScoringError>;
}

#[derive(Clone)]
pub struct HttpScoringClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpScoringClient {
    pub fn new(base_url: String, api_key: Option<String>) -> Result<Self, ScoringError> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn send_with_retry<T, F>(&self, build: F) -> Result<T, ScoringError>
    where
        T: serde::de::DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let mut last_error: Option<ScoringError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // 1s, 2s
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "Scoring call attempt {attempt} failed, retrying after {}ms...",
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let mut request = build();
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }

            let response = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(ScoringError::Http(e));
                    continue;
                }
            };

            let status = response.status();
            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("Scoring service returned {status}: {body}");
                last_error = Some(ScoringError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }
            if !status.is_success() {
                return Err(ScoringError::Api {
                    status: status.as_u16(),
                    message: response.text().await.unwrap_or_default(),
                });
            }

            return Ok(response.json().await?);
        }

        Err(last_error.unwrap_or(ScoringError::Exhausted {
            retries: MAX_RETRIES,
        }))
    }
}

#[async_trait]
impl ScoringService for HttpScoringClient {
    async fn submit(&self, request: &ScoringRequest) -> Result<String, ScoringError> {
        let url = format!("{}/v1/jobs", self.base_url);
        let submitted: SubmitResponse = self
            .send_with_retry(|| self.client.post(&url).json(request))
            .await?;
        debug!(
            "Submitted {} candidates of screening {} as job {}",
            request.candidates.len(),
            request.screening_id,
            submitted.job_id
        );
        Ok(submitted.job_id)
    }

    async fn poll(&self, job_id: &str) -> Result<JobReport, ScoringError> {
        let url = format!("{}/v1/jobs/{job_id}", self.base_url);
        self.send_with_retry(|| self.client.get(&url)).await
    }
}
