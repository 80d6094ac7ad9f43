//! Shared fixtures for unit and router tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::auth::Session;
use crate::config::ScoringSettings;
use crate::intake::IntakeLimits;
use crate::models::candidate::NewCandidate;
use crate::models::screening::NewScreening;
use crate::pipeline::ScreeningPipeline;
use crate::records::{CandidateManager, RecordCache, ScreeningManager};
use crate::scoring::client::{JobReport, JobStatus, ScoringError, ScoringRequest, ScoringService};
use crate::scoring::{AnalysisJobs, AnalysisRunner};
use crate::state::AppState;
use crate::storage::memory::MemoryBlobStore;
use crate::store::memory::MemoryStore;
use crate::uploads::UploadCoordinator;

pub fn new_screening(title: &str, job_description: &str) -> NewScreening {
    NewScreening {
        title: title.to_string(),
        job_description: job_description.to_string(),
        department: None,
        location: None,
    }
}

pub fn new_candidate(name: &str) -> NewCandidate {
    NewCandidate {
        name: name.to_string(),
        ..NewCandidate::default()
    }
}

/// In-memory wiring of every component, sharing one store, blob store,
/// index and upload registry.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub cache: Arc<RecordCache>,
    pub uploads: UploadCoordinator,
    pub jobs: AnalysisJobs,
    pub scoring_settings: ScoringSettings,
    pub session: Session,
}

impl Harness {
    pub fn new() -> Self {
        let blobs = Arc::new(MemoryBlobStore::default());
        Self {
            store: Arc::new(MemoryStore::default()),
            uploads: UploadCoordinator::new(blobs.clone()),
            blobs,
            cache: Arc::new(RecordCache::default()),
            jobs: AnalysisJobs::default(),
            scoring_settings: ScoringSettings {
                poll_interval: Duration::from_secs(1),
                max_polls: 5,
            },
            session: Session {
                owner_id: Uuid::new_v4(),
                email: "hr@example.com".to_string(),
            },
        }
    }

    pub fn other_session() -> Session {
        Session {
            owner_id: Uuid::new_v4(),
            email: "someone-else@example.com".to_string(),
        }
    }

    pub fn screenings(&self, session: &Session) -> ScreeningManager {
        ScreeningManager::new(self.store.clone(), self.cache.clone(), session.clone())
    }

    pub fn candidates(&self, session: &Session) -> CandidateManager {
        CandidateManager::new(self.store.clone(), self.screenings(session), self.cache.clone())
    }

    pub fn pipeline(&self, session: &Session) -> ScreeningPipeline {
        ScreeningPipeline::new(
            self.screenings(session),
            self.candidates(session),
            self.uploads.clone(),
            IntakeLimits::default(),
        )
    }

    pub fn runner(&self, session: &Session, scoring: Arc<ScriptedScoring>) -> AnalysisRunner {
        AnalysisRunner::new(
            scoring,
            self.jobs.clone(),
            self.screenings(session),
            self.candidates(session),
            self.blobs.clone(),
            self.scoring_settings,
        )
    }

    pub fn state(&self, scoring: Option<Arc<ScriptedScoring>>) -> AppState {
        AppState {
            screening_store: self.store.clone(),
            candidate_store: self.store.clone(),
            profiles: self.store.clone(),
            blobs: self.blobs.clone(),
            cache: self.cache.clone(),
            uploads: self.uploads.clone(),
            scoring: scoring.map(|s| s as Arc<dyn ScoringService>),
            jobs: self.jobs.clone(),
            scoring_settings: self.scoring_settings,
            intake_limits: IntakeLimits::default(),
        }
    }
}

/// Scoring service that replays scripted poll reports. Once the script runs
/// out the last report repeats.
pub struct ScriptedScoring {
    script: Mutex<VecDeque<Result<JobReport, ScoringError>>>,
    last: Mutex<Option<JobReport>>,
    submitted: Mutex<Vec<ScoringRequest>>,
    polls: AtomicUsize,
    reject_submissions: bool,
}

impl ScriptedScoring {
    pub fn new(script: Vec<Result<JobReport, ScoringError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            submitted: Mutex::new(vec![]),
            polls: AtomicUsize::new(0),
            reject_submissions: false,
        })
    }

    pub fn rejecting_submissions() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            last: Mutex::new(None),
            submitted: Mutex::new(vec![]),
            polls: AtomicUsize::new(0),
            reject_submissions: true,
        })
    }

    pub fn submitted(&self) -> Vec<ScoringRequest> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScoringService for ScriptedScoring {
    async fn submit(&self, request: &ScoringRequest) -> Result<String, ScoringError> {
        if self.reject_submissions {
            return Err(ScoringError::Api {
                status: 500,
                message: "scoring backend down".into(),
            });
        }
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(request.clone());
        Ok(format!("job-{}", submitted.len()))
    }

    async fn poll(&self, _job_id: &str) -> Result<JobReport, ScoringError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(report)) => {
                *self.last.lock().unwrap() = Some(report.clone());
                Ok(report)
            }
            Some(Err(e)) => Err(e),
            None => Ok(self.last.lock().unwrap().clone().unwrap_or(JobReport {
                status: JobStatus::Running,
                results: vec![],
                error: None,
            })),
        }
    }
}
