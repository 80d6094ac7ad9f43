//! Candidate scoring through the external scoring service.

pub mod client;
pub mod documents;
pub mod handlers;
pub mod runner;

pub use client::{HttpScoringClient, ScoringService};
pub use runner::{AnalysisJob, AnalysisJobs, AnalysisRunner};
