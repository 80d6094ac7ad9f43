//! Screening and candidate records, scoped to the requesting session.

pub mod candidates;
pub mod handlers;
pub mod index;
pub mod screenings;

pub use candidates::CandidateManager;
pub use index::RecordCache;
pub use screenings::ScreeningManager;
