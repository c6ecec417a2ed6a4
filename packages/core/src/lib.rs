//! Core domain types for PigMap.
//!
//! This crate contains shared types used across all packages:
//! - Report, Category and EditToken for sightings
//! - Comment for follow-ups on a report
//! - DomainEvent and LiveMessage for real-time updates

mod comment;
mod error;
mod events;
mod ids;
mod report;
mod token;

pub use comment::{Comment, CommentSubmission};
pub use error::CoreError;
pub use events::{DomainEvent, LiveMessage};
pub use ids::{CommentId, ReportId};
pub use report::{
    Category, MAX_COUNT, MAX_TEXT_LEN, Report, ReportChanges, ReportPatch, ReportSubmission,
    validate_position,
};
pub use token::{EditToken, MAX_TOKEN_TTL_DAYS, MIN_TOKEN_TTL_DAYS};

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
