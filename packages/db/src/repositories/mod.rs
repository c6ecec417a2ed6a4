//! Repository implementations for database operations.

mod comment_repo;
mod media_repo;
mod report_repo;
mod token_repo;

pub use comment_repo::CommentRepository;
pub use media_repo::{MediaRef, MediaRepository};
pub use report_repo::ReportRepository;
pub use token_repo::EditTokenRepository;

/// Raw key of a SurrealDB record id.
pub(crate) fn record_key(id: Option<&surrealdb::sql::Thing>) -> Result<String, crate::DbError> {
    id.map(|t| t.id.to_raw())
        .ok_or_else(|| crate::DbError::Query("Record is missing its id".into()))
}
