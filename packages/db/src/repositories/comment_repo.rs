//! Comment repository. Comments are append-only.

use pigmap_core::{Comment, CommentId, ReportId};
use serde::{Deserialize, Serialize};
use surrealdb::sql::Thing;

use super::record_key;
use crate::{DbError, get_db};

pub struct CommentRepository;

#[derive(Debug, Deserialize)]
struct CommentRecord {
    id: Option<Thing>,
    report_id: String,
    content: String,
    media_url: Option<String>,
    timestamp: i64,
}

impl CommentRecord {
    fn into_comment(self) -> Result<Comment, DbError> {
        Ok(Comment {
            id: CommentId::from(record_key(self.id.as_ref())?),
            report_id: ReportId::from(self.report_id),
            content: self.content,
            media_url: self.media_url,
            timestamp: self.timestamp,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
struct CommentContent {
    report_id: String,
    content: String,
    media_url: Option<String>,
    timestamp: i64,
}

impl CommentRepository {
    /// Store a new comment. The caller checks that the parent report exists.
    pub async fn create(comment: &Comment) -> Result<Comment, DbError> {
        let db = get_db()?;

        let content = CommentContent {
            report_id: comment.report_id.to_string(),
            content: comment.content.clone(),
            media_url: comment.media_url.clone(),
            timestamp: comment.timestamp,
        };

        let record: Option<CommentRecord> = db
            .create(("comment", comment.id.to_string()))
            .content(content)
            .await?;

        record
            .ok_or_else(|| DbError::Query("Failed to create comment".into()))?
            .into_comment()
    }

    /// All comments on a report, newest first.
    pub async fn list_for_report(report_id: &ReportId) -> Result<Vec<Comment>, DbError> {
        let db = get_db()?;

        let mut result = db
            .query("SELECT * FROM comment WHERE report_id = $report_id ORDER BY timestamp DESC, id DESC")
            .bind(("report_id", report_id.to_string()))
            .await?;

        let records: Vec<CommentRecord> = result.take(0)?;

        records.into_iter().map(CommentRecord::into_comment).collect()
    }
}
