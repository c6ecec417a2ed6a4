//! Comments attached to a report.

use serde::{Deserialize, Serialize};

use crate::report::validate_text;
use crate::{CommentId, CoreError, ReportId};

/// An append-only follow-up on a report. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub report_id: ReportId,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    /// Creation time in epoch milliseconds.
    pub timestamp: i64,
}

impl Comment {
    pub fn new(
        id: impl Into<CommentId>,
        report_id: impl Into<ReportId>,
        content: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            id: id.into(),
            report_id: report_id.into(),
            content: content.into(),
            media_url: None,
            timestamp,
        }
    }

    pub fn with_media_url(mut self, url: impl Into<String>) -> Self {
        self.media_url = Some(url.into());
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.id.is_empty() {
            return Err(CoreError::MissingField("comment id"));
        }
        if self.report_id.is_empty() {
            return Err(CoreError::MissingField("reportId"));
        }
        validate_text("content", &self.content)
    }
}

/// Comment body as submitted by a client.
///
/// Older clients send the text under `text`, newer ones under `content`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentSubmission {
    #[serde(default, alias = "text")]
    pub content: Option<String>,
}

impl CommentSubmission {
    /// Validate and build the comment. Text may only be empty when media is attached.
    pub fn into_comment(
        self,
        id: CommentId,
        report_id: ReportId,
        timestamp: i64,
        has_media: bool,
    ) -> Result<Comment, CoreError> {
        let content = self.content.unwrap_or_default().trim().to_string();
        if content.is_empty() && !has_media {
            return Err(CoreError::EmptyComment);
        }
        validate_text("content", &content)?;
        Ok(Comment::new(id, report_id, content, timestamp))
    }
}
