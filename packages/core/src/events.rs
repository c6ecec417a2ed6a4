//! Event types for real-time updates.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Comment, CoreError, Report, ReportId};

/// A committed state change, published by the gateway to the live coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A report was created.
    NewReport(Report),
    /// A report's category, count or comment was edited.
    UpdatedReport(Report),
    /// A comment was added to a report.
    NewComment(Comment),
}

impl DomainEvent {
    const KINDS: [&'static str; 3] = ["new_report", "updated_report", "new_comment"];

    /// Decode an event from its JSON form.
    ///
    /// An unrecognized `kind` is reported separately from a malformed payload.
    pub fn from_json(value: serde_json::Value) -> Result<Self, CoreError> {
        let kind = value
            .get("kind")
            .and_then(|k| k.as_str())
            .ok_or(CoreError::MissingField("kind"))?;
        if !Self::KINDS.contains(&kind) {
            return Err(CoreError::UnknownEventKind(kind.to_string()));
        }
        serde_json::from_value(value).map_err(|e| CoreError::MalformedEvent(e.to_string()))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DomainEvent::NewReport(_) => "new_report",
            DomainEvent::UpdatedReport(_) => "updated_report",
            DomainEvent::NewComment(_) => "new_comment",
        }
    }

    /// The report this event concerns.
    pub fn report_id(&self) -> &ReportId {
        match self {
            DomainEvent::NewReport(report) | DomainEvent::UpdatedReport(report) => &report.id,
            DomainEvent::NewComment(comment) => &comment.report_id,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            DomainEvent::NewReport(report) | DomainEvent::UpdatedReport(report) => {
                report.validate()
            }
            DomainEvent::NewComment(comment) => comment.validate(),
        }
    }

    /// The message relayed to live subscribers for this event.
    pub fn to_live_message(&self) -> LiveMessage {
        match self {
            DomainEvent::NewReport(report) => LiveMessage::New {
                report: report.clone(),
            },
            DomainEvent::UpdatedReport(report) => LiveMessage::Update {
                report: report.clone(),
            },
            DomainEvent::NewComment(comment) => LiveMessage::Comment {
                report_id: comment.report_id.clone(),
                comment: comment.clone(),
            },
        }
    }
}

/// Messages pushed to live subscribers over the streaming connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LiveMessage {
    /// Full cache snapshot, sent once right after subscribing.
    Initial {
        reports: Vec<Report>,
        comments: BTreeMap<ReportId, Vec<Comment>>,
    },
    New {
        report: Report,
    },
    Update {
        report: Report,
    },
    Comment {
        #[serde(rename = "reportId")]
        report_id: ReportId,
        comment: Comment,
    },
}

impl LiveMessage {
    pub fn type_name(&self) -> &'static str {
        match self {
            LiveMessage::Initial { .. } => "initial",
            LiveMessage::New { .. } => "new",
            LiveMessage::Update { .. } => "update",
            LiveMessage::Comment { .. } => "comment",
        }
    }

    pub fn to_frame(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string(self)?)
    }
}
