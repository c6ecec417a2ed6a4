//! Report repository for CRUD operations.

use pigmap_core::{Category, EditToken, Report, ReportChanges, ReportId};
use serde::{Deserialize, Serialize};
use surrealdb::sql::Thing;

use super::record_key;
use crate::{DbError, get_db};

/// Repository for report persistence operations.
pub struct ReportRepository;

/// Internal record type for SurrealDB reads.
#[derive(Debug, Deserialize)]
struct ReportRecord {
    id: Option<Thing>,
    category: Category,
    comment: String,
    count: u32,
    latitude: f64,
    longitude: f64,
    timestamp: i64,
    icon: Option<String>,
    media_url: Option<String>,
}

impl ReportRecord {
    fn into_report(self) -> Result<Report, DbError> {
        Ok(Report {
            id: ReportId::from(record_key(self.id.as_ref())?),
            category: self.category,
            comment: self.comment,
            count: self.count,
            latitude: self.latitude,
            longitude: self.longitude,
            timestamp: self.timestamp,
            icon: self.icon,
            media_url: self.media_url,
        })
    }
}

/// Report content without the record id.
#[derive(Debug, Clone, Serialize)]
struct ReportContent {
    category: Category,
    comment: String,
    count: u32,
    latitude: f64,
    longitude: f64,
    timestamp: i64,
    icon: Option<String>,
    media_url: Option<String>,
}

impl From<&Report> for ReportContent {
    fn from(report: &Report) -> Self {
        Self {
            category: report.category,
            comment: report.comment.clone(),
            count: report.count,
            latitude: report.latitude,
            longitude: report.longitude,
            timestamp: report.timestamp,
            icon: report.icon.clone(),
            media_url: report.media_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct TokenContent {
    report_id: String,
    expires_at: i64,
}

impl ReportRepository {
    /// Create a report together with its edit token in one transaction.
    pub async fn create_with_token(report: &Report, token: &EditToken) -> Result<Report, DbError> {
        let db = get_db()?;

        db.query(
            "BEGIN TRANSACTION; \
             CREATE type::thing('report', $id) CONTENT $report; \
             CREATE type::thing('edit_token', $edit_token) CONTENT $grant; \
             COMMIT TRANSACTION;",
        )
        .bind(("id", report.id.to_string()))
        .bind(("report", ReportContent::from(report)))
        .bind(("edit_token", token.token.clone()))
        .bind(("grant", TokenContent {
            report_id: token.report_id.to_string(),
            expires_at: token.expires_at,
        }))
        .await?
        .check()?;

        tracing::debug!("Created report {}", report.id);
        Ok(report.clone())
    }

    /// Get a report by ID.
    pub async fn get(id: &ReportId) -> Result<Report, DbError> {
        let db = get_db()?;

        let record: Option<ReportRecord> = db.select(("report", id.to_string())).await?;

        record
            .ok_or_else(|| DbError::NotFound(format!("Report not found: {}", id)))?
            .into_report()
    }

    /// Check if a report exists.
    pub async fn exists(id: &ReportId) -> Result<bool, DbError> {
        let db = get_db()?;

        let record: Option<ReportRecord> = db.select(("report", id.to_string())).await?;

        Ok(record.is_some())
    }

    /// List the most recent reports, newest first.
    pub async fn list_recent(limit: usize) -> Result<Vec<Report>, DbError> {
        let db = get_db()?;

        let query = format!("SELECT * FROM report ORDER BY timestamp DESC, id DESC LIMIT {}", limit);
        let mut result = db.query(query).await?;
        let records: Vec<ReportRecord> = result.take(0)?;

        records.into_iter().map(ReportRecord::into_report).collect()
    }

    /// Apply an authenticated edit and return the updated report.
    ///
    /// Only category, count and comment are written.
    pub async fn update_fields(id: &ReportId, changes: &ReportChanges) -> Result<Report, DbError> {
        let db = get_db()?;

        let mut report = Self::get(id).await?;
        report.apply(changes);

        let mut result = db
            .query(
                "UPDATE type::thing('report', $id) SET category = $category, count = $count, comment = $comment RETURN AFTER",
            )
            .bind(("id", id.to_string()))
            .bind(("category", report.category))
            .bind(("count", report.count))
            .bind(("comment", report.comment.clone()))
            .await?;

        let records: Vec<ReportRecord> = result.take(0)?;

        records
            .into_iter()
            .next()
            .ok_or_else(|| DbError::NotFound(format!("Report not found: {}", id)))?
            .into_report()
    }
}
