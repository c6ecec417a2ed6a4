//! Edit token lookups.

use pigmap_core::{EditToken, ReportId};
use serde::Deserialize;

use crate::{DbError, get_db};

/// Repository for edit token checks. Tokens are written by
/// [`ReportRepository::create_with_token`](super::ReportRepository::create_with_token).
pub struct EditTokenRepository;

#[derive(Debug, Deserialize)]
struct TokenRecord {
    report_id: String,
    expires_at: i64,
}

impl EditTokenRepository {
    /// Look up a token by its string.
    pub async fn get(token: &str) -> Result<Option<EditToken>, DbError> {
        let db = get_db()?;

        let record: Option<TokenRecord> = db.select(("edit_token", token.to_string())).await?;

        Ok(record.map(|r| EditToken {
            token: token.to_string(),
            report_id: ReportId::from(r.report_id),
            expires_at: r.expires_at,
        }))
    }

    /// True when `token` exists, is bound to `report_id` and has not expired.
    pub async fn verify(token: &str, report_id: &ReportId, now_millis: i64) -> Result<bool, DbError> {
        if token.trim().is_empty() {
            return Ok(false);
        }
        Ok(Self::get(token)
            .await?
            .is_some_and(|t| t.authorizes(report_id, now_millis)))
    }
}
