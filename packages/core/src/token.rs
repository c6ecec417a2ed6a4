//! Capability tokens that authorize a later edit of one report.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ReportId;

pub const MIN_TOKEN_TTL_DAYS: u32 = 7;
pub const MAX_TOKEN_TTL_DAYS: u32 = 30;

/// Edit token bound to exactly one report.
///
/// The token string is shown to the submitter once, in the create response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditToken {
    pub token: String,
    pub report_id: ReportId,
    /// Expiry in epoch milliseconds.
    pub expires_at: i64,
}

impl EditToken {
    /// Issue a fresh random token. `ttl_days` is clamped to the supported range.
    pub fn issue(report_id: ReportId, ttl_days: u32, now_millis: i64) -> Self {
        let days = ttl_days.clamp(MIN_TOKEN_TTL_DAYS, MAX_TOKEN_TTL_DAYS);
        Self {
            token: Uuid::new_v4().to_string(),
            report_id,
            expires_at: now_millis + Duration::days(i64::from(days)).num_milliseconds(),
        }
    }

    pub fn authorizes(&self, report_id: &ReportId, now_millis: i64) -> bool {
        &self.report_id == report_id && self.expires_at > now_millis
    }
}
