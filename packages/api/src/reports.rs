//! Handlers for `/api/reports` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/api/reports` | Optional `?limit=N`, newest first |
//! | `POST` | `/api/reports` | Multipart: `report` JSON part, optional `media` file |
//! | `PUT`  | `/api/reports/{id}` | Body: `{"report":{...},"editToken":"..."}` |

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use db::repositories::{EditTokenRepository, ReportRepository};
use pigmap_core::{DomainEvent, EditToken, Report, ReportId, ReportPatch, ReportSubmission, now_millis};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::live::publish_event;
use crate::media::{UploadForm, record_media, store_upload};
use crate::state::AppState;

const TOKEN_NOTICE: &str =
    "Keep this token to edit your report. This is the only time you will see it!";

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
}

/// `GET /api/reports[?limit=N]`
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Report>>, ApiError> {
    let limit = state.policy.list_limit(params.limit);
    Ok(Json(ReportRepository::list_recent(limit).await?))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReportResponse {
    pub success: bool,
    pub id: ReportId,
    pub edit_token: String,
    pub message: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
}

/// `POST /api/reports`
pub async fn create(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = UploadForm::read(multipart, "report").await?;
    let json = form
        .json
        .ok_or_else(|| ApiError::BadRequest("Missing report data".into()))?;
    let submission: ReportSubmission = serde_json::from_str(&json)
        .map_err(|e| ApiError::BadRequest(format!("Invalid report data: {}", e)))?;

    let now = now_millis();
    let mut report = submission.into_report(ReportId::new(), now)?;
    let token = EditToken::issue(report.id.clone(), state.policy.edit_token_ttl_days, now);

    let media = match form.media {
        Some(upload) => {
            Some(store_upload(&state.storage, None, report.id.as_str(), upload, now).await?)
        }
        None => None,
    };
    if let Some(media) = &media {
        report.media_url = Some(media.url.clone());
    }

    ReportRepository::create_with_token(&report, &token).await?;
    tracing::info!("Created report {} ({})", report.id, report.category);

    let published = publish_event(&state.coordinator, DomainEvent::NewReport(report.clone())).await;
    let degraded = !(record_media(media.as_ref()).await && published);
    let status = if degraded {
        StatusCode::ACCEPTED
    } else {
        StatusCode::CREATED
    };

    Ok((
        status,
        Json(CreateReportResponse {
            success: true,
            id: report.id,
            edit_token: token.token,
            message: TOKEN_NOTICE.to_string(),
            degraded,
        }),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReportRequest {
    pub report: ReportPatch,
    #[serde(default)]
    pub edit_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdateReportResponse {
    pub success: bool,
    pub report: Report,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
}

/// `PUT /api/reports/{id}`
///
/// Checked in order: token present (401), report exists (404), token valid
/// for this report and unexpired (403), payload valid (400).
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateReportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = ReportId::from(id);
    let token = body
        .edit_token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Edit token required".into()))?;

    if !ReportRepository::exists(&id).await? {
        return Err(ApiError::NotFound(format!("Report {} not found", id)));
    }
    if !EditTokenRepository::verify(&token, &id, now_millis()).await? {
        return Err(ApiError::Forbidden("Invalid or expired token".into()));
    }

    let changes = body.report.validate()?;
    let report = ReportRepository::update_fields(&id, &changes).await?;
    tracing::info!("Updated report {}", report.id);

    let degraded =
        !publish_event(&state.coordinator, DomainEvent::UpdatedReport(report.clone())).await;
    let status = if degraded {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(UpdateReportResponse {
            success: true,
            report,
            degraded,
        }),
    ))
}
