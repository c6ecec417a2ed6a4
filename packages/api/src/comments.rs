//! Handlers for `/api/reports/{id}/comments`.
//!
//! Comments can be posted as multipart (`comment` JSON part plus optional
//! `media` file) or as a plain JSON body.

use axum::{
    Json,
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use db::repositories::{CommentRepository, ReportRepository};
use pigmap_core::{Comment, CommentId, CommentSubmission, DomainEvent, ReportId, now_millis};
use serde::Serialize;

use crate::error::ApiError;
use crate::live::publish_event;
use crate::media::{Upload, UploadForm, record_media, store_upload};
use crate::state::AppState;

/// `GET /api/reports/{id}/comments`
pub async fn list(Path(id): Path<String>) -> Result<Json<Vec<Comment>>, ApiError> {
    let comments = CommentRepository::list_for_report(&ReportId::from(id)).await?;
    Ok(Json(comments))
}

#[derive(Debug, Serialize)]
pub struct CreateCommentResponse {
    pub success: bool,
    pub id: CommentId,
    pub comment: Comment,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
}

fn is_json(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"))
}

async fn read_body(
    request: Request,
    state: &AppState,
) -> Result<(CommentSubmission, Option<Upload>), ApiError> {
    if is_json(&request) {
        let Json(submission) = Json::<CommentSubmission>::from_request(request, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        return Ok((submission, None));
    }

    let multipart = Multipart::from_request(request, state)
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let form = UploadForm::read(multipart, "comment").await?;
    let submission = match form.json {
        Some(json) => serde_json::from_str(&json)
            .map_err(|e| ApiError::BadRequest(format!("Invalid comment data: {}", e)))?,
        None => CommentSubmission::default(),
    };
    Ok((submission, form.media))
}

/// `POST /api/reports/{id}/comments`
pub async fn create(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request: Request,
) -> Result<impl IntoResponse, ApiError> {
    let report_id = ReportId::from(id);
    if !ReportRepository::exists(&report_id).await? {
        return Err(ApiError::NotFound(format!("Report {} not found", report_id)));
    }

    let (submission, upload) = read_body(request, &state).await?;
    let now = now_millis();
    let mut comment = submission.into_comment(CommentId::new(), report_id, now, upload.is_some())?;

    let media = match upload {
        Some(upload) => Some(
            store_upload(&state.storage, Some("comments"), comment.id.as_str(), upload, now)
                .await?,
        ),
        None => None,
    };
    if let Some(media) = &media {
        comment.media_url = Some(media.url.clone());
    }

    CommentRepository::create(&comment).await?;
    tracing::info!("Created comment {} on report {}", comment.id, comment.report_id);

    let published = publish_event(&state.coordinator, DomainEvent::NewComment(comment.clone())).await;
    let degraded = !(record_media(media.as_ref()).await && published);
    let status = if degraded {
        StatusCode::ACCEPTED
    } else {
        StatusCode::CREATED
    };

    Ok((
        status,
        Json(CreateCommentResponse {
            success: true,
            id: comment.id.clone(),
            comment,
            degraded,
        }),
    ))
}
