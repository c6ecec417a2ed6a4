//! Multipart uploads and `GET /media/{*key}`.

use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use db::repositories::{MediaRef, MediaRepository};
use storage::{Storage, media_key};

use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// An uploaded file part.
#[derive(Debug)]
pub struct Upload {
    pub file_name: Option<String>,
    pub content_type: String,
    pub bytes: Bytes,
}

/// A multipart body holding one JSON part and an optional `media` file.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub json: Option<String>,
    pub media: Option<Upload>,
}

impl UploadForm {
    /// Read every part. `json_field` names the part carrying the JSON payload;
    /// unknown parts are skipped and an empty `media` part counts as absent.
    pub async fn read(mut multipart: Multipart, json_field: &str) -> Result<Self, ApiError> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some(n) if n == json_field => form.json = Some(field.text().await?),
                Some("media") => {
                    let file_name = field.file_name().map(str::to_string);
                    let content_type = field
                        .content_type()
                        .unwrap_or(DEFAULT_CONTENT_TYPE)
                        .to_string();
                    let bytes = field.bytes().await?;
                    if !bytes.is_empty() {
                        form.media = Some(Upload {
                            file_name,
                            content_type,
                            bytes,
                        });
                    }
                }
                other => tracing::debug!("Skipping multipart field {:?}", other),
            }
        }

        Ok(form)
    }
}

/// Write an upload to blob storage. The returned reference still has to be
/// recorded once its owner exists.
pub async fn store_upload(
    storage: &Storage,
    folder: Option<&str>,
    owner_id: &str,
    upload: Upload,
    now_millis: i64,
) -> Result<MediaRef, ApiError> {
    let key = media_key(folder, owner_id, upload.file_name.as_deref());
    let url = storage.put_media(&key, upload.bytes).await?;

    Ok(MediaRef {
        key,
        owner_id: owner_id.to_string(),
        url,
        content_type: upload.content_type,
        created_at: now_millis,
    })
}

/// Record an uploaded blob once its owner is committed. A failure leaves the
/// blob served as `application/octet-stream`; returns false so the caller
/// can answer with a degraded success.
pub(crate) async fn record_media(media: Option<&MediaRef>) -> bool {
    let Some(media) = media else {
        return true;
    };
    match MediaRepository::record(media).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Failed to record media {}: {}", media.key, e);
            false
        }
    }
}

/// `GET /media/{*key}`
pub async fn serve(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    let bytes = state.storage.get_bytes(&key).await?;
    let content_type = MediaRepository::get(&key)
        .await?
        .map(|m| m.content_type)
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

    Ok(([(header::CONTENT_TYPE, content_type)], Body::from(bytes)).into_response())
}
