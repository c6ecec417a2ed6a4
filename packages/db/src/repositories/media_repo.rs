//! References to uploaded media blobs.

use serde::{Deserialize, Serialize};
use surrealdb::sql::Thing;

use super::record_key;
use crate::{DbError, get_db};

/// Where a blob lives and what it is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    /// Blob key in the object store.
    pub key: String,
    /// Report or comment id the media belongs to.
    pub owner_id: String,
    pub url: String,
    pub content_type: String,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
struct MediaRecord {
    id: Option<Thing>,
    owner_id: String,
    url: String,
    content_type: String,
    created_at: i64,
}

#[derive(Debug, Clone, Serialize)]
struct MediaContent {
    owner_id: String,
    url: String,
    content_type: String,
    created_at: i64,
}

pub struct MediaRepository;

impl MediaRepository {
    pub async fn record(media: &MediaRef) -> Result<(), DbError> {
        let db = get_db()?;

        let _: Option<MediaRecord> = db
            .create(("media", media.key.clone()))
            .content(MediaContent {
                owner_id: media.owner_id.clone(),
                url: media.url.clone(),
                content_type: media.content_type.clone(),
                created_at: media.created_at,
            })
            .await?;

        Ok(())
    }

    pub async fn get(key: &str) -> Result<Option<MediaRef>, DbError> {
        let db = get_db()?;

        let record: Option<MediaRecord> = db.select(("media", key.to_string())).await?;

        record
            .map(|r| {
                Ok(MediaRef {
                    key: record_key(r.id.as_ref())?,
                    owner_id: r.owner_id,
                    url: r.url,
                    content_type: r.content_type,
                    created_at: r.created_at,
                })
            })
            .transpose()
    }
}
