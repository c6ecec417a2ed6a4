//! Database schema definitions using SurrealQL.

use crate::{DbError, get_db};

/// Initialize the database schema.
///
/// This creates all necessary tables, fields, and indexes.
pub async fn init_schema() -> Result<(), DbError> {
    let db = get_db()?;

    tracing::info!("Initializing database schema...");

    db.query(REPORT_SCHEMA).await?.check()?;
    db.query(EDIT_TOKEN_SCHEMA).await?.check()?;
    db.query(COMMENT_SCHEMA).await?.check()?;
    db.query(MEDIA_SCHEMA).await?.check()?;

    tracing::info!("Database schema initialized");

    Ok(())
}

const REPORT_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS report SCHEMAFULL;

DEFINE FIELD IF NOT EXISTS category ON report TYPE string
    ASSERT $value IN ["cow", "horse", "sheep", "goat", "other"];
DEFINE FIELD IF NOT EXISTS comment ON report TYPE string DEFAULT "";
DEFINE FIELD IF NOT EXISTS count ON report TYPE int DEFAULT 1;
DEFINE FIELD IF NOT EXISTS latitude ON report TYPE float ASSERT $value >= -90 AND $value <= 90;
DEFINE FIELD IF NOT EXISTS longitude ON report TYPE float ASSERT $value >= -180 AND $value <= 180;
DEFINE FIELD IF NOT EXISTS timestamp ON report TYPE int;
DEFINE FIELD IF NOT EXISTS icon ON report TYPE option<string>;
DEFINE FIELD IF NOT EXISTS media_url ON report TYPE option<string>;

DEFINE INDEX IF NOT EXISTS report_timestamp ON report FIELDS timestamp;
"#;

/// Edit tokens are keyed by the token string itself.
const EDIT_TOKEN_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS edit_token SCHEMAFULL;

DEFINE FIELD IF NOT EXISTS report_id ON edit_token TYPE string;
DEFINE FIELD IF NOT EXISTS expires_at ON edit_token TYPE int;

DEFINE INDEX IF NOT EXISTS edit_token_report ON edit_token FIELDS report_id UNIQUE;
"#;

const COMMENT_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS comment SCHEMAFULL;

DEFINE FIELD IF NOT EXISTS report_id ON comment TYPE string;
DEFINE FIELD IF NOT EXISTS content ON comment TYPE string DEFAULT "";
DEFINE FIELD IF NOT EXISTS media_url ON comment TYPE option<string>;
DEFINE FIELD IF NOT EXISTS timestamp ON comment TYPE int;

DEFINE INDEX IF NOT EXISTS comment_report ON comment FIELDS report_id;
DEFINE INDEX IF NOT EXISTS comment_timestamp ON comment FIELDS timestamp;
"#;

/// Media references are keyed by blob key.
const MEDIA_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS media SCHEMAFULL;

DEFINE FIELD IF NOT EXISTS owner_id ON media TYPE string;
DEFINE FIELD IF NOT EXISTS url ON media TYPE string;
DEFINE FIELD IF NOT EXISTS content_type ON media TYPE string;
DEFINE FIELD IF NOT EXISTS created_at ON media TYPE int;

DEFINE INDEX IF NOT EXISTS media_owner ON media FIELDS owner_id;
"#;
