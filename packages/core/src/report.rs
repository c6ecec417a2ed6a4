//! Report domain types for geotagged sightings.

use serde::{Deserialize, Serialize};

use crate::{CoreError, ReportId};

/// Largest head count accepted on a single report.
pub const MAX_COUNT: u32 = 1000;

/// Maximum length of any free-text field, in characters.
pub const MAX_TEXT_LEN: usize = 5000;

/// Kind of animal sighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Cow,
    Horse,
    Sheep,
    Goat,
    Other,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Cow,
        Category::Horse,
        Category::Sheep,
        Category::Goat,
        Category::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Cow => "cow",
            Category::Horse => "horse",
            Category::Sheep => "sheep",
            Category::Goat => "goat",
            Category::Other => "other",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| CoreError::InvalidCategory(s.to_string()))
    }
}

/// A user-submitted geotagged sighting.
///
/// `id`, `latitude`, `longitude` and `timestamp` are fixed at creation.
/// Only an authenticated edit may rewrite `category`, `count` and `comment`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: ReportId,
    #[serde(rename = "type")]
    pub category: Category,
    #[serde(default, alias = "description")]
    pub comment: String,
    #[serde(default = "default_count")]
    pub count: u32,
    pub latitude: f64,
    pub longitude: f64,
    /// Creation time in epoch milliseconds.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
}

fn default_count() -> u32 {
    1
}

impl Report {
    /// Create a report with the default count and no comment.
    pub fn new(
        id: impl Into<ReportId>,
        category: Category,
        latitude: f64,
        longitude: f64,
        timestamp: i64,
    ) -> Self {
        Self {
            id: id.into(),
            category,
            comment: String::new(),
            count: 1,
            latitude,
            longitude,
            timestamp,
            icon: None,
            media_url: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    pub fn with_media_url(mut self, url: impl Into<String>) -> Self {
        self.media_url = Some(url.into());
        self
    }

    /// Check the structural invariants of an already-built report.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.id.is_empty() {
            return Err(CoreError::MissingField("report id"));
        }
        validate_position(self.latitude, self.longitude)?;
        validate_count(i64::from(self.count))?;
        validate_text("comment", &self.comment)?;
        Ok(())
    }

    /// Apply an authenticated edit.
    pub fn apply(&mut self, changes: &ReportChanges) {
        self.category = changes.category;
        if let Some(count) = changes.count {
            self.count = count;
        }
        if let Some(comment) = &changes.comment {
            self.comment = comment.clone();
        }
    }

    /// Merge the mutable fields of `other` into `self`.
    ///
    /// Identity, position and creation time are left untouched. Optional
    /// fields are only overwritten when `other` carries a value.
    pub fn merge_from(&mut self, other: &Report) {
        self.category = other.category;
        self.count = other.count;
        self.comment = other.comment.clone();
        if other.icon.is_some() {
            self.icon = other.icon.clone();
        }
        if other.media_url.is_some() {
            self.media_url = other.media_url.clone();
        }
    }
}

/// Check that a position is finite and within WGS84 bounds.
pub fn validate_position(latitude: f64, longitude: f64) -> Result<(), CoreError> {
    let ok = latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude);
    if ok {
        Ok(())
    } else {
        Err(CoreError::InvalidCoordinates {
            latitude,
            longitude,
        })
    }
}

fn validate_count(count: i64) -> Result<u32, CoreError> {
    if (1..=i64::from(MAX_COUNT)).contains(&count) {
        Ok(count as u32)
    } else {
        Err(CoreError::InvalidCount(count))
    }
}

pub(crate) fn validate_text(field: &'static str, text: &str) -> Result<(), CoreError> {
    let len = text.chars().count();
    if len > MAX_TEXT_LEN {
        return Err(CoreError::TooLong {
            field,
            len,
            max: MAX_TEXT_LEN,
        });
    }
    Ok(())
}

/// Report payload as submitted by a client, before validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSubmission {
    #[serde(rename = "type", default)]
    pub category: Option<String>,
    #[serde(default)]
    pub count: Option<i64>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, alias = "description")]
    pub comment: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

impl ReportSubmission {
    /// Validate the submission and turn it into a report.
    pub fn into_report(self, id: ReportId, timestamp: i64) -> Result<Report, CoreError> {
        let category = self
            .category
            .as_deref()
            .ok_or(CoreError::InvalidCategory(String::new()))?
            .parse::<Category>()?;
        let count = validate_count(self.count.unwrap_or(1))?;
        validate_position(self.latitude, self.longitude)?;
        let comment = self.comment.unwrap_or_default();
        validate_text("comment", &comment)?;

        Ok(Report {
            id,
            category,
            comment,
            count,
            latitude: self.latitude,
            longitude: self.longitude,
            timestamp,
            icon: self.icon.filter(|i| !i.trim().is_empty()),
            media_url: None,
        })
    }
}

/// Edit request body for an existing report, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportPatch {
    #[serde(rename = "type", default)]
    pub category: Option<String>,
    #[serde(default)]
    pub count: Option<i64>,
    #[serde(default, alias = "description")]
    pub comment: Option<String>,
}

impl ReportPatch {
    pub fn validate(self) -> Result<ReportChanges, CoreError> {
        let category = self
            .category
            .as_deref()
            .ok_or(CoreError::InvalidCategory(String::new()))?
            .parse::<Category>()?;
        let count = self.count.map(validate_count).transpose()?;
        if let Some(comment) = &self.comment {
            validate_text("comment", comment)?;
        }
        Ok(ReportChanges {
            category,
            count,
            comment: self.comment,
        })
    }
}

/// Validated edit. Absent optional fields are left unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportChanges {
    pub category: Category,
    pub count: Option<u32>,
    pub comment: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(category: &str, count: Option<i64>, lat: f64, lon: f64) -> ReportSubmission {
        ReportSubmission {
            category: Some(category.to_string()),
            count,
            latitude: lat,
            longitude: lon,
            comment: None,
            icon: None,
        }
    }

    #[test]
    fn submission_defaults_count_to_one() {
        let report = submission("cow", None, 39.1, -94.5)
            .into_report(ReportId::from("r1"), 1000)
            .unwrap();
        assert_eq!(report.count, 1);
        assert_eq!(report.category, Category::Cow);
        assert_eq!(report.timestamp, 1000);
    }

    #[test]
    fn submission_rejects_unknown_category() {
        let err = submission("llama", None, 0.0, 0.0)
            .into_report(ReportId::new(), 0)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidCategory(c) if c == "llama"));
    }

    #[test]
    fn submission_rejects_out_of_range_values() {
        assert!(matches!(
            submission("goat", Some(0), 0.0, 0.0).into_report(ReportId::new(), 0),
            Err(CoreError::InvalidCount(0))
        ));
        assert!(matches!(
            submission("goat", Some(1001), 0.0, 0.0).into_report(ReportId::new(), 0),
            Err(CoreError::InvalidCount(1001))
        ));
        assert!(matches!(
            submission("goat", None, 90.5, 0.0).into_report(ReportId::new(), 0),
            Err(CoreError::InvalidCoordinates { .. })
        ));
        assert!(matches!(
            submission("goat", None, 0.0, f64::NAN).into_report(ReportId::new(), 0),
            Err(CoreError::InvalidCoordinates { .. })
        ));
    }

    #[test]
    fn submission_rejects_long_comment() {
        let mut sub = submission("sheep", None, 1.0, 1.0);
        sub.comment = Some("x".repeat(MAX_TEXT_LEN + 1));
        assert!(matches!(
            sub.into_report(ReportId::new(), 0),
            Err(CoreError::TooLong { field: "comment", .. })
        ));
    }

    #[test]
    fn boundary_positions_are_valid() {
        assert!(validate_position(-90.0, -180.0).is_ok());
        assert!(validate_position(90.0, 180.0).is_ok());
        assert!(validate_position(0.0, 180.1).is_err());
    }

    #[test]
    fn wire_shape_uses_type_and_camel_case() {
        let report = Report::new("r1", Category::Cow, 39.1, -94.5, 1000).with_media_url("/media/r1.jpg");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["type"], "cow");
        assert_eq!(json["mediaUrl"], "/media/r1.jpg");
        assert!(json.get("icon").is_none());
    }

    #[test]
    fn minimal_report_deserializes_with_defaults() {
        let report: Report = serde_json::from_str(
            r#"{"id":"r1","type":"cow","latitude":39.1,"longitude":-94.5,"timestamp":1000}"#,
        )
        .unwrap();
        assert_eq!(report.count, 1);
        assert_eq!(report.comment, "");
        assert_eq!(report.media_url, None);
    }

    #[test]
    fn merge_keeps_identity_and_position() {
        let mut cached = Report::new("r1", Category::Cow, 10.0, 20.0, 5).with_media_url("a");
        let mut incoming = Report::new("r1", Category::Horse, 0.0, 0.0, 99)
            .with_count(4)
            .with_comment("actually horses");
        incoming.media_url = None;

        cached.merge_from(&incoming);

        assert_eq!(cached.category, Category::Horse);
        assert_eq!(cached.count, 4);
        assert_eq!(cached.comment, "actually horses");
        assert_eq!((cached.latitude, cached.longitude, cached.timestamp), (10.0, 20.0, 5));
        assert_eq!(cached.media_url.as_deref(), Some("a"));
    }

    #[test]
    fn patch_leaves_absent_fields_unchanged() {
        let mut report = Report::new("r1", Category::Cow, 1.0, 1.0, 1)
            .with_count(3)
            .with_comment("two cows");
        let changes = ReportPatch {
            category: Some("goat".into()),
            count: None,
            comment: None,
        }
        .validate()
        .unwrap();

        report.apply(&changes);

        assert_eq!(report.category, Category::Goat);
        assert_eq!(report.count, 3);
        assert_eq!(report.comment, "two cows");
    }
}
