//! TeamCity REST payloads and conversions into core records

use chrono::{DateTime, Utc};
use cistat_core::{BuildRecord, BuildStatus, CistatError, QueuedBuild, Result};
use serde::Deserialize;
use tracing::warn;

/// Timestamp format used by the TeamCity REST API, e.g. `20240101T120000+0000`
pub const TEAMCITY_DATE_FORMAT: &str = "%Y%m%dT%H%M%S%z";

/// `buildQueue` and `builds` list response
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildList {
    #[serde(default)]
    pub build: Vec<RawBuild>,
}

/// A build entry as serialized by TeamCity
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBuild {
    pub id: i64,
    pub build_type_id: String,
    #[serde(default)]
    pub status: Option<BuildStatus>,
    #[serde(default)]
    pub queued_date: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub finish_date: Option<String>,
}

impl RawBuild {
    pub fn into_queued(self) -> QueuedBuild {
        QueuedBuild {
            id: self.id,
            config_id: self.build_type_id,
        }
    }

    /// Convert a finished build
    ///
    /// Returns `Ok(None)` for builds missing a timestamp; they cannot yield
    /// metrics and are skipped.
    pub fn into_record(self) -> Result<Option<BuildRecord>> {
        let (queued, started, finished) =
            match (&self.queued_date, &self.start_date, &self.finish_date) {
                (Some(q), Some(s), Some(f)) => (q, s, f),
                _ => {
                    warn!(
                        "Skipping build {} ({}): missing queued/start/finish date",
                        self.id, self.build_type_id
                    );
                    return Ok(None);
                }
            };

        Ok(Some(BuildRecord {
            id: self.id,
            queued_at: parse_teamcity_date(queued)?,
            started_at: parse_teamcity_date(started)?,
            finished_at: parse_teamcity_date(finished)?,
            status: self.status.unwrap_or(BuildStatus::Unknown),
            config_id: self.build_type_id,
        }))
    }
}

/// Parse a TeamCity timestamp into UTC
pub fn parse_teamcity_date(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_str(value, TEAMCITY_DATE_FORMAT)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CistatError::CiResponse(format!("Invalid date {:?}: {}", value, e)))
}

/// Format a UTC timestamp for a `sinceDate` locator
pub fn format_teamcity_date(value: DateTime<Utc>) -> String {
    value.format(TEAMCITY_DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_date_with_offset() {
        let dt = parse_teamcity_date("20240101T140000+0200").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        let err = parse_teamcity_date("yesterday").unwrap_err();
        assert!(matches!(err, CistatError::CiResponse(_)));
    }

    #[test]
    fn test_format_date() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        assert_eq!(format_teamcity_date(dt), "20240305T070809+0000");
    }

    #[test]
    fn test_decode_build_list() {
        let json = r#"{
            "count": 1,
            "href": "/app/rest/builds",
            "build": [{
                "id": 42,
                "buildTypeId": "Proj_Build",
                "status": "SUCCESS",
                "queuedDate": "20240101T120000+0000",
                "startDate": "20240101T120010+0000",
                "finishDate": "20240101T120050+0000"
            }]
        }"#;
        let list: BuildList = serde_json::from_str(json).unwrap();
        assert_eq!(list.build.len(), 1);

        let record = list.build[0].clone().into_record().unwrap().unwrap();
        assert_eq!(record.config_id, "Proj_Build");
        assert_eq!(record.status, BuildStatus::Success);
        assert_eq!(record.queue_time_secs(), 10);
        assert_eq!(record.build_time_secs(), 40);
    }

    #[test]
    fn test_empty_queue_has_no_build_key() {
        let list: BuildList = serde_json::from_str(r#"{"count": 0}"#).unwrap();
        assert!(list.build.is_empty());
    }

    #[test]
    fn test_missing_dates_skipped() {
        let raw = RawBuild {
            id: 7,
            build_type_id: "Proj_Build".to_string(),
            status: Some(BuildStatus::Success),
            queued_date: Some("20240101T120000+0000".to_string()),
            start_date: None,
            finish_date: None,
        };
        assert!(raw.into_record().unwrap().is_none());
    }
}
