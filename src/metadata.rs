//! Video metadata decoding
//!
//! This module turns the body of the `videos/<id>.json` endpoint into the
//! [`VideoMetadata`] record persisted next to each episode.

use crate::api_types::{ApiResponse, ApiVideo};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Layout of the publication timestamp, e.g. `14-03-2025 21:00:00`
pub const PUBLICATION_DATE_FORMAT: &str = "%d-%m-%Y %H:%M:%S";

/// Errors that can occur while decoding video metadata
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    /// The body is not the expected JSON document
    #[error("Failed to parse video metadata: {0}")]
    Malformed(String),

    /// The response decoded fine but contained no video
    #[error("No video metadata found in response")]
    NoItems,

    /// The publication timestamp does not follow `DD-MM-YYYY HH:MM:SS`
    #[error("Invalid publication date {value:?}: {reason}")]
    InvalidDate { value: String, reason: String },
}

/// Essential metadata of a single video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    /// API resource URI
    pub uri: String,
    /// Human-facing page on rtve.es
    pub html_url: String,
    /// Numeric video id
    pub id: String,
    /// Display title
    pub long_title: String,
    /// Publication timestamp in `DD-MM-YYYY HH:MM:SS` format
    pub publication_date: String,
}

impl VideoMetadata {
    /// Decodes a metadata response, keeping only the first item
    ///
    /// # Errors
    ///
    /// Returns `MetadataError::Malformed` when the body is not valid JSON of
    /// the expected shape and `MetadataError::NoItems` when the item list is
    /// empty.
    pub fn parse(body: &str) -> Result<Self, MetadataError> {
        let response: ApiResponse<ApiVideo> =
            serde_json::from_str(body).map_err(|e| MetadataError::Malformed(e.to_string()))?;

        let item = response
            .page
            .items
            .into_iter()
            .next()
            .ok_or(MetadataError::NoItems)?;

        Ok(Self {
            uri: item.uri,
            html_url: item.html_url,
            id: item.id,
            long_title: item.long_title,
            publication_date: item.publication_date,
        })
    }

    /// Parses the publication timestamp
    pub fn published_at(&self) -> Result<NaiveDateTime, MetadataError> {
        parse_publication_date(&self.publication_date)
    }
}

/// Parses a timestamp in the provider's `DD-MM-YYYY HH:MM:SS` format
pub fn parse_publication_date(value: &str) -> Result<NaiveDateTime, MetadataError> {
    NaiveDateTime::parse_from_str(value, PUBLICATION_DATE_FORMAT).map_err(|e| {
        MetadataError::InvalidDate {
            value: value.to_string(),
            reason: e.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const VIDEO_JSON: &str = r#"{
        "page": {
            "items": [{
                "uri": "https://www.rtve.es/api/videos/16492499",
                "htmlUrl": "https://www.rtve.es/play/videos/telediario-2/14-03-25/16492499/",
                "id": "16492499",
                "longTitle": "Telediario - 21 horas - 14/03/25",
                "publicationDate": "14-03-2025 21:00:00",
                "duration": 2713000,
                "language": "es"
            }],
            "number": 1,
            "size": 1,
            "offset": 0,
            "total": 1,
            "totalPages": 1,
            "numElements": 1
        }
    }"#;

    #[test]
    fn test_parse_metadata() {
        let metadata = VideoMetadata::parse(VIDEO_JSON).unwrap();

        assert_eq!(metadata.uri, "https://www.rtve.es/api/videos/16492499");
        assert_eq!(
            metadata.html_url,
            "https://www.rtve.es/play/videos/telediario-2/14-03-25/16492499/"
        );
        assert_eq!(metadata.id, "16492499");
        assert_eq!(metadata.long_title, "Telediario - 21 horas - 14/03/25");
        assert_eq!(metadata.publication_date, "14-03-2025 21:00:00");
    }

    #[test]
    fn test_parse_empty_response() {
        let json = r#"{"page":{"items":[],"number":1,"size":1,"offset":0,"total":0,"totalPages":0,"numElements":0}}"#;
        assert_eq!(VideoMetadata::parse(json), Err(MetadataError::NoItems));
    }

    #[test]
    fn test_parse_malformed_json() {
        let json = r#"{"page":{"items":[{"uri":"https://example.com"]}"#;
        let err = VideoMetadata::parse(json).unwrap_err();
        assert!(matches!(err, MetadataError::Malformed(_)));
        assert!(err.to_string().starts_with("Failed to parse video metadata"));
    }

    #[test]
    fn test_published_at() {
        let metadata = VideoMetadata::parse(VIDEO_JSON).unwrap();
        let expected = NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(21, 0, 0)
            .unwrap();
        assert_eq!(metadata.published_at().unwrap(), expected);
    }

    #[test]
    fn test_invalid_publication_date() {
        let err = parse_publication_date("2025-03-14T21:00:00").unwrap_err();
        assert!(matches!(err, MetadataError::InvalidDate { .. }));
    }

    #[test]
    fn test_serializes_with_provider_field_names() {
        let metadata = VideoMetadata::parse(VIDEO_JSON).unwrap();
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["htmlUrl"], metadata.html_url.as_str());
        assert_eq!(json["longTitle"], metadata.long_title.as_str());
        assert_eq!(json["publicationDate"], "14-03-2025 21:00:00");
    }
}
