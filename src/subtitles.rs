//! Subtitle track listing
//!
//! This module decodes the `videos/<id>/subtitulos.json` endpoint into the
//! list of WebVTT tracks available for a video.

use crate::api_types::{ApiResponse, ApiSubtitle};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while decoding a subtitle listing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubtitleError {
    /// The body is not the expected JSON document
    #[error("Failed to parse subtitle listing: {0}")]
    Malformed(String),
}

/// A single subtitle track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    /// Download URL of the WebVTT file
    pub src: String,
    /// Language code (e.g. `es`)
    pub lang: String,
}

/// All subtitle tracks of one video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtitles {
    /// The video these tracks belong to
    pub video_id: String,
    /// Available tracks, possibly none
    pub tracks: Vec<SubtitleTrack>,
}

impl Subtitles {
    /// Decodes a subtitle listing for the given video
    pub fn parse(video_id: &str, body: &str) -> Result<Self, SubtitleError> {
        let response: ApiResponse<ApiSubtitle> =
            serde_json::from_str(body).map_err(|e| SubtitleError::Malformed(e.to_string()))?;

        let tracks = response
            .page
            .items
            .into_iter()
            .map(|item| SubtitleTrack {
                src: item.src,
                lang: item.lang,
            })
            .collect();

        Ok(Self {
            video_id: video_id.to_string(),
            tracks,
        })
    }

    /// Returns true when the video has no subtitle tracks
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// Returns the English name of a language code, or the code itself
pub fn language_name(code: &str) -> &str {
    match code.to_ascii_lowercase().as_str() {
        "es" => "Spanish",
        "en" => "English",
        "ca" => "Catalan",
        "eu" => "Basque",
        "gl" => "Galician",
        _ => code,
    }
}
