//! RTVE client
//!
//! This module ties the transport to the rtve.es endpoints: listing pages,
//! per-video metadata, subtitle listings and subtitle bodies.

use crate::http::{HttpError, HttpRequest, ReqwestTransport, RetryPolicy, Transport, get_with_retry};
use crate::links::{VideoLink, extract_links};
use crate::metadata::{MetadataError, VideoMetadata};
use crate::shows::Show;
use crate::subtitles::{SubtitleError, SubtitleTrack, Subtitles};
use std::time::Duration;
use thiserror::Error;

/// Base URL of the RTVE JSON API
pub const API_BASE_URL: &str = "https://api2.rtve.es/api";

/// Errors that can occur while talking to RTVE
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The request itself failed
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The metadata of a video could not be decoded
    #[error("Video {id}: {source}")]
    Metadata { id: String, source: MetadataError },

    /// The subtitle listing of a video could not be decoded
    #[error("Video {id}: {source}")]
    Subtitles { id: String, source: SubtitleError },
}

impl ClientError {
    /// Returns true for the 404/403 signals that end pagination gracefully
    pub fn is_terminal(&self) -> bool {
        matches!(self, ClientError::Http(e) if e.is_terminal())
    }
}

/// Timeouts and retry behaviour of a client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientSettings {
    /// Timeout for listing pages and JSON endpoints
    pub request_timeout: Duration,
    /// Timeout for subtitle file downloads
    pub download_timeout: Duration,
    /// Retry policy for 5xx responses
    pub retry: RetryPolicy,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            download_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

/// Client for the rtve.es listing pages and JSON API
#[derive(Debug, Clone)]
pub struct RtveClient<T = ReqwestTransport> {
    transport: T,
    settings: ClientSettings,
    api_base: String,
}

impl RtveClient<ReqwestTransport> {
    /// Creates a client using a `reqwest` transport with the given user agent
    pub fn with_user_agent(user_agent: &str, settings: ClientSettings) -> Result<Self, ClientError> {
        Ok(Self::new(ReqwestTransport::new(user_agent)?, settings))
    }
}

impl<T: Transport> RtveClient<T> {
    /// Creates a client on top of an arbitrary transport
    pub fn new(transport: T, settings: ClientSettings) -> Self {
        Self {
            transport,
            settings,
            api_base: API_BASE_URL.to_string(),
        }
    }

    /// Returns the underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn fetch(&self, url: &str, accept: &str, timeout: Duration) -> Result<Vec<u8>, HttpError> {
        let request = HttpRequest {
            url,
            accept,
            timeout,
        };
        get_with_retry(&self.transport, &request, &self.settings.retry)
    }

    fn fetch_text(&self, url: &str, accept: &str) -> Result<String, HttpError> {
        let body = self.fetch(url, accept, self.settings.request_timeout)?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// URL of the metadata endpoint of a video
    pub fn metadata_url(&self, video_id: &str) -> String {
        format!("{}/videos/{}.json", self.api_base, video_id)
    }

    /// URL of the subtitle listing endpoint of a video
    pub fn subtitles_url(&self, video_id: &str) -> String {
        format!("{}/videos/{}/subtitulos.json", self.api_base, video_id)
    }

    /// Fetches one listing page of a show and extracts its episode links
    ///
    /// # Errors
    ///
    /// `HttpError::NotFound` / `HttpError::Forbidden` signal the end of
    /// pagination; see [`ClientError::is_terminal`].
    pub fn scrape_page(&self, show: &Show, page: usize) -> Result<Vec<VideoLink>, ClientError> {
        let url = show.listing_url(page);
        let content = self.fetch_text(&url, "application/json")?;
        let links = extract_links(show, &content);

        tracing::debug!(show = show.slug, page, links = links.len(), "scraped listing page");

        Ok(links)
    }

    /// Fetches and decodes the metadata of a video
    pub fn video_metadata(&self, video_id: &str) -> Result<VideoMetadata, ClientError> {
        let body = self.fetch_text(&self.metadata_url(video_id), "application/json")?;

        VideoMetadata::parse(&body).map_err(|source| ClientError::Metadata {
            id: video_id.to_string(),
            source,
        })
    }

    /// Fetches and decodes the subtitle listing of a video
    pub fn subtitles(&self, video_id: &str) -> Result<Subtitles, ClientError> {
        let body = self.fetch_text(&self.subtitles_url(video_id), "application/json")?;

        Subtitles::parse(video_id, &body).map_err(|source| ClientError::Subtitles {
            id: video_id.to_string(),
            source,
        })
    }

    /// Downloads the content of a subtitle track
    pub fn download_track(&self, track: &SubtitleTrack) -> Result<Vec<u8>, ClientError> {
        Ok(self.fetch(&track.src, "text/vtt", self.settings.download_timeout)?)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Helpers to build canned RTVE responses

    use super::*;
    use crate::http::testing::FakeTransport;

    /// Client over a fake transport without retry delays
    pub(crate) fn fake_client() -> RtveClient<FakeTransport> {
        RtveClient::new(
            FakeTransport::new(),
            ClientSettings {
                retry: RetryPolicy {
                    max_retries: 2,
                    initial_backoff: Duration::ZERO,
                },
                ..ClientSettings::default()
            },
        )
    }

    /// Listing page HTML for the given show and ids, with distracting markup
    pub(crate) fn listing_html(slug: &str, ids: &[&str]) -> String {
        let mut html = String::from("<ul class=\"listado\">\n");
        for (order, id) in ids.iter().enumerate() {
            html.push_str(&format!(
                "<li data-order=\"{order:02}\"><div class=\"cellBox\" data-idasset={id}>\
                 <a class=\"goto_media\" href=\"https://www.rtve.es/play/videos/{slug}/episodio/{id}/\" data-id=\"09\">Ver</a>\
                 </div></li>\n"
            ));
        }
        html.push_str("</ul>\n");
        html
    }

    /// Metadata JSON for a video published at the given timestamp
    pub(crate) fn metadata_json(id: &str, published: &str) -> String {
        format!(
            r#"{{"page":{{"items":[{{"uri":"https://www.rtve.es/api/videos/{id}","htmlUrl":"https://www.rtve.es/play/videos/show/episodio/{id}/","id":"{id}","longTitle":"Episode {id}","publicationDate":"{published}"}}],"total":1}}}}"#
        )
    }

    /// Subtitle listing JSON with one track per language
    pub(crate) fn subtitles_json(id: &str, langs: &[&str]) -> String {
        let items: Vec<String> = langs
            .iter()
            .map(|lang| {
                format!(r#"{{"src":"{}","lang":"{lang}"}}"#, track_url(id, lang))
            })
            .collect();
        format!(r#"{{"page":{{"items":[{}]}}}}"#, items.join(","))
    }

    /// Download URL of a subtitle track
    pub(crate) fn track_url(id: &str, lang: &str) -> String {
        format!("https://ztnr.rtve.es/ztnr/subtitles/{id}_{lang}.vtt")
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::shows::ShowRegistry;

    #[test]
    fn test_scrape_page() {
        let client = fake_client();
        let registry = ShowRegistry::builtin();
        let show = registry.get("telediario-1").unwrap();

        client.transport().respond(
            &show.listing_url(0),
            200,
            &listing_html("telediario-1", &["16755959", "16754110"]),
        );

        let ids: Vec<String> = client
            .scrape_page(show, 0)
            .unwrap()
            .into_iter()
            .map(|link| link.id)
            .collect();
        assert_eq!(ids, vec!["16755959", "16754110"]);
    }

    #[test]
    fn test_scrape_missing_page_is_terminal() {
        let client = fake_client();
        let registry = ShowRegistry::builtin();
        let show = registry.get("telediario-1").unwrap();

        let err = client.scrape_page(show, 7).unwrap_err();
        assert!(err.is_terminal());
    }

    #[test]
    fn test_video_metadata() {
        let client = fake_client();
        client.transport().respond(
            &client.metadata_url("16755959"),
            200,
            &metadata_json("16755959", "03-10-2025 15:00:00"),
        );

        let metadata = client.video_metadata("16755959").unwrap();
        assert_eq!(metadata.id, "16755959");
        assert_eq!(metadata.publication_date, "03-10-2025 15:00:00");
    }

    #[test]
    fn test_video_metadata_empty_items() {
        let client = fake_client();
        client
            .transport()
            .respond(&client.metadata_url("1234567"), 200, r#"{"page":{"items":[]}}"#);

        let err = client.video_metadata("1234567").unwrap_err();
        assert_eq!(
            err,
            ClientError::Metadata {
                id: "1234567".to_string(),
                source: MetadataError::NoItems,
            }
        );
        assert!(!err.is_terminal());
    }

    #[test]
    fn test_subtitles_and_download_with_retry() {
        let client = fake_client();
        client.transport().respond(
            &client.subtitles_url("16755959"),
            200,
            &subtitles_json("16755959", &["es"]),
        );
        client
            .transport()
            .respond(&track_url("16755959", "es"), 503, "")
            .respond(&track_url("16755959", "es"), 200, "WEBVTT\n");

        let subtitles = client.subtitles("16755959").unwrap();
        assert_eq!(subtitles.tracks.len(), 1);

        let content = client.download_track(&subtitles.tracks[0]).unwrap();
        assert_eq!(content, b"WEBVTT\n");
        assert_eq!(client.transport().calls_to(&track_url("16755959", "es")), 2);
    }

    #[test]
    fn test_urls() {
        let client = fake_client();
        assert_eq!(
            client.metadata_url("16492499"),
            "https://api2.rtve.es/api/videos/16492499.json"
        );
        assert_eq!(
            client.subtitles_url("16492499"),
            "https://api2.rtve.es/api/videos/16492499/subtitulos.json"
        );
    }
}
