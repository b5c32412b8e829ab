//! rtve-subs - Download episode metadata and subtitles from RTVE Play
//!
//! This library walks the paginated episode listings of RTVE news shows,
//! fetches the metadata and subtitle tracks of every episode published in a
//! date range and stores them in a date-organized archive.
//!
//! The core is [`VideoStream`], a lazy iterator over the episodes of a show
//! inside a [`DateRange`]. [`ShowFetcher`] wraps it in visitor-style drivers
//! and [`sync_show`] keeps an on-disk archive up to date.

mod api_types;
mod client;
mod config;
mod fetch;
mod http;
mod links;
mod metadata;
mod shows;
mod store;
mod subtitles;
mod sync;

// Re-export error types
pub use client::ClientError;
pub use config::ConfigError;
pub use fetch::{FetchError, FetchFailure, VideoError, VisitorError};
pub use http::HttpError;
pub use metadata::MetadataError;
pub use shows::ShowError;
pub use store::StoreError;
pub use subtitles::SubtitleError;
pub use sync::{SyncError, SyncFailure};

pub use client::{API_BASE_URL, ClientSettings, RtveClient};
pub use config::{Config, HttpConfig};
pub use fetch::{DateRange, FetchResult, FetchStats, ShowFetcher, VideoStream};
pub use http::{
    DEFAULT_USER_AGENT, HttpRequest, HttpResponse, ReqwestTransport, RetryPolicy, Transport,
    get_with_retry,
};
pub use links::{VideoLink, extract_links};
pub use metadata::{PUBLICATION_DATE_FORMAT, VideoMetadata, parse_publication_date};
pub use shows::{Show, ShowRegistry};
pub use store::{ExistingVideo, VideoStore};
pub use subtitles::{SubtitleTrack, Subtitles, language_name};
pub use sync::{
    PersistEvent, Persisted, ShowOutcome, SyncAction, SyncEvent, SyncReport, download_subtitles,
    persist_latest, persist_range, persist_result, sync_show,
};

use thiserror::Error;

/// Top-level error type for rtve-subs operations
#[derive(Debug, Error)]
pub enum RtveError {
    /// Unknown show
    #[error("Show error: {0}")]
    Show(#[from] ShowError),

    /// Error talking to RTVE
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    /// A fetch run ended with a fatal error
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchFailure),

    /// A sync run ended with a fatal error
    #[error("Sync error: {0}")]
    Sync(#[from] SyncFailure),

    /// A video could not be written to the archive
    #[error("Archive error: {0}")]
    Archive(#[from] SyncError),

    /// The configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
