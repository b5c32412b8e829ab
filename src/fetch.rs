//! Show fetching
//!
//! This module walks the paginated listing of a show and produces one
//! [`FetchResult`] per video published inside a date range. Listing pages
//! are assumed to be sorted by descending publication date, which lets the
//! traversal stop as soon as it has crossed the start of the range.
//!
//! The traversal is exposed as a lazy iterator, [`VideoStream`]. Nothing is
//! fetched for a video until the consumer asks for it, so stopping early
//! (`take(n)`, dropping the stream, a failing visitor) never costs a request
//! for an item that will not be used.

use crate::client::{ClientError, RtveClient};
use crate::http::{ReqwestTransport, Transport};
use crate::links::VideoLink;
use crate::metadata::{MetadataError, VideoMetadata};
use crate::shows::{Show, ShowError, ShowRegistry};
use crate::subtitles::Subtitles;
use chrono::{Days, NaiveDate, NaiveDateTime, Utc};
use std::fmt;
use std::vec;
use thiserror::Error;

/// Error type a visitor may return to stop fetching
pub type VisitorError = Box<dyn std::error::Error + Send + Sync>;

/// Fatal errors that end a fetch run
#[derive(Debug, Error)]
pub enum FetchError {
    /// The show slug is not in the registry
    #[error("Invalid show ID: {0}")]
    InvalidShow(#[from] ShowError),

    /// The end of the range lies before its start
    #[error("End date ({end}) is before start date ({start})")]
    InvalidRange {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    /// A listing page failed with something other than 404/403
    #[error("Error scraping page {page}: {source}")]
    Page { page: usize, source: ClientError },

    /// The visitor asked to stop
    #[error("Visitor stopped fetching: {0}")]
    Visitor(#[source] VisitorError),
}

/// A per-video failure that was recorded without stopping the run
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VideoError {
    /// Metadata could not be fetched or decoded
    #[error("Error fetching metadata for video {id}: {source}")]
    Metadata { id: String, source: ClientError },

    /// The publication date could not be parsed
    #[error("Error parsing date for video {id}: {source}")]
    PublicationDate { id: String, source: MetadataError },

    /// The subtitle listing could not be fetched or decoded
    #[error("Error fetching subtitles for video {id}: {source}")]
    Subtitles { id: String, source: ClientError },
}

/// Statistics of one fetch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Videos handed to the consumer
    pub videos_processed: usize,
    /// Non-fatal errors in the order they happened
    pub errors: Vec<VideoError>,
    /// Listing pages scraped, excluding lookahead probes
    pub pages_scraped: usize,
}

impl FetchStats {
    /// Number of non-fatal errors
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    fn record(&mut self, error: VideoError) {
        tracing::warn!(%error, "non-fatal fetch error");
        self.errors.push(error);
    }
}

/// A fatal error together with the statistics gathered before it
#[derive(Debug, Error)]
#[error("{error}")]
pub struct FetchFailure {
    /// Statistics up to the failure
    pub stats: FetchStats,
    /// The error that ended the run
    #[source]
    pub error: FetchError,
}

impl FetchFailure {
    fn new(stats: FetchStats, error: FetchError) -> Self {
        Self { stats, error }
    }
}

/// Metadata and subtitles of one video inside the requested range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    /// Video metadata
    pub metadata: VideoMetadata,
    /// Subtitle listing, or the error that prevented fetching it
    pub subtitles: Result<Subtitles, ClientError>,
}

impl FetchResult {
    /// The subtitle listing, when it could be fetched
    pub fn subtitles(&self) -> Option<&Subtitles> {
        self.subtitles.as_ref().ok()
    }

    /// The subtitle error, when the listing could not be fetched
    pub fn subtitles_error(&self) -> Option<&ClientError> {
        self.subtitles.as_ref().err()
    }
}

/// An inclusive range of publication timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl DateRange {
    /// Creates a range, rejecting `end < start`
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, FetchError> {
        if end < start {
            return Err(FetchError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Whole days from the start of `first` to the end of `last`
    pub fn days(first: NaiveDate, last: NaiveDate) -> Result<Self, FetchError> {
        let start = first.and_time(chrono::NaiveTime::MIN);
        let end = last
            .and_hms_opt(23, 59, 59)
            .unwrap_or_else(|| last.and_time(chrono::NaiveTime::MIN));
        Self::new(start, end)
    }

    /// Everything published since 2000-01-01 up to tomorrow
    pub fn everything() -> Self {
        let start = NaiveDate::from_ymd_opt(2000, 1, 1)
            .unwrap_or(NaiveDate::MIN)
            .and_time(chrono::NaiveTime::MIN);
        let now = Utc::now().naive_utc();
        let end = now.checked_add_days(Days::new(1)).unwrap_or(now);
        Self { start, end }
    }

    /// Start of the range
    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    /// End of the range
    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    /// Returns true when `at` lies inside the range, bounds included
    pub fn contains(&self, at: NaiveDateTime) -> bool {
        self.start <= at && at <= self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} .. {}", self.start, self.end)
    }
}

/// Traversal state of a [`VideoStream`]
#[derive(Debug)]
enum Phase {
    /// The next step is to fetch the page `VideoStream::page`
    NextPage,
    /// Links of the current page are being processed
    InPage {
        links: vec::IntoIter<VideoLink>,
        yielded: usize,
        all_before_range: bool,
    },
    /// The stream has ended
    Done,
}

/// Lazy iterator over the videos of a show inside a date range
///
/// Yields `Ok(FetchResult)` per in-range video. A fatal page error is
/// yielded once as `Err` and ends the stream; 404/403 on a listing page end
/// it silently. Per-video failures are recorded in [`VideoStream::stats`].
#[derive(Debug)]
pub struct VideoStream<'a, T: Transport = ReqwestTransport> {
    client: &'a RtveClient<T>,
    show: &'a Show,
    range: DateRange,
    page: usize,
    found_in_range: bool,
    phase: Phase,
    stats: FetchStats,
}

impl<'a, T: Transport> VideoStream<'a, T> {
    /// Creates a stream starting at listing page 0
    pub fn new(client: &'a RtveClient<T>, show: &'a Show, range: DateRange) -> Self {
        Self {
            client,
            show,
            range,
            page: 0,
            found_in_range: false,
            phase: Phase::NextPage,
            stats: FetchStats::default(),
        }
    }

    /// Statistics so far; `videos_processed` counts yielded videos
    pub fn stats(&self) -> &FetchStats {
        &self.stats
    }

    /// Consumes the stream, returning its statistics
    pub fn into_stats(self) -> FetchStats {
        self.stats
    }

    /// Fetches the current page and moves into it
    fn load_page(&mut self) -> Result<(), FetchError> {
        match self.client.scrape_page(self.show, self.page) {
            Ok(links) => {
                self.stats.pages_scraped += 1;
                self.phase = if links.is_empty() {
                    tracing::debug!(show = self.show.slug, page = self.page, "no more videos");
                    Phase::Done
                } else {
                    Phase::InPage {
                        links: links.into_iter(),
                        yielded: 0,
                        all_before_range: true,
                    }
                };
                Ok(())
            }
            Err(e) if e.is_terminal() => {
                tracing::debug!(show = self.show.slug, page = self.page, error = %e, "end of pagination");
                self.phase = Phase::Done;
                Ok(())
            }
            Err(source) => {
                self.phase = Phase::Done;
                Err(FetchError::Page {
                    page: self.page,
                    source,
                })
            }
        }
    }

    /// Fetches metadata and publication time of a link, recording failures
    fn inspect(&mut self, link: &VideoLink) -> Option<(VideoMetadata, NaiveDateTime)> {
        let metadata = match self.client.video_metadata(&link.id) {
            Ok(metadata) => metadata,
            Err(source) => {
                self.stats.record(VideoError::Metadata {
                    id: link.id.clone(),
                    source,
                });
                return None;
            }
        };

        match metadata.published_at() {
            Ok(published) => Some((metadata, published)),
            Err(source) => {
                self.stats.record(VideoError::PublicationDate {
                    id: link.id.clone(),
                    source,
                });
                None
            }
        }
    }

    /// Builds the result for an in-range video
    fn complete(&mut self, link: &VideoLink, metadata: VideoMetadata) -> FetchResult {
        let subtitles = self.client.subtitles(&link.id);
        if let Err(source) = &subtitles {
            self.stats.record(VideoError::Subtitles {
                id: link.id.clone(),
                source: source.clone(),
            });
        }

        self.stats.videos_processed += 1;
        FetchResult {
            metadata,
            subtitles,
        }
    }

    /// Decides where to go once every link of the current page was handled
    fn finish_page(&mut self, yielded: usize, all_before_range: bool) {
        if self.found_in_range && all_before_range {
            // Crossed the start of the range; older pages cannot match
            self.phase = Phase::Done;
            return;
        }

        self.page += 1;
        self.phase = if self.found_in_range && yielded == 0 && !self.probe_next_page() {
            Phase::Done
        } else {
            Phase::NextPage
        };
    }

    /// Looks one page ahead after a page without in-range videos.
    ///
    /// Returns true when the page at `self.page` holds at least one video
    /// inside the range, in which case it is processed normally next. This
    /// tolerates a single out-of-order page; it is a heuristic and does not
    /// detect the range boundary on listings that are not sorted by date.
    fn probe_next_page(&self) -> bool {
        let links = match self.client.scrape_page(self.show, self.page) {
            Ok(links) if !links.is_empty() => links,
            _ => return false,
        };

        let in_range = links.iter().any(|link| {
            self.client
                .video_metadata(&link.id)
                .ok()
                .and_then(|metadata| metadata.published_at().ok())
                .is_some_and(|published| self.range.contains(published))
        });

        tracing::debug!(show = self.show.slug, page = self.page, in_range, "probed next page");
        in_range
    }
}

impl<T: Transport> Iterator for VideoStream<'_, T> {
    type Item = Result<FetchResult, FetchError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match std::mem::replace(&mut self.phase, Phase::Done) {
                Phase::Done => return None,
                Phase::NextPage => {
                    if let Err(e) = self.load_page() {
                        return Some(Err(e));
                    }
                }
                Phase::InPage {
                    mut links,
                    mut yielded,
                    mut all_before_range,
                } => {
                    let Some(link) = links.next() else {
                        self.finish_page(yielded, all_before_range);
                        continue;
                    };

                    let inspected = self.inspect(&link);
                    let mut result = None;

                    if let Some((metadata, published)) = inspected {
                        if published > self.range.end() {
                            // Too new, but older videos may follow on this page
                            all_before_range = false;
                        } else if published >= self.range.start() {
                            self.found_in_range = true;
                            all_before_range = false;
                            yielded += 1;
                            result = Some(self.complete(&link, metadata));
                        }
                    }

                    self.phase = Phase::InPage {
                        links,
                        yielded,
                        all_before_range,
                    };

                    if let Some(result) = result {
                        return Some(Ok(result));
                    }
                }
            }
        }
    }
}

/// Fetches shows by slug, the entry point of the library
#[derive(Debug, Clone)]
pub struct ShowFetcher<'a, T: Transport = ReqwestTransport> {
    client: &'a RtveClient<T>,
    registry: &'a ShowRegistry,
}

impl<'a, T: Transport> ShowFetcher<'a, T> {
    /// Creates a fetcher over a client and a show registry
    pub fn new(client: &'a RtveClient<T>, registry: &'a ShowRegistry) -> Self {
        Self { client, registry }
    }

    /// Returns a lazy stream of the videos of a show inside a range
    pub fn stream(&self, show_id: &str, range: DateRange) -> Result<VideoStream<'a, T>, FetchError> {
        let show = self.registry.get(show_id)?;
        Ok(VideoStream::new(self.client, show, range))
    }

    /// Fetches every video of a show published between `start` and `end`
    /// (both inclusive), handing each to `visitor`.
    ///
    /// If the visitor returns an error, fetching stops immediately and the
    /// error is returned as `FetchError::Visitor`, together with the stats
    /// gathered so far (the refused video is not counted as processed).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use chrono::NaiveDate;
    /// use rtve_subs::{RtveClient, ShowFetcher, ShowRegistry, ClientSettings};
    ///
    /// let client = RtveClient::with_user_agent("rtve-subs", ClientSettings::default()).unwrap();
    /// let registry = ShowRegistry::builtin();
    /// let fetcher = ShowFetcher::new(&client, &registry);
    ///
    /// let day = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();
    /// let stats = fetcher
    ///     .fetch_show(
    ///         "telediario-1",
    ///         day.and_hms_opt(0, 0, 0).unwrap(),
    ///         day.and_hms_opt(23, 59, 59).unwrap(),
    ///         |result| {
    ///             println!("Found: {} (ID: {})", result.metadata.long_title, result.metadata.id);
    ///             Ok(())
    ///         },
    ///     )
    ///     .unwrap();
    ///
    /// println!("Fetched {} videos with {} errors", stats.videos_processed, stats.error_count());
    /// ```
    pub fn fetch_show<F>(
        &self,
        show_id: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
        visitor: F,
    ) -> Result<FetchStats, FetchFailure>
    where
        F: FnMut(FetchResult) -> Result<(), VisitorError>,
    {
        let range = DateRange::new(start, end)
            .map_err(|e| FetchFailure::new(FetchStats::default(), e))?;
        self.drive(show_id, range, None, visitor)
    }

    /// Fetches every available video of a show
    pub fn fetch_show_all<F>(&self, show_id: &str, visitor: F) -> Result<FetchStats, FetchFailure>
    where
        F: FnMut(FetchResult) -> Result<(), VisitorError>,
    {
        self.drive(show_id, DateRange::everything(), None, visitor)
    }

    /// Fetches the `max_videos` most recent videos of a show (0 = all)
    ///
    /// The limit is checked before the next video is requested, so exactly
    /// `max_videos` videos are fetched and visited when that many exist.
    pub fn fetch_show_latest<F>(
        &self,
        show_id: &str,
        max_videos: usize,
        visitor: F,
    ) -> Result<FetchStats, FetchFailure>
    where
        F: FnMut(FetchResult) -> Result<(), VisitorError>,
    {
        let limit = (max_videos > 0).then_some(max_videos);
        self.drive(show_id, DateRange::everything(), limit, visitor)
    }

    fn drive<F>(
        &self,
        show_id: &str,
        range: DateRange,
        limit: Option<usize>,
        mut visitor: F,
    ) -> Result<FetchStats, FetchFailure>
    where
        F: FnMut(FetchResult) -> Result<(), VisitorError>,
    {
        let mut stream = self
            .stream(show_id, range)
            .map_err(|e| FetchFailure::new(FetchStats::default(), e))?;
        let mut visited = 0;

        tracing::debug!(show = show_id, %range, ?limit, "fetching show");

        while limit.is_none_or(|limit| visited < limit) {
            let Some(next) = stream.next() else {
                break;
            };

            let outcome = next.and_then(|result| visitor(result).map_err(FetchError::Visitor));
            if let Err(error) = outcome {
                let mut stats = stream.into_stats();
                stats.videos_processed = visited;
                return Err(FetchFailure::new(stats, error));
            }

            visited += 1;
        }

        let mut stats = stream.into_stats();
        stats.videos_processed = visited;
        Ok(stats)
    }
}
