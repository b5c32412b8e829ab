//! Incremental download of a show into a [`VideoStore`]
//!
//! [`sync_show`] walks the newest listing pages of a show and brings the
//! archive up to date: videos that are already complete are skipped without
//! any request, videos whose subtitles are missing are backfilled in place
//! and new videos are written out in full. Running it twice in a row is a
//! no-op the second time.
//!
//! [`persist_result`] applies the same rules to a single [`FetchResult`]
//! produced by the date-range fetchers.

use crate::client::{ClientError, RtveClient};
use crate::fetch::{DateRange, FetchFailure, FetchResult, FetchStats, ShowFetcher, VisitorError};
use crate::http::Transport;
use crate::metadata::VideoMetadata;
use crate::shows::{Show, ShowRegistry};
use crate::store::{ExistingVideo, StoreError, VideoStore};
use crate::subtitles::Subtitles;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while writing videos to the archive
#[derive(Debug, Error)]
pub enum SyncError {
    /// A listing page failed with something other than 404/403
    #[error("Error scraping page {page}: {source}")]
    Page { page: usize, source: ClientError },

    /// Metadata or the subtitle listing of a video could not be fetched
    #[error("Error fetching video {id}: {source}")]
    Video { id: String, source: ClientError },

    /// A subtitle track could not be downloaded
    #[error("Error downloading {lang} subtitles for video {id}: {source}")]
    Track {
        id: String,
        lang: String,
        source: ClientError,
    },

    /// The archive could not be read or written
    #[error("Storage error for video {id}: {source}")]
    Storage { id: String, source: StoreError },
}

/// Progress events emitted during a sync run
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// Sync started
    Started { show: String, max_pages: usize },
    /// A listing page was scraped
    PageScraped { page: usize, links: usize },
    /// The video is already archived with subtitles
    Skipped { video_id: String },
    /// A new video is being written
    Downloading { video_id: String, title: String },
    /// An archived video is missing subtitles and is being completed
    Backfilling { video_id: String, title: String },
    /// A subtitle track was written
    SubtitleSaved {
        video_id: String,
        lang: String,
        path: PathBuf,
    },
    /// The video has no subtitle tracks
    NoSubtitles { video_id: String },
    /// A per-video failure was recorded
    VideoFailed { video_id: String, message: String },
    /// Sync finished
    Complete {
        downloaded: usize,
        backfilled: usize,
        skipped: usize,
    },
}

/// Outcome of a sync run
#[derive(Debug, Default)]
pub struct SyncReport {
    /// New videos written to the archive
    pub downloaded: usize,
    /// Archived videos that received their missing subtitles
    pub backfilled: usize,
    /// Videos already archived with subtitles
    pub skipped: usize,
    /// Listing pages scraped
    pub pages_scraped: usize,
    /// Per-video failures in the order they happened
    pub errors: Vec<SyncError>,
}

/// A fatal sync error together with the report gathered before it
#[derive(Debug, Error)]
#[error("{error}")]
pub struct SyncFailure {
    /// Report up to the failure
    pub report: SyncReport,
    /// The error that ended the run
    #[source]
    pub error: SyncError,
}

/// What happened to a single video
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// Already archived with subtitles, nothing written
    Skipped,
    /// Written to a new folder
    Downloaded,
    /// Subtitles added to an existing folder
    Backfilled,
}

/// Result of writing a single video
#[derive(Debug)]
pub struct Persisted {
    /// What was done
    pub action: SyncAction,
    /// Day folder of the video
    pub dir: Option<PathBuf>,
    /// Subtitle tracks written
    pub tracks_written: usize,
    /// Track download failures; they do not undo the rest of the write
    pub errors: Vec<SyncError>,
}

impl Persisted {
    fn skipped(dir: PathBuf) -> Self {
        Self {
            action: SyncAction::Skipped,
            dir: Some(dir),
            tracks_written: 0,
            errors: Vec::new(),
        }
    }
}

/// Downloads the newest videos of a show into the archive
///
/// `max_pages` bounds the number of listing pages scanned; 0 scans until
/// pagination ends. 404/403 or an empty page end the run normally, any
/// other listing failure ends it with a [`SyncFailure`].
pub fn sync_show<T, F>(
    client: &RtveClient<T>,
    store: &VideoStore,
    show: &Show,
    max_pages: usize,
    mut on_event: F,
) -> Result<SyncReport, SyncFailure>
where
    T: Transport,
    F: FnMut(SyncEvent),
{
    let mut report = SyncReport::default();

    on_event(SyncEvent::Started {
        show: show.slug.to_string(),
        max_pages,
    });

    let mut page = 0;
    while max_pages == 0 || page < max_pages {
        let links = match client.scrape_page(show, page) {
            Ok(links) => links,
            Err(e) if e.is_terminal() => {
                tracing::debug!(show = show.slug, page, error = %e, "end of pagination");
                break;
            }
            Err(source) => {
                return Err(SyncFailure {
                    report,
                    error: SyncError::Page { page, source },
                });
            }
        };

        report.pages_scraped += 1;
        on_event(SyncEvent::PageScraped {
            page,
            links: links.len(),
        });

        if links.is_empty() {
            break;
        }

        for link in &links {
            sync_video(client, store, &link.id, &mut report, &mut on_event);
        }

        page += 1;
    }

    on_event(SyncEvent::Complete {
        downloaded: report.downloaded,
        backfilled: report.backfilled,
        skipped: report.skipped,
    });

    Ok(report)
}

fn sync_video<T, F>(
    client: &RtveClient<T>,
    store: &VideoStore,
    video_id: &str,
    report: &mut SyncReport,
    on_event: &mut F,
) where
    T: Transport,
    F: FnMut(SyncEvent),
{
    let existing = match store.find_existing(video_id) {
        Ok(Some(existing)) if existing.has_subtitles => {
            report.skipped += 1;
            on_event(SyncEvent::Skipped {
                video_id: video_id.to_string(),
            });
            return;
        }
        Ok(existing) => existing,
        Err(source) => {
            let error = SyncError::Storage {
                id: video_id.to_string(),
                source,
            };
            record_failure(report, on_event, video_id, error);
            return;
        }
    };

    let metadata = match client.video_metadata(video_id) {
        Ok(metadata) => metadata,
        Err(source) => {
            let error = SyncError::Video {
                id: video_id.to_string(),
                source,
            };
            record_failure(report, on_event, video_id, error);
            return;
        }
    };

    let subtitles = client.subtitles(video_id);
    if let Err(source) = &subtitles {
        let error = SyncError::Video {
            id: video_id.to_string(),
            source: source.clone(),
        };
        record_failure(report, on_event, video_id, error);
    }

    match write_video(client, store, existing, &metadata, subtitles.as_ref().ok(), on_event) {
        Ok(persisted) => {
            match persisted.action {
                SyncAction::Downloaded => report.downloaded += 1,
                SyncAction::Backfilled => report.backfilled += 1,
                SyncAction::Skipped => {}
            }
            for error in persisted.errors {
                record_failure(report, on_event, video_id, error);
            }
        }
        Err(error) => record_failure(report, on_event, video_id, error),
    }
}

fn record_failure<F: FnMut(SyncEvent)>(
    report: &mut SyncReport,
    on_event: &mut F,
    video_id: &str,
    error: SyncError,
) {
    tracing::warn!(%error, "video not synced");
    on_event(SyncEvent::VideoFailed {
        video_id: video_id.to_string(),
        message: error.to_string(),
    });
    report.errors.push(error);
}

/// Writes a fetched video to the archive unless it is already complete
///
/// A subtitle listing error in `result` is not repeated here; the video's
/// metadata is still written so a later run can backfill it.
pub fn persist_result<T: Transport>(
    client: &RtveClient<T>,
    store: &VideoStore,
    result: &FetchResult,
) -> Result<Persisted, SyncError> {
    let id = &result.metadata.id;
    let existing = store
        .find_existing(id)
        .map_err(|source| SyncError::Storage {
            id: id.clone(),
            source,
        })?;

    if let Some(existing) = existing.as_ref().filter(|e| e.has_subtitles) {
        return Ok(Persisted::skipped(existing.dir.clone()));
    }

    write_video(
        client,
        store,
        existing,
        &result.metadata,
        result.subtitles(),
        &mut |_: SyncEvent| {},
    )
}

/// Outcome of fetching one show and writing its videos
#[derive(Debug)]
pub struct ShowOutcome {
    /// Show slug
    pub slug: String,
    /// Fetch statistics, or the fatal error that ended the show early
    pub fetch: Result<FetchStats, FetchFailure>,
    /// Videos written or completed in this run
    pub written: usize,
    /// Videos that could not be written, plus failed subtitle tracks
    pub write_errors: Vec<SyncError>,
}

impl ShowOutcome {
    /// Fetch statistics, including those gathered before a fatal error
    pub fn stats(&self) -> &FetchStats {
        match &self.fetch {
            Ok(stats) => stats,
            Err(failure) => &failure.stats,
        }
    }

    /// Non-fatal fetch errors, write errors and the fatal error, if any
    pub fn error_count(&self) -> usize {
        self.stats().error_count() + self.write_errors.len() + usize::from(self.fetch.is_err())
    }
}

/// Progress events emitted while fetching shows into the archive
#[derive(Debug)]
pub enum PersistEvent<'a> {
    /// Fetching a show started
    ShowStarted { slug: &'a str },
    /// A fetched video was handed to the archive
    Written {
        result: &'a FetchResult,
        persisted: &'a Result<Persisted, SyncError>,
    },
    /// Fetching a show finished, successfully or not
    ShowFinished { outcome: &'a ShowOutcome },
}

/// Fetches the latest `count` videos of every given show into the archive
///
/// A show that fails does not stop the others, and a video that cannot be
/// written does not stop its show. Both end up in the show's outcome.
pub fn persist_latest<T, F>(
    client: &RtveClient<T>,
    store: &VideoStore,
    registry: &ShowRegistry,
    slugs: &[&str],
    count: usize,
    mut on_event: F,
) -> Vec<ShowOutcome>
where
    T: Transport,
    F: FnMut(PersistEvent<'_>),
{
    let fetcher = ShowFetcher::new(client, registry);

    slugs
        .iter()
        .map(|slug| {
            persist_show(client, store, slug, &mut on_event, |visitor| {
                fetcher.fetch_show_latest(slug, count, visitor)
            })
        })
        .collect()
}

/// Fetches the videos of a show inside a date range into the archive
pub fn persist_range<T, F>(
    client: &RtveClient<T>,
    store: &VideoStore,
    registry: &ShowRegistry,
    slug: &str,
    range: DateRange,
    mut on_event: F,
) -> ShowOutcome
where
    T: Transport,
    F: FnMut(PersistEvent<'_>),
{
    let fetcher = ShowFetcher::new(client, registry);

    persist_show(client, store, slug, &mut on_event, |visitor| {
        fetcher.fetch_show(slug, range.start(), range.end(), visitor)
    })
}

type PersistVisitor<'v> = dyn FnMut(FetchResult) -> Result<(), VisitorError> + 'v;

fn persist_show<T, F, R>(
    client: &RtveClient<T>,
    store: &VideoStore,
    slug: &str,
    on_event: &mut F,
    fetch: R,
) -> ShowOutcome
where
    T: Transport,
    F: FnMut(PersistEvent<'_>),
    R: FnOnce(&mut PersistVisitor<'_>) -> Result<FetchStats, FetchFailure>,
{
    on_event(PersistEvent::ShowStarted { slug });

    let mut written = 0;
    let mut write_errors = Vec::new();

    let fetch = fetch(&mut |result: FetchResult| -> Result<(), VisitorError> {
        let persisted = persist_result(client, store, &result);
        on_event(PersistEvent::Written {
            result: &result,
            persisted: &persisted,
        });

        match persisted {
            Ok(persisted) => {
                if persisted.action != SyncAction::Skipped {
                    written += 1;
                }
                write_errors.extend(persisted.errors);
            }
            Err(error) => {
                tracing::warn!(%error, "video not written");
                write_errors.push(error);
            }
        }

        Ok(())
    });

    if let Err(failure) = &fetch {
        tracing::warn!(show = slug, error = %failure, "show fetch failed");
    }

    let outcome = ShowOutcome {
        slug: slug.to_string(),
        fetch,
        written,
        write_errors,
    };
    on_event(PersistEvent::ShowFinished { outcome: &outcome });

    outcome
}

fn write_video<T, F>(
    client: &RtveClient<T>,
    store: &VideoStore,
    existing: Option<ExistingVideo>,
    metadata: &VideoMetadata,
    subtitles: Option<&Subtitles>,
    on_event: &mut F,
) -> Result<Persisted, SyncError>
where
    T: Transport,
    F: FnMut(SyncEvent),
{
    let storage = |source| SyncError::Storage {
        id: metadata.id.clone(),
        source,
    };

    if let Some(existing) = existing {
        on_event(SyncEvent::Backfilling {
            video_id: metadata.id.clone(),
            title: metadata.long_title.clone(),
        });

        let (tracks_written, errors) = match subtitles {
            Some(subtitles) => {
                download_subtitles(client, store, &existing.dir, subtitles, on_event)
            }
            None => (0, Vec::new()),
        };

        // Nothing new on disk means the video is still incomplete
        let action = if tracks_written > 0 {
            SyncAction::Backfilled
        } else {
            SyncAction::Skipped
        };

        return Ok(Persisted {
            action,
            dir: Some(existing.dir),
            tracks_written,
            errors,
        });
    }

    on_event(SyncEvent::Downloading {
        video_id: metadata.id.clone(),
        title: metadata.long_title.clone(),
    });

    let dir = store.folder_for(metadata).map_err(storage)?;
    store.create_dir(&dir).map_err(storage)?;
    store.save_metadata(metadata, &dir).map_err(storage)?;

    let (tracks_written, mut errors) = match subtitles {
        Some(subtitles) => download_subtitles(client, store, &dir, subtitles, on_event),
        None => (0, Vec::new()),
    };

    // Writing into the folder bumps its mtime, so this comes last
    let folder_time = metadata
        .published_at()
        .map_err(|source| StoreError::InvalidDate {
            id: metadata.id.clone(),
            source,
        })
        .and_then(|published| store.set_folder_time(&dir, published));
    if let Err(source) = folder_time {
        errors.push(storage(source));
    }

    Ok(Persisted {
        action: SyncAction::Downloaded,
        dir: Some(dir),
        tracks_written,
        errors,
    })
}

/// Downloads every track of a subtitle listing into `dir/subs`
///
/// Returns the number of tracks written and the failures of the others.
pub fn download_subtitles<T, F>(
    client: &RtveClient<T>,
    store: &VideoStore,
    dir: &Path,
    subtitles: &Subtitles,
    on_event: &mut F,
) -> (usize, Vec<SyncError>)
where
    T: Transport,
    F: FnMut(SyncEvent),
{
    let mut written = 0;
    let mut errors = Vec::new();

    if subtitles.is_empty() {
        on_event(SyncEvent::NoSubtitles {
            video_id: subtitles.video_id.clone(),
        });
        return (written, errors);
    }

    for track in &subtitles.tracks {
        let content = match client.download_track(track) {
            Ok(content) => content,
            Err(source) => {
                errors.push(SyncError::Track {
                    id: subtitles.video_id.clone(),
                    lang: track.lang.clone(),
                    source,
                });
                continue;
            }
        };

        match store.write_subtitle(dir, &subtitles.video_id, &track.lang, &content) {
            Ok(path) => {
                written += 1;
                on_event(SyncEvent::SubtitleSaved {
                    video_id: subtitles.video_id.clone(),
                    lang: track.lang.clone(),
                    path,
                });
            }
            Err(source) => errors.push(SyncError::Storage {
                id: subtitles.video_id.clone(),
                source,
            }),
        }
    }

    (written, errors)
}
