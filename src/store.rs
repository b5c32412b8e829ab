//! On-disk video archive
//!
//! Videos are stored by publication date:
//!
//! ```text
//! <root>/<YYYY>/<YYYY-MM-DD>/video_<id>.json
//! <root>/<YYYY>/<YYYY-MM-DD>/subs/<id>_<lang>.vtt
//! ```
//!
//! This module derives those paths, writes the files and answers whether a
//! video has already been downloaded.

use crate::metadata::{MetadataError, VideoMetadata};
use chrono::NaiveDateTime;
use std::fs::{self, File, FileTimes};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;

/// Name of the subtitle directory inside a day folder
pub const SUBTITLES_DIR: &str = "subs";

/// Errors that can occur during archive operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// The publication date of the video cannot be turned into a folder
    #[error("Cannot place video {id}: {source}")]
    InvalidDate { id: String, source: MetadataError },

    /// Failed to create a directory
    #[error("Failed to create directory {path}: {source}")]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    /// Failed to write a file
    #[error("Failed to write file {path}: {source}")]
    WriteFailed { path: PathBuf, source: io::Error },

    /// Failed to read the archive
    #[error("Failed to read directory {path}: {source}")]
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to serialize metadata
    #[error("Failed to serialize metadata: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// A video already present in the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingVideo {
    /// Day folder holding `video_<id>.json`
    pub dir: PathBuf,
    /// Whether `subs/` exists and is not empty
    pub has_subtitles: bool,
}

/// Date-organized archive rooted at an output directory
#[derive(Debug, Clone)]
pub struct VideoStore {
    root: PathBuf,
}

impl VideoStore {
    /// Creates a store rooted at the given directory (created lazily)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the archive root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the day folder of a video, derived from its publication date
    pub fn folder_for(&self, metadata: &VideoMetadata) -> Result<PathBuf, StoreError> {
        let published = metadata
            .published_at()
            .map_err(|source| StoreError::InvalidDate {
                id: metadata.id.clone(),
                source,
            })?;

        Ok(self.folder_for_date(published))
    }

    fn folder_for_date(&self, published: NaiveDateTime) -> PathBuf {
        self.root
            .join(published.format("%Y").to_string())
            .join(published.format("%Y-%m-%d").to_string())
    }

    /// Searches the archive for `video_<id>.json`
    ///
    /// Only the `<year>/<day>` levels are inspected. A missing root means the
    /// video has not been downloaded.
    pub fn find_existing(&self, video_id: &str) -> Result<Option<ExistingVideo>, StoreError> {
        let file_name = metadata_file_name(video_id);

        for year_dir in subdirectories(&self.root)? {
            for day_dir in subdirectories(&year_dir)? {
                if day_dir.join(&file_name).is_file() {
                    let has_subtitles = Self::has_subtitles(&day_dir);
                    return Ok(Some(ExistingVideo {
                        dir: day_dir,
                        has_subtitles,
                    }));
                }
            }
        }

        Ok(None)
    }

    /// Returns true when the folder has a non-empty `subs/` directory
    pub fn has_subtitles(dir: &Path) -> bool {
        fs::read_dir(dir.join(SUBTITLES_DIR))
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false)
    }

    /// Creates a directory and all of its parents
    pub fn create_dir(&self, dir: &Path) -> Result<(), StoreError> {
        fs::create_dir_all(dir).map_err(|e| StoreError::DirectoryCreationFailed {
            path: dir.to_path_buf(),
            source: e,
        })
    }

    /// Writes `video_<id>.json` into the given folder
    ///
    /// The file is written to a temporary sibling first and renamed into
    /// place, so an interrupted run never leaves a truncated metadata file
    /// that would make the video look downloaded.
    pub fn save_metadata(&self, metadata: &VideoMetadata, dir: &Path) -> Result<PathBuf, StoreError> {
        let content = serde_json::to_string_pretty(metadata)?;
        let path = dir.join(metadata_file_name(&metadata.id));
        let temp_path = path.with_extension("json.tmp");

        fs::write(&temp_path, content).map_err(|e| StoreError::WriteFailed {
            path: temp_path.clone(),
            source: e,
        })?;

        fs::rename(&temp_path, &path).map_err(|e| StoreError::WriteFailed {
            path: path.clone(),
            source: e,
        })?;

        Ok(path)
    }

    /// Writes one subtitle track as `subs/<id>_<lang>.vtt`
    pub fn write_subtitle(
        &self,
        dir: &Path,
        video_id: &str,
        lang: &str,
        content: &[u8],
    ) -> Result<PathBuf, StoreError> {
        let subs_dir = dir.join(SUBTITLES_DIR);
        self.create_dir(&subs_dir)?;

        let path = subs_dir.join(format!("{video_id}_{lang}.vtt"));
        fs::write(&path, content).map_err(|e| StoreError::WriteFailed {
            path: path.clone(),
            source: e,
        })?;

        Ok(path)
    }

    /// Sets the modification time of a folder to the publication time
    pub fn set_folder_time(&self, dir: &Path, published: NaiveDateTime) -> Result<(), StoreError> {
        let time = SystemTime::from(published.and_utc());
        let times = FileTimes::new().set_accessed(time).set_modified(time);

        File::open(dir)
            .and_then(|folder| folder.set_times(times))
            .map_err(|e| StoreError::WriteFailed {
                path: dir.to_path_buf(),
                source: e,
            })
    }
}

/// File name of the metadata file of a video
pub fn metadata_file_name(video_id: &str) -> String {
    format!("video_{video_id}.json")
}

/// Lists the subdirectories of a directory; a missing directory has none
fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(StoreError::ReadFailed {
                path: dir.to_path_buf(),
                source: e,
            });
        }
    };

    let mut dirs = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| StoreError::ReadFailed {
                path: dir.to_path_buf(),
                source: e,
            })?
            .path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();

    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn metadata(id: &str, published: &str) -> VideoMetadata {
        VideoMetadata {
            uri: format!("https://www.rtve.es/api/videos/{id}"),
            html_url: format!("https://www.rtve.es/play/videos/telediario-2/14-03-25/{id}/"),
            id: id.to_string(),
            long_title: "Telediario - 21 horas - 14/03/25".to_string(),
            publication_date: published.to_string(),
        }
    }

    #[test]
    fn test_folder_for_uses_publication_date() {
        let store = VideoStore::new("/archive");
        let folder = store
            .folder_for(&metadata("16492499", "14-03-2025 21:00:00"))
            .unwrap();
        assert_eq!(folder, PathBuf::from("/archive/2025/2025-03-14"));
    }

    #[test]
    fn test_folder_for_invalid_date() {
        let store = VideoStore::new("/archive");
        let err = store.folder_for(&metadata("1", "yesterday")).unwrap_err();
        assert!(matches!(err, StoreError::InvalidDate { .. }));
    }

    #[test]
    fn test_find_existing_on_missing_root() {
        let temp = tempfile::tempdir().unwrap();
        let store = VideoStore::new(temp.path().join("does-not-exist"));
        assert_eq!(store.find_existing("16492499").unwrap(), None);
    }

    #[test]
    fn test_save_and_find_existing() {
        let temp = tempfile::tempdir().unwrap();
        let store = VideoStore::new(temp.path());
        let meta = metadata("16492499", "14-03-2025 21:00:00");

        let dir = store.folder_for(&meta).unwrap();
        store.create_dir(&dir).unwrap();
        let path = store.save_metadata(&meta, &dir).unwrap();
        assert_eq!(path, dir.join("video_16492499.json"));
        assert!(!dir.join("video_16492499.json.tmp").exists());

        let written: VideoMetadata =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, meta);

        assert_eq!(
            store.find_existing("16492499").unwrap(),
            Some(ExistingVideo {
                dir: dir.clone(),
                has_subtitles: false,
            })
        );
        assert_eq!(store.find_existing("16492500").unwrap(), None);

        store
            .write_subtitle(&dir, "16492499", "es", b"WEBVTT\n")
            .unwrap();
        assert!(dir.join("subs/16492499_es.vtt").is_file());
        assert!(store.find_existing("16492499").unwrap().unwrap().has_subtitles);
    }

    #[test]
    fn test_empty_subs_dir_has_no_subtitles() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir_all(temp.path().join(SUBTITLES_DIR)).unwrap();
        assert!(!VideoStore::has_subtitles(temp.path()));
    }

    #[test]
    fn test_set_folder_time() {
        let temp = tempfile::tempdir().unwrap();
        let store = VideoStore::new(temp.path());
        let dir = temp.path().join("2025/2025-03-14");
        store.create_dir(&dir).unwrap();

        let published = NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(21, 0, 0)
            .unwrap();
        store.set_folder_time(&dir, published).unwrap();

        let modified = fs::metadata(&dir).unwrap().modified().unwrap();
        assert_eq!(modified, SystemTime::from(published.and_utc()));
    }
}
