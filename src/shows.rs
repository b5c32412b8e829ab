//! Show registry
//!
//! This module holds the fixed set of RTVE shows the crate knows how to
//! fetch. Each show maps to the paginated listing module on rtve.es and to
//! the pattern that recognizes episode links inside that listing.

use regex::Regex;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur while looking up a show
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShowError {
    /// The requested slug is not part of the registry
    #[error("Unknown show: {0}")]
    UnknownShow(String),
}

/// A configured RTVE show
#[derive(Debug, Clone)]
pub struct Show {
    /// Short slug used on the command line (e.g. `telediario-1`)
    pub slug: &'static str,
    /// Numeric program id of the listing module on rtve.es
    pub program_id: &'static str,
    /// Listing URL with a `{page}` placeholder
    listing_url_template: String,
    /// Compiled episode link pattern
    link_pattern: Regex,
}

impl Show {
    fn new(
        slug: &'static str,
        program_id: &'static str,
        listing_url_template: String,
        link_pattern: &str,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            slug,
            program_id,
            listing_url_template,
            link_pattern: Regex::new(link_pattern)?,
        })
    }

    /// Returns the listing URL for the given zero-based page number
    pub fn listing_url(&self, page: usize) -> String {
        self.listing_url_template
            .replace("{page}", &page.to_string())
    }

    /// Returns the pattern matching episode links of this show
    pub fn link_pattern(&self) -> &Regex {
        &self.link_pattern
    }
}

/// Builds the link pattern for a show slug.
///
/// Episode links look like
/// `https://www.rtve.es/play/videos/<slug>/<episode-slug>/<digits>/`.
/// The episode slug may not contain separators, quotes or whitespace, so a
/// match can never run past the closing quote of an `href` attribute.
fn episode_link_pattern(slug: &str) -> String {
    format!(
        r#"https://www\.rtve\.es/play/videos/{}/[^/\s"'<>]+/[0-9]+/?"#,
        regex::escape(slug)
    )
}

/// Immutable lookup table of all known shows, built once at startup
#[derive(Debug, Clone)]
pub struct ShowRegistry {
    shows: BTreeMap<&'static str, Show>,
}

const LISTING_BASE: &str = "https://www.rtve.es/play/videos/modulos/capitulos";

/// (slug, program id) of every built-in show
const BUILTIN_SHOWS: &[(&str, &str)] = &[
    ("informe-semanal", "1631"),
    ("telediario-1", "45030"),
    ("telediario-2", "135930"),
    ("telediario-matinal", "135931"),
];

impl ShowRegistry {
    /// Creates the registry of the built-in RTVE shows
    pub fn builtin() -> Self {
        let mut shows = BTreeMap::new();

        for &(slug, program_id) in BUILTIN_SHOWS {
            let template = format!("{LISTING_BASE}/{program_id}/?page={{page}}");

            match Show::new(slug, program_id, template, &episode_link_pattern(slug)) {
                Ok(show) => {
                    shows.insert(slug, show);
                }
                Err(e) => tracing::error!(slug, error = %e, "invalid built-in link pattern"),
            }
        }

        Self { shows }
    }

    /// Looks up a show by slug
    pub fn get(&self, slug: &str) -> Result<&Show, ShowError> {
        self.shows
            .get(slug)
            .ok_or_else(|| ShowError::UnknownShow(slug.to_string()))
    }

    /// Returns all known slugs in sorted order
    pub fn slugs(&self) -> Vec<&'static str> {
        self.shows.keys().copied().collect()
    }

    /// Iterates over all shows in slug order
    pub fn iter(&self) -> impl Iterator<Item = &Show> {
        self.shows.values()
    }
}

impl Default for ShowRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
