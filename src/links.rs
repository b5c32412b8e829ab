//! Episode link extraction from listing pages

use crate::shows::Show;
use std::collections::HashSet;

/// Accepted length range of a numeric video id
const ID_LENGTH: std::ops::RangeInclusive<usize> = 6..=10;

/// A link to a single episode found on a listing page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoLink {
    /// Canonical episode URL without trailing slash
    pub url: String,
    /// Numeric video id taken from the last path segment
    pub id: String,
}

/// Extracts the distinct episode links of a show from page content
///
/// Every match of the show's link pattern is stripped of one trailing `/`
/// and split on `/`; the last segment is the video id. Ids that are not
/// 6 to 10 ASCII digits are rejected, since they can only come from a
/// pattern that captured unrelated markup.
///
/// Links are distinct by video id; the first URL seen for an id wins and
/// the order of first appearance on the page is kept.
pub fn extract_links(show: &Show, content: &str) -> Vec<VideoLink> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for found in show.link_pattern().find_iter(content) {
        let url = found.as_str();
        let url = url.strip_suffix('/').unwrap_or(url);

        let id = url.rsplit('/').next().unwrap_or_default();
        if !is_valid_id(id) {
            tracing::warn!(show = show.slug, url, id, "rejecting link with malformed video id");
            continue;
        }

        // The same video can be linked under several episode slugs
        if !seen.insert(id) {
            continue;
        }

        links.push(VideoLink {
            url: url.to_string(),
            id: id.to_string(),
        });
    }

    links
}

fn is_valid_id(id: &str) -> bool {
    ID_LENGTH.contains(&id.len()) && id.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shows::ShowRegistry;

    fn ids(show: &str, html: &str) -> Vec<String> {
        let registry = ShowRegistry::builtin();
        let show = registry.get(show).unwrap();
        extract_links(show, html).into_iter().map(|l| l.id).collect()
    }

    #[test]
    fn test_clean_urls() {
        let html = r#"
            <a href="https://www.rtve.es/play/videos/telediario-1/15-horas-03-10-25/16755959/">Video 1</a>
            <a href="https://www.rtve.es/play/videos/telediario-1/15-horas-02-10-25/16754110/">Video 2</a>
        "#;
        assert_eq!(ids("telediario-1", html), vec!["16755959", "16754110"]);
    }

    #[test]
    fn test_numeric_attributes_are_not_extracted() {
        let html = r#"
            <div data-id="09" data-order="10">
              <a href="https://www.rtve.es/play/videos/telediario-1/15-horas-03-10-25/16755959/" title="Some title with / slashes / 09">Video 1</a>
            </div>
            <div data-order="09">
              <a href="https://www.rtve.es/play/videos/telediario-1/15-horas-02-10-25/16754110/" data-id="10" class="link">Video 2</a>
            </div>
            <p>Path: /some/path/09/10/11</p>
        "#;
        assert_eq!(ids("telediario-1", html), vec!["16755959", "16754110"]);
    }

    #[test]
    fn test_duplicates_are_collapsed() {
        let html = r#"
            <div class="cellBox" data-idasset=16755959>
              <a class="goto_media" href="https://www.rtve.es/play/videos/telediario-1/15-horas-03-10-25/16755959/" title="Empezar a ver"></a>
              <a href="https://www.rtve.es/play/videos/telediario-1/15-horas-03-10-25/16755959/">Again</a>
              <a href="https://www.rtve.es/play/videos/telediario-1/15-horas-03-10-25/16755959">No slash</a>
            </div>
        "#;
        let registry = ShowRegistry::builtin();
        let links = extract_links(registry.get("telediario-1").unwrap(), html);
        assert_eq!(
            links,
            vec![VideoLink {
                url: "https://www.rtve.es/play/videos/telediario-1/15-horas-03-10-25/16755959"
                    .to_string(),
                id: "16755959".to_string(),
            }]
        );
    }

    #[test]
    fn test_same_id_under_different_slugs_is_collapsed() {
        let html = r#"
            <a href="https://www.rtve.es/play/videos/telediario-1/15-horas-03-10-25/16755959/">Video</a>
            <a href="https://www.rtve.es/play/videos/telediario-1/telediario-15-horas/16755959/">Same video</a>
            <a href="https://www.rtve.es/play/videos/telediario-1/15-horas-02-10-25/16754110/">Other</a>
        "#;
        let registry = ShowRegistry::builtin();
        let links = extract_links(registry.get("telediario-1").unwrap(), html);

        let ids: Vec<&str> = links.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["16755959", "16754110"]);
        assert!(links[0].url.contains("15-horas-03-10-25"));
    }

    #[test]
    fn test_other_shows_are_ignored() {
        let html = r#"
            <a href="https://www.rtve.es/play/videos/telediario-1/15-horas-03-10-25/16755959/">Valid</a>
            <a href="https://www.rtve.es/play/videos/telediario-2/21-horas-02-10-25/16754110/">Wrong show</a>
            <a href="https://www.example.com/some-other-site/">External</a>
            <a href="https://www.rtve.es/play/videos/telediario-1/another-video/16123456/">Another valid</a>
        "#;
        assert_eq!(ids("telediario-1", html), vec!["16755959", "16123456"]);
    }

    #[test]
    fn test_informe_semanal_links() {
        let html = r#"
            <a href="https://www.rtve.es/play/videos/informe-semanal/05-07-25/16123456/">Video 1</a>
            <a href="https://www.rtve.es/play/videos/informe-semanal/informe-26-07-25/16234567/">Video 2</a>
        "#;
        assert_eq!(ids("informe-semanal", html), vec!["16123456", "16234567"]);
    }

    #[test]
    fn test_short_ids_are_rejected() {
        let html = r#"
            <a href="https://www.rtve.es/play/videos/telediario-2/bogus/09/">Too short</a>
            <a href="https://www.rtve.es/play/videos/telediario-2/21-horas-17-03-25/16495457/">Video</a>
        "#;
        assert_eq!(ids("telediario-2", html), vec!["16495457"]);
    }

    #[test]
    fn test_empty_page() {
        assert!(ids("telediario-matinal", "<html><body></body></html>").is_empty());
    }

    #[test]
    fn test_is_valid_id() {
        assert!(is_valid_id("123456"));
        assert!(is_valid_id("1234567890"));
        assert!(!is_valid_id("12345"));
        assert!(!is_valid_id("12345678901"));
        assert!(!is_valid_id("1234a678"));
    }
}
