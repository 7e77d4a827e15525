//! Video catalog.
//!
//! Besides posts, a site may list videos in `videos/videos.yml`. Each entry
//! gets its own page under `videos/` and a line on the `videos.html` index.
//!
//! ```yaml
//! - name-link: drawing-a-globe      # → videos/drawing-a-globe.html
//!   title: Drawing a globe
//!   url: https://youtu.be/dQw4w9WgXcQ
//!   date: 2024-03-02
//!   description: Timelapse of the globe figure.
//! ```
//!
//! Keys may be written with dashes or underscores (`name-link` and
//! `name_link` are the same field). Keys the catalog does not know are
//! ignored. Links to YouTube videos are rewritten to the embeddable player
//! URL, see [`embed_url`].

use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Query appended to every embed URL.
const EMBED_QUALITY: &str = "vq=hd720p";

#[derive(Error, Debug)]
pub enum VideoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error in {path}: {source}")]
    Yaml {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("Invalid name_link '{0}': must be a single path segment")]
    NameLink(String),
}

/// One catalog entry, with keys normalized and the URL already embeddable.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Video {
    /// Page name under the videos directory, without `.html`.
    pub name_link: String,
    pub url: String,
    #[serde(default, deserialize_with = "crate::metadata::scalar_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "crate::metadata::scalar_string")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "crate::metadata::scalar_string")]
    pub description: Option<String>,
}

impl Video {
    /// Title to display: the catalog title, or the page name.
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.name_link)
    }

    pub fn page_file_name(&self) -> String {
        format!("{}.html", self.name_link)
    }
}

/// Parse catalog YAML. An empty document is an empty catalog.
pub fn parse_catalog(content: &str, path: &Path) -> Result<Vec<Video>, VideoError> {
    let yaml_error = |source: serde_yaml::Error| VideoError::Yaml {
        path: path.display().to_string(),
        source,
    };
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let entries: Vec<serde_yaml::Mapping> = serde_yaml::from_str(content).map_err(yaml_error)?;
    entries
        .into_iter()
        .map(|entry| {
            let mut video: Video =
                serde_yaml::from_value(serde_yaml::Value::Mapping(normalize_keys(entry)))
                    .map_err(yaml_error)?;
            if video.name_link.is_empty()
                || video.name_link == ".."
                || video.name_link.contains(['/', '\\'])
            {
                return Err(VideoError::NameLink(video.name_link));
            }
            video.url = embed_url(&video.url);
            Ok(video)
        })
        .collect()
}

/// Read and parse a catalog file.
pub fn load_catalog(path: &Path) -> Result<Vec<Video>, VideoError> {
    let content = fs::read_to_string(path)?;
    parse_catalog(&content, path)
}

/// Replace dashes in string keys with underscores.
fn normalize_keys(entry: serde_yaml::Mapping) -> serde_yaml::Mapping {
    entry
        .into_iter()
        .map(|(key, value)| match key {
            serde_yaml::Value::String(k) => (serde_yaml::Value::String(k.replace('-', "_")), value),
            other => (other, value),
        })
        .collect()
}

/// Rewrite a video link to the YouTube embed player.
///
/// The video id is the last path segment (`youtu.be/<id>`,
/// `youtube.com/embed/<id>`) or the `v` parameter of a `watch?v=<id>` link.
pub fn embed_url(url: &str) -> String {
    let last = url.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
    let (segment, query) = last.split_once('?').unwrap_or((last, ""));
    let id = if segment == "watch" {
        query
            .split('&')
            .find_map(|pair| pair.strip_prefix("v="))
            .unwrap_or_default()
    } else {
        segment
    };
    format!("https://youtube.com/embed/{id}?{EMBED_QUALITY}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Result<Vec<Video>, VideoError> {
        parse_catalog(yaml, Path::new("videos/videos.yml"))
    }

    #[test]
    fn short_link_becomes_embed() {
        assert_eq!(
            embed_url("https://youtu.be/dQw4w9WgXcQ"),
            "https://youtube.com/embed/dQw4w9WgXcQ?vq=hd720p"
        );
    }

    #[test]
    fn watch_link_uses_v_parameter() {
        assert_eq!(
            embed_url("https://www.youtube.com/watch?v=abc123&t=10"),
            "https://youtube.com/embed/abc123?vq=hd720p"
        );
    }

    #[test]
    fn dashed_keys_are_normalized() {
        let videos = parse(
            "- name-link: globe\n  url: https://youtu.be/xyz\n  title: Globe\n  date: 2024-03-02\n",
        )
        .unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].name_link, "globe");
        assert_eq!(videos[0].url, "https://youtube.com/embed/xyz?vq=hd720p");
        assert_eq!(videos[0].date.as_deref(), Some("2024-03-02"));
        assert_eq!(videos[0].page_file_name(), "globe.html");
    }

    #[test]
    fn underscore_keys_and_extra_fields_accepted() {
        let videos = parse("- name_link: a\n  url: https://youtu.be/1\n  views: 12\n").unwrap();
        assert_eq!(videos[0].name_link, "a");
        assert_eq!(videos[0].display_title(), "a");
    }

    #[test]
    fn missing_url_is_an_error() {
        assert!(matches!(parse("- name-link: a\n"), Err(VideoError::Yaml { .. })));
    }

    #[test]
    fn name_link_with_separator_rejected() {
        let result = parse("- name-link: ../escape\n  url: https://youtu.be/1\n");
        assert!(matches!(result, Err(VideoError::NameLink(_))));
    }

    #[test]
    fn empty_catalog() {
        assert!(parse("").unwrap().is_empty());
    }
}
