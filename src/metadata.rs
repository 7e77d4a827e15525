//! Post metadata records and their layered resolution.
//!
//! Each post directory carries metadata in two layers:
//!
//! ## Base layer: `info.yml`
//!
//! Shared by every language of the post. Declares the `languages` list (its
//! order decides which language is primary) plus defaults for the fields
//! below.
//!
//! ```yaml
//! title: Drawing a globe
//! date: 2024-03-02
//! published: true
//! languages: [en, fr]
//! ```
//!
//! ## Override layer: `<language>.yml`
//!
//! Sparse. Any of `title`, `date`, `edited`, `published` may be given; fields
//! left out (or left empty) keep the base value.
//!
//! ```yaml
//! title: Dessiner un globe
//! ```
//!
//! ## Resolution
//!
//! Each field is resolved independently with [`resolve`]: the override wins
//! when present and non-empty, then the base, then a stock default. Booleans
//! have no "empty" state, so an explicit `published: false` in a language
//! file unpublishes that language only.

use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_TITLE: &str = "No title";
pub const DEFAULT_DATE: &str = "1997-12-22";

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error in {path}: {source}")]
    Yaml {
        path: String,
        source: serde_yaml::Error,
    },
}

/// One metadata layer as written by the author. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PostMeta {
    #[serde(deserialize_with = "scalar_string")]
    pub title: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub date: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub edited: Option<String>,
    pub published: Option<bool>,
    pub languages: Vec<String>,
}

/// Fully resolved metadata for one language of a post.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMeta {
    pub title: String,
    pub date: String,
    pub edited: Option<String>,
    pub published: bool,
}

impl PostMeta {
    /// Parse a metadata layer from YAML text. An empty document is an empty layer.
    pub fn from_yaml(content: &str, path: &Path) -> Result<Self, MetadataError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str::<Option<PostMeta>>(content)
            .map(Option::unwrap_or_default)
            .map_err(|source| MetadataError::Yaml {
                path: path.display().to_string(),
                source,
            })
    }

    /// Read and parse a metadata file.
    pub fn load(path: &Path) -> Result<Self, MetadataError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content, path)
    }

    /// Merge `overlay` on top of `self`, field by field.
    pub fn overlaid(&self, overlay: &PostMeta) -> PostMeta {
        PostMeta {
            title: resolve(&[overlay.title.as_deref(), self.title.as_deref()]),
            date: resolve(&[overlay.date.as_deref(), self.date.as_deref()]),
            edited: resolve(&[overlay.edited.as_deref(), self.edited.as_deref()]),
            published: overlay.published.or(self.published),
            languages: self.languages.clone(),
        }
    }

    /// Fill stock defaults for anything neither layer provided.
    pub fn resolved(&self) -> ResolvedMeta {
        ResolvedMeta {
            title: self.title.clone().unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            date: self.date.clone().unwrap_or_else(|| DEFAULT_DATE.to_string()),
            edited: self.edited.clone(),
            published: self.published.unwrap_or(false),
        }
    }
}

/// Resolve a metadata field from multiple sources.
///
/// Takes a list of optional values in priority order and returns the first
/// non-None, non-empty value.
///
/// ```text
/// title: resolve(&[language_title, base_title])
/// ```
pub fn resolve(sources: &[Option<&str>]) -> Option<String> {
    sources
        .iter()
        .filter_map(|opt| {
            opt.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        })
        .next()
}

/// Accept any YAML scalar as a string: `date: 2024-03-02` is a string in
/// YAML 1.2, but `date: 2024` or `title: 42` are numbers.
pub(crate) fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_yaml::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_yaml::Value::String(s)) => Some(s),
        Some(serde_yaml::Value::Number(n)) => Some(n.to_string()),
        Some(serde_yaml::Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}
