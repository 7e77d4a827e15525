//! Post discovery.
//!
//! Stage 1 of a regeneration run. Scans the posts directory and produces one
//! [`LanguageVariant`] per renderable (post, language) pair.
//!
//! ## Directory Structure
//!
//! ```text
//! posts/                       # Posts root
//! ├── globe/                   # One post per subdirectory
//! │   ├── info.yml             # Base metadata (required)
//! │   ├── en.yml               # Per-language overrides (required per language)
//! │   ├── en.md                # Content
//! │   ├── fr.yml
//! │   ├── fr.md
//! │   └── globe.png            # Figures, referenced relative to the post
//! └── drafts-notes/            # No info.yml → skipped with a notice
//!     └── en.md
//! ```
//!
//! ## Rules
//!
//! - Subdirectories are visited in name order, so discovery order is stable.
//! - A post without a readable `info.yml` is skipped, never fatal.
//! - A language without its `<language>.yml` is skipped for that language
//!   only; the other languages of the post still generate.
//! - The first entry of `languages` is the primary language.
//! - Variants are returned regardless of `published`; callers filter with
//!   [`published_variants`].

use crate::metadata::{MetadataError, PostMeta};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Base metadata file name inside each post directory.
pub const INFO_FILE: &str = "info.yml";

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Posts directory not found: {0}")]
    MissingRoot(PathBuf),
}

/// One renderable instance of a post in one language.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageVariant {
    /// The post directory.
    pub root_dir: PathBuf,
    pub language: String,
    /// True iff this language comes first in the post's `languages`.
    pub is_primary: bool,
    pub title: String,
    pub publish_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edited_date: Option<String>,
    pub published: bool,
}

impl LanguageVariant {
    /// `<root_dir>/<language>.yml`
    pub fn meta_path(&self) -> PathBuf {
        self.root_dir.join(format!("{}.yml", self.language))
    }

    /// `<root_dir>/<language>.md`
    pub fn markdown_path(&self) -> PathBuf {
        self.root_dir.join(format!("{}.md", self.language))
    }

    /// `<root_dir>/<language>.html`
    pub fn html_path(&self) -> PathBuf {
        self.root_dir.join(self.html_file_name())
    }

    /// `<language>.html`, the alias target for primary variants.
    pub fn html_file_name(&self) -> String {
        format!("{}.html", self.language)
    }
}

/// Why a post or a language was left out of discovery.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The post directory has no base metadata file.
    MissingInfo,
    /// The base metadata file could not be read or parsed.
    InvalidInfo(String),
    /// The language is listed but has no metadata file.
    MissingLanguageMeta(String),
    /// The language metadata file could not be read or parsed.
    InvalidLanguageMeta(String, String),
}

/// A post directory or language that discovery passed over.
#[derive(Debug, Clone, PartialEq)]
pub struct Skipped {
    pub dir: PathBuf,
    pub reason: SkipReason,
}

/// Everything discovery found, including what it skipped.
#[derive(Debug, Default)]
pub struct Discovery {
    pub variants: Vec<LanguageVariant>,
    pub skipped: Vec<Skipped>,
}

/// Discover every language variant under `posts_root`.
///
/// Skips are logged and dropped; use [`scan`] to inspect them.
pub fn discover_posts(posts_root: &Path) -> Result<Vec<LanguageVariant>, ScanError> {
    Ok(scan(posts_root)?.variants)
}

/// Discover variants and keep a record of skipped posts and languages.
pub fn scan(posts_root: &Path) -> Result<Discovery, ScanError> {
    if !posts_root.is_dir() {
        return Err(ScanError::MissingRoot(posts_root.to_path_buf()));
    }

    let mut discovery = Discovery::default();
    for dir in collect_post_dirs(posts_root)? {
        scan_post(&dir, &mut discovery);
    }
    Ok(discovery)
}

fn collect_post_dirs(posts_root: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(posts_root)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_dir()
                && !p
                    .file_name()
                    .map(|n| n.to_string_lossy().starts_with('.'))
                    .unwrap_or(true)
        })
        .collect();
    dirs.sort();
    Ok(dirs)
}

fn scan_post(dir: &Path, discovery: &mut Discovery) {
    let info_path = dir.join(INFO_FILE);
    if !info_path.is_file() {
        tracing::warn!(post = %dir.display(), "skipping post without {INFO_FILE}");
        discovery.skipped.push(Skipped {
            dir: dir.to_path_buf(),
            reason: SkipReason::MissingInfo,
        });
        return;
    }

    let base = match PostMeta::load(&info_path) {
        Ok(base) => base,
        Err(e) => {
            tracing::warn!(post = %dir.display(), "skipping post: {e}");
            discovery.skipped.push(Skipped {
                dir: dir.to_path_buf(),
                reason: SkipReason::InvalidInfo(e.to_string()),
            });
            return;
        }
    };

    for (index, language) in base.languages.iter().enumerate() {
        match load_language(dir, language, &base) {
            Ok(variant) => discovery.variants.push(LanguageVariant {
                is_primary: index == 0,
                ..variant
            }),
            Err(reason) => {
                tracing::warn!(post = %dir.display(), language = %language, "skipping language: {reason:?}");
                discovery.skipped.push(Skipped {
                    dir: dir.to_path_buf(),
                    reason,
                });
            }
        }
    }
}

fn load_language(dir: &Path, language: &str, base: &PostMeta) -> Result<LanguageVariant, SkipReason> {
    let lang_path = dir.join(format!("{language}.yml"));
    if !lang_path.is_file() {
        return Err(SkipReason::MissingLanguageMeta(language.to_string()));
    }
    let overlay = PostMeta::load(&lang_path).map_err(|e: MetadataError| {
        SkipReason::InvalidLanguageMeta(language.to_string(), e.to_string())
    })?;
    let meta = base.overlaid(&overlay).resolved();

    Ok(LanguageVariant {
        root_dir: dir.to_path_buf(),
        language: language.to_string(),
        is_primary: false,
        title: meta.title,
        publish_date: meta.date,
        edited_date: meta.edited,
        published: meta.published,
    })
}

/// Keep only variants whose `published` flag is set.
pub fn published_variants(variants: Vec<LanguageVariant>) -> Vec<LanguageVariant> {
    variants.into_iter().filter(|v| v.published).collect()
}

/// Sort by publish date, most recent first. Stable: equal dates keep
/// discovery order.
pub fn sort_by_date_desc(variants: &mut [LanguageVariant]) {
    variants.sort_by(|a, b| b.publish_date.cmp(&a.publish_date));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;

    #[test]
    fn discovers_each_language() {
        let site = SiteFixture::new();
        site.post("globe", "title: Globe\ndate: 2024-03-02\npublished: true\nlanguages: [en, fr]\n")
            .language("en", "", "# Globe")
            .language("fr", "title: Globe (fr)\n", "# Globe");

        let variants = discover_posts(&site.posts_dir()).unwrap();
        assert_eq!(languages(&variants), vec!["en", "fr"]);
        assert_eq!(variants[0].title, "Globe");
        assert_eq!(variants[1].title, "Globe (fr)");
        assert_eq!(variants[1].publish_date, "2024-03-02");
    }

    #[test]
    fn first_language_is_primary() {
        let site = SiteFixture::new();
        site.post("globe", "published: true\nlanguages: [fr, en]\n")
            .language("en", "", "")
            .language("fr", "", "");

        let variants = discover_posts(&site.posts_dir()).unwrap();
        let fr = find_variant(&variants, "globe", "fr");
        let en = find_variant(&variants, "globe", "en");
        assert!(fr.is_primary);
        assert!(!en.is_primary);
    }

    #[test]
    fn post_without_info_is_skipped() {
        let site = SiteFixture::new();
        site.bare_dir("drafts", &[("en.md", "# Draft")]);
        site.post("globe", "published: true\nlanguages: [en]\n")
            .language("en", "", "");

        let discovery = scan(&site.posts_dir()).unwrap();
        assert_eq!(discovery.variants.len(), 1);
        assert_eq!(discovery.skipped.len(), 1);
        assert_eq!(discovery.skipped[0].reason, SkipReason::MissingInfo);
    }

    #[test]
    fn unparsable_info_is_skipped_not_fatal() {
        let site = SiteFixture::new();
        site.bare_dir("broken", &[(INFO_FILE, "title: [unclosed")]);

        let discovery = scan(&site.posts_dir()).unwrap();
        assert!(discovery.variants.is_empty());
        assert!(matches!(
            discovery.skipped[0].reason,
            SkipReason::InvalidInfo(_)
        ));
    }

    #[test]
    fn missing_language_meta_skips_only_that_language() {
        let site = SiteFixture::new();
        site.post("globe", "published: true\nlanguages: [en, de, fr]\n")
            .language("en", "", "")
            .language("fr", "", "");

        let discovery = scan(&site.posts_dir()).unwrap();
        assert_eq!(languages(&discovery.variants), vec!["en", "fr"]);
        assert_eq!(
            discovery.skipped[0].reason,
            SkipReason::MissingLanguageMeta("de".to_string())
        );
    }

    #[test]
    fn primary_stays_with_first_listed_even_if_skipped() {
        let site = SiteFixture::new();
        site.post("globe", "published: true\nlanguages: [de, en]\n")
            .language("en", "", "");

        let variants = discover_posts(&site.posts_dir()).unwrap();
        assert!(!variants[0].is_primary);
    }

    #[test]
    fn missing_posts_root_is_error() {
        let site = SiteFixture::new();
        let result = scan(&site.root().join("nope"));
        assert!(matches!(result, Err(ScanError::MissingRoot(_))));
    }

    #[test]
    fn derived_paths() {
        let variant = LanguageVariant {
            root_dir: PathBuf::from("posts/globe"),
            language: "en".to_string(),
            is_primary: true,
            title: "Globe".to_string(),
            publish_date: "2024-03-02".to_string(),
            edited_date: None,
            published: true,
        };
        assert_eq!(variant.meta_path(), PathBuf::from("posts/globe/en.yml"));
        assert_eq!(variant.markdown_path(), PathBuf::from("posts/globe/en.md"));
        assert_eq!(variant.html_path(), PathBuf::from("posts/globe/en.html"));
    }

    #[test]
    fn published_filter_drops_unpublished() {
        let site = SiteFixture::new();
        site.post("draft", "published: false\nlanguages: [en]\n")
            .language("en", "", "# Draft");
        site.post("live", "published: true\nlanguages: [en, fr]\n")
            .language("en", "", "")
            .language("fr", "published: false\n", "");

        let variants = published_variants(discover_posts(&site.posts_dir()).unwrap());
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].root_dir, site.posts_dir().join("live"));
        assert_eq!(variants[0].language, "en");
    }

    #[test]
    fn sort_is_date_descending_and_stable() {
        let site = SiteFixture::new();
        site.post("a-old", "date: 2020-01-01\npublished: true\nlanguages: [en]\n")
            .language("en", "", "");
        site.post("b-new", "date: 2024-01-01\npublished: true\nlanguages: [en, fr]\n")
            .language("en", "", "")
            .language("fr", "", "");
        site.post("c-mid", "date: 2022-01-01\npublished: true\nlanguages: [en]\n")
            .language("en", "", "");

        let mut variants = discover_posts(&site.posts_dir()).unwrap();
        sort_by_date_desc(&mut variants);
        let order: Vec<(String, &str)> = variants
            .iter()
            .map(|v| (post_name(v), v.language.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("b-new".to_string(), "en"),
                ("b-new".to_string(), "fr"),
                ("c-mid".to_string(), "en"),
                ("a-old".to_string(), "en"),
            ]
        );
    }

    #[test]
    fn hidden_directories_ignored() {
        let site = SiteFixture::new();
        site.bare_dir(".cache", &[(INFO_FILE, "languages: [en]\n")]);
        let discovery = scan(&site.posts_dir()).unwrap();
        assert!(discovery.variants.is_empty());
        assert!(discovery.skipped.is_empty());
    }
}
