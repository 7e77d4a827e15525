//! Shared test utilities for the postgen test suite.
//!
//! [`SiteFixture`] builds a throwaway site root in a temp directory, so tests
//! describe their inputs inline instead of depending on checked-in fixtures.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let site = SiteFixture::new();
//! site.post("globe", "published: true\nlanguages: [en, fr]\n")
//!     .language("en", "", "# Globe")
//!     .language("fr", "title: Globe\n", "# Globe");
//!
//! let variants = discover_posts(&site.posts_dir()).unwrap();
//! assert_eq!(languages(&variants), vec!["en", "fr"]);
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::scan::{INFO_FILE, LanguageVariant};

// =========================================================================
// Fixture setup
// =========================================================================

/// A site root in a temp directory, deleted on drop.
pub struct SiteFixture {
    tmp: TempDir,
}

/// A post directory inside a [`SiteFixture`].
pub struct PostFixture {
    dir: PathBuf,
}

impl SiteFixture {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("posts")).unwrap();
        Self { tmp }
    }

    pub fn root(&self) -> &Path {
        self.tmp.path()
    }

    pub fn posts_dir(&self) -> PathBuf {
        self.root().join("posts")
    }

    /// Create `posts/<name>/info.yml`.
    pub fn post(&self, name: &str, info_yaml: &str) -> PostFixture {
        let dir = self.posts_dir().join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(INFO_FILE), info_yaml).unwrap();
        PostFixture { dir }
    }

    /// Create `posts/<name>/` with arbitrary files and no implied metadata.
    pub fn bare_dir(&self, name: &str, files: &[(&str, &str)]) -> PathBuf {
        let dir = self.posts_dir().join(name);
        fs::create_dir_all(&dir).unwrap();
        for (file, content) in files {
            fs::write(dir.join(file), content).unwrap();
        }
        dir
    }

    /// Create `templates/<name>`.
    pub fn template(&self, name: &str, content: &str) {
        let dir = self.root().join("templates");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), content).unwrap();
    }

    /// Write the site's `config.toml`.
    pub fn config(&self, toml: &str) {
        fs::write(self.root().join(crate::config::CONFIG_FILE), toml).unwrap();
    }

    /// Read a file relative to the site root. Panics if it does not exist.
    pub fn read(&self, rel: &str) -> String {
        let path = self.root().join(rel);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.root().join(rel).symlink_metadata().is_ok()
    }
}

impl PostFixture {
    /// Write `<lang>.yml` and `<lang>.md`. An empty markdown string still
    /// creates the file.
    pub fn language(&self, lang: &str, yaml: &str, markdown: &str) -> &Self {
        fs::write(self.dir.join(format!("{lang}.yml")), yaml).unwrap();
        fs::write(self.dir.join(format!("{lang}.md")), markdown).unwrap();
        self
    }

    /// Write only `<lang>.yml`, leaving the markdown source missing.
    pub fn language_without_markdown(&self, lang: &str, yaml: &str) -> &Self {
        fs::write(self.dir.join(format!("{lang}.yml")), yaml).unwrap();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

// =========================================================================
// Variant lookups
// =========================================================================

/// Languages of the variants, in order.
pub fn languages(variants: &[LanguageVariant]) -> Vec<&str> {
    variants.iter().map(|v| v.language.as_str()).collect()
}

/// Directory name of the variant's post.
pub fn post_name(variant: &LanguageVariant) -> String {
    variant
        .root_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Find a variant by post directory name and language. Panics if not found.
pub fn find_variant<'a>(
    variants: &'a [LanguageVariant],
    post: &str,
    language: &str,
) -> &'a LanguageVariant {
    variants
        .iter()
        .find(|v| post_name(v) == post && v.language == language)
        .unwrap_or_else(|| {
            let found: Vec<String> = variants
                .iter()
                .map(|v| format!("{}/{}", post_name(v), v.language))
                .collect();
            panic!("variant '{post}/{language}' not found. Available: {found:?}")
        })
}
