//! Records shared between the assembler, the CLI report and the server.

use std::path::PathBuf;

/// One rendered page, owned by the assembler for a single write.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedPage {
    /// Destination file.
    pub path: PathBuf,
    /// Complete HTML document.
    pub content: String,
}

/// One post directory as listed on the posts index.
#[derive(Debug, Clone, PartialEq)]
pub struct PostIndexEntry {
    /// Link to the post directory, relative to the site root.
    pub href: String,
    /// Display title of the post's first (most recent) variant.
    pub title: String,
    pub date: String,
    pub languages: Vec<IndexLanguage>,
}

/// A language link on the posts index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexLanguage {
    pub language: String,
    pub href: String,
}

/// What happened to a page on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// Content on disk already matched; the file was not touched.
    Unchanged,
}

/// What happened to a primary-language alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasOutcome {
    Symlinked,
    Redirected,
    /// Something already exists at the alias path and was left alone.
    Kept,
}
