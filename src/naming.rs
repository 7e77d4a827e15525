//! Centralized derivation of identifiers and relative paths.
//!
//! Three kinds of names are derived from author input, and each has exactly
//! one function here so every pass computes them the same way:
//!
//! - **Header anchors**: `"My Section"` → `my-section`
//! - **Figure identifiers**: `images/Night Sky.png` → `Night-Sky`
//! - **Relative roots**: `posts/globe` → `../..`, the prefix that lets a page
//!   reference shared assets without knowing where the site is deployed.

use std::path::{Component, Path};

/// Derive a header anchor from the header's text.
///
/// Lower-cased, spaces become hyphens. Nothing else is stripped, so
/// punctuation survives: `"What's New?"` → `what's-new?`.
pub fn anchor_id(text: &str) -> String {
    text.trim().to_lowercase().replace(' ', "-")
}

/// Derive a figure identifier from an image or video source.
///
/// The identifier is the file stem with spaces replaced by hyphens, which is
/// what authors write inside `[[...]]` cross-reference tokens.
pub fn figure_id(src: &str) -> String {
    let file_name = src.rsplit('/').next().unwrap_or(src);
    let stem = match file_name.rfind('.') {
        Some(0) | None => file_name,
        Some(dot) => &file_name[..dot],
    };
    stem.replace(' ', "-")
}

/// Lower-cased file suffix of a source reference, without the dot.
pub fn suffix(src: &str) -> Option<String> {
    let file_name = src.rsplit('/').next().unwrap_or(src);
    match file_name.rfind('.') {
        Some(0) | None => None,
        Some(dot) => Some(file_name[dot + 1..].to_ascii_lowercase()),
    }
}

/// Relative prefix from a page directory back to the site root.
///
/// `dir` is the page's directory relative to the site root. Depth zero
/// (empty or `.`) yields `"."`; otherwise one `..` per path component.
///
/// - `""` → `.`
/// - `"posts"` → `..`
/// - `"posts/globe"` → `../..`
pub fn relative_root(dir: &Path) -> String {
    let depth = dir
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count();
    if depth == 0 {
        ".".to_string()
    } else {
        vec![".."; depth].join("/")
    }
}

/// Join a relative root and a site-relative path with a single slash.
pub fn join_root(root: &str, path: &str) -> String {
    let path = path.trim_start_matches("./");
    if root == "." {
        format!("./{}", path)
    } else {
        format!("{}/{}", root.trim_end_matches('/'), path)
    }
}
