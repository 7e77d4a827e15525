//! CLI output formatting for discovery and regeneration runs.
//!
//! # Information-First Display
//!
//! Posts are listed by directory and language, with paths relative to the
//! site root so the output reads as a content inventory. Anything that was
//! passed over gets its own section with a reason, so a missing `info.yml`
//! is never silent.
//!
//! # Output Format
//!
//! ## Check
//!
//! ```text
//! Posts
//!     globe  2024-03-02  Globe
//!         en (primary)
//!         fr  unpublished
//!
//! Skipped
//!     posts/drafts: no info.yml
//!
//! 2 languages in 1 post, 1 published, 1 skipped
//! ```
//!
//! ## Build
//!
//! ```text
//! Posts
//!     posts/globe/en.html (written)
//!     posts/globe/index.html (symlinked)
//!
//! Index
//!     posts.html (unchanged)
//!
//! Videos
//!     videos/drawing-a-globe.html (written)
//!     videos.html (written)
//!
//! Generated 4 pages: 3 written, 1 unchanged
//! ```
//!
//! # Architecture
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::generate::{GenerateReport, PageKind};
use crate::scan::{Discovery, SkipReason, Skipped};
use crate::types::{AliasOutcome, WriteOutcome};
use std::path::Path;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    format!("{n} {}", if n == 1 { one } else { many })
}

fn display_rel(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

/// Human-readable reason for a skipped post or language.
pub fn describe_skip(reason: &SkipReason) -> String {
    match reason {
        SkipReason::MissingInfo => format!("no {}", crate::scan::INFO_FILE),
        SkipReason::InvalidInfo(e) => format!("unreadable {}: {e}", crate::scan::INFO_FILE),
        SkipReason::MissingLanguageMeta(lang) => format!("language '{lang}' has no {lang}.yml"),
        SkipReason::InvalidLanguageMeta(lang, e) => format!("unreadable {lang}.yml: {e}"),
    }
}

fn skipped_lines(skipped: &[Skipped], root: &Path) -> Vec<String> {
    skipped
        .iter()
        .map(|s| {
            format!(
                "{}{}: {}",
                indent(1),
                display_rel(&s.dir, root),
                describe_skip(&s.reason)
            )
        })
        .collect()
}

// ============================================================================
// Check: discovery only
// ============================================================================

/// Format discovery results grouped by post directory.
pub fn format_check_output(discovery: &Discovery, site_root: &Path) -> Vec<String> {
    let mut lines = Vec::new();
    let mut posts = 0;

    if !discovery.variants.is_empty() {
        lines.push("Posts".to_string());
    }
    let mut current_dir = None;
    for variant in &discovery.variants {
        if current_dir != Some(&variant.root_dir) {
            posts += 1;
            current_dir = Some(&variant.root_dir);
            let name = variant
                .root_dir
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            lines.push(format!(
                "{}{}  {}  {}",
                indent(1),
                name,
                variant.publish_date,
                variant.title
            ));
        }
        let mut line = format!("{}{}", indent(2), variant.language);
        if variant.is_primary {
            line.push_str(" (primary)");
        }
        if !variant.published {
            line.push_str("  unpublished");
        }
        lines.push(line);
    }

    if !discovery.skipped.is_empty() {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push("Skipped".to_string());
        lines.extend(skipped_lines(&discovery.skipped, site_root));
    }

    if !lines.is_empty() {
        lines.push(String::new());
    }
    let published = discovery.variants.iter().filter(|v| v.published).count();
    lines.push(format!(
        "{} in {}, {} published, {} skipped",
        plural(discovery.variants.len(), "language", "languages"),
        plural(posts, "post", "posts"),
        published,
        discovery.skipped.len()
    ));
    lines
}

pub fn print_check_output(discovery: &Discovery, site_root: &Path) {
    for line in format_check_output(discovery, site_root) {
        println!("{}", line);
    }
}

// ============================================================================
// Build: regeneration report
// ============================================================================

fn write_label(outcome: WriteOutcome) -> &'static str {
    match outcome {
        WriteOutcome::Written => "written",
        WriteOutcome::Unchanged => "unchanged",
    }
}

fn alias_label(outcome: AliasOutcome) -> &'static str {
    match outcome {
        AliasOutcome::Symlinked => "symlinked",
        AliasOutcome::Redirected => "redirect page",
        AliasOutcome::Kept => "kept",
    }
}

/// Format a regeneration report. Paths in the report are already relative
/// to the site root; skipped post directories are made relative here.
pub fn format_generate_report(report: &GenerateReport, site_root: &Path) -> Vec<String> {
    let mut sections: Vec<Vec<String>> = Vec::new();

    let mut posts = vec!["Posts".to_string()];
    for page in report
        .pages
        .iter()
        .filter(|p| matches!(p.kind, PageKind::Post { .. }))
    {
        posts.push(format!(
            "{}{} ({})",
            indent(1),
            page.path.display(),
            write_label(page.outcome)
        ));
    }
    for (path, outcome) in &report.aliases {
        posts.push(format!(
            "{}{} ({})",
            indent(1),
            path.display(),
            alias_label(*outcome)
        ));
    }
    if posts.len() > 1 {
        sections.push(posts);
    }

    for (title, kind) in [
        ("Index", PageKind::Index),
        ("Videos", PageKind::Video),
        ("Pages", PageKind::Static),
    ] {
        let mut section = vec![title.to_string()];
        for page in report.pages.iter().filter(|p| p.kind == kind) {
            section.push(format!(
                "{}{} ({})",
                indent(1),
                page.path.display(),
                write_label(page.outcome)
            ));
        }
        if section.len() > 1 {
            sections.push(section);
        }
    }

    let mut skipped = vec!["Skipped".to_string()];
    skipped.extend(skipped_lines(&report.skipped, site_root));
    for path in &report.missing_markdown {
        skipped.push(format!("{}{}: markdown not found", indent(1), path.display()));
    }
    for path in &report.missing_templates {
        skipped.push(format!("{}{}: template not found", indent(1), path.display()));
    }
    if skipped.len() > 1 {
        sections.push(skipped);
    }

    if !report.failures.is_empty() {
        let mut failed = vec!["Failed".to_string()];
        for failure in &report.failures {
            failed.push(format!(
                "{}{}: {}",
                indent(1),
                failure.path.display(),
                failure.error
            ));
        }
        sections.push(failed);
    }

    let mut lines = Vec::new();
    for section in sections {
        lines.extend(section);
        lines.push(String::new());
    }
    lines.push(format!(
        "Generated {}: {} written, {} unchanged",
        plural(report.pages.len(), "page", "pages"),
        report.written(),
        report.unchanged()
    ));
    if !report.failures.is_empty() {
        lines.push(format!("{} failed", plural(report.failures.len(), "page", "pages")));
    }
    lines
}

pub fn print_generate_report(report: &GenerateReport, site_root: &Path) {
    for line in format_generate_report(report, site_root) {
        println!("{}", line);
    }
}

/// One-line summary used by the watcher after each regeneration.
pub fn format_regeneration_summary(report: &GenerateReport) -> String {
    let mut line = format!(
        "Regenerated: {} written, {} unchanged",
        report.written(),
        report.unchanged()
    );
    let skipped = report.skipped.len() + report.missing_markdown.len();
    if skipped > 0 {
        line.push_str(&format!(", {skipped} skipped"));
    }
    if !report.failures.is_empty() {
        line.push_str(&format!(", {} failed", report.failures.len()));
    }
    line
}
