//! Post body transform pipeline.
//!
//! Markdown goes through a fixed sequence of passes over one document tree:
//!
//! 1. **Convert**: markdown → [`Document`](crate::document::Document)
//! 2. **Anchor**: header ids for deep links ([`anchors`])
//! 3. **Highlight**: code blocks through a [`Highlighter`] ([`highlight`])
//! 4. **Figures**: numbering, wrapping, `[[id]]` resolution ([`figures`])
//! 5. **Footer**: publication dates ([`footer`])
//!
//! Order matters: highlighting runs before figure resolution so tokens inside
//! code blocks are left as written, and the footer is appended last so it is
//! never mistaken for content.

pub mod anchors;
pub mod figures;
pub mod footer;
pub mod highlight;

pub use figures::{FigureReference, FigureTable, MediaKind};
pub use highlight::{Highlighter, KeywordHighlighter};

use crate::config::{FiguresConfig, SiteConfig};
use crate::document::parse_markdown;

/// Settings and collaborators shared by every post in a run.
#[derive(Clone, Copy)]
pub struct TransformContext<'a> {
    pub figures: &'a FiguresConfig,
    /// Language for code blocks without a fence language.
    pub default_language: &'a str,
    pub highlighter: &'a dyn Highlighter,
}

impl<'a> TransformContext<'a> {
    pub fn new(config: &'a SiteConfig, highlighter: &'a dyn Highlighter) -> Self {
        Self {
            figures: &config.figures,
            default_language: &config.highlight.language,
            highlighter,
        }
    }
}

/// Render a post body to HTML.
///
/// `base_path` is the post directory relative to the site root, used to make
/// figure sources absolute.
pub fn render_post_body(
    markdown: &str,
    base_path: &str,
    publish_date: &str,
    edited_date: Option<&str>,
    ctx: &TransformContext<'_>,
) -> String {
    let mut doc = parse_markdown(markdown);
    anchors::anchor_headers(&mut doc);
    highlight::highlight_code_blocks(&mut doc, ctx.highlighter, ctx.default_language);
    figures::resolve_figures(&mut doc, base_path, ctx.figures);
    footer::add_footer(&mut doc, publish_date, edited_date);
    doc.to_html()
}
