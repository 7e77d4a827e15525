//! # postgen
//!
//! A small static generator for multi-language markdown posts. Each post is a
//! directory under `posts/` holding an `info.yml`, one `<lang>.yml` and one
//! `<lang>.md` per language. Every language renders to `<lang>.html` beside
//! its source, the primary language also answers at the directory URL, and a
//! posts index lists everything that is published. An optional video catalog
//! adds one page per video and a video index.
//!
//! # Pipeline
//!
//! ```text
//! posts/<post>/            scan            transform              generate
//!   info.yml      ──▶  LanguageVariant ──▶  markdown ─▶ tree  ──▶  <lang>.html
//!   en.yml                                 anchors                 index.html (alias)
//!   en.md                                  highlight               posts.html
//!   fr.yml                                 figures + [[refs]]
//!   fr.md                                  footer
//! ```
//!
//! Regeneration is always a full rebuild. Pages whose bytes did not change
//! are not rewritten, so a rebuild over an unchanged tree touches nothing.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Post discovery: directories, languages, primary language, published flag |
//! | [`metadata`] | `info.yml` / `<lang>.yml` parsing and field overlay |
//! | [`document`] | Owned HTML tree built from the `pulldown-cmark` event stream |
//! | [`transform`] | Header anchors, code highlighting, figure numbering, footer |
//! | [`generate`] | Page assembly with Maud: post pages, aliases, posts index, video pages, static pages |
//! | [`videos`] | `videos/videos.yml` catalog parsing and YouTube embed links |
//! | [`watch`] | Debounced regeneration loop over `notify` events |
//! | [`serve`] | Development server with the watcher on a side thread |
//! | [`config`] | `config.toml` loading over stock defaults, validation |
//! | [`naming`] | Header anchor ids and figure identifiers |
//! | [`types`] | Records shared by the assembler, reports and server |
//! | [`output`] | CLI report formatting |
//!
//! # Cross-references
//!
//! Images and videos become numbered figures. Writing `[[globe]]` anywhere
//! in the prose of the same page is replaced by *Figure N* for the figure
//! whose identifier is `globe`. Identifiers are the source's file stem, as
//! derived by [`naming::figure_id`].

pub mod config;
pub mod document;
pub mod generate;
pub mod metadata;
pub mod naming;
pub mod output;
pub mod scan;
pub mod serve;
pub mod transform;
pub mod types;
pub mod videos;
pub mod watch;

#[cfg(test)]
pub(crate) mod test_helpers;
