//! Page assembly.
//!
//! Stage 2 of a regeneration run. Takes the discovered variants, renders each
//! post body through the [`transform`](crate::transform) pipeline, wraps it in
//! the page template and writes the result next to its source.
//!
//! ## Generated Files
//!
//! ```text
//! site/
//! ├── index.html               # Static page (templates/home.html)
//! ├── about.html               # Static page (templates/about.html)
//! ├── posts.html               # Post index, most recent first
//! ├── videos.html              # Video index, catalog order
//! ├── videos/
//! │   ├── videos.yml           # Catalog (source)
//! │   └── drawing-a-globe.html # One page per catalog entry
//! └── posts/
//!     └── globe/
//!         ├── en.html          # One page per published language
//!         ├── fr.html
//!         └── index.html       # Alias → en.html (primary language)
//! ```
//!
//! Post pages carry their own language in `<html lang>`; every other page
//! uses `site.language`.
//!
//! ## Relative Roots
//!
//! Pages never assume where the site is deployed. Stylesheets and header
//! links are prefixed with the page's relative root (`.` at the site root,
//! `../..` for `posts/globe/`), see [`naming::relative_root`].
//!
//! ## Writes
//!
//! Every file is replaced whole through a sibling temporary file and a
//! rename, so the development server never reads a half-written page. A page
//! whose content is already on disk is not rewritten, which keeps repeated
//! runs byte-identical and mtimes stable.
//!
//! ## HTML Generation
//!
//! The page shell is a [maud](https://maud.lambda.xyz/) template. Post bodies,
//! the header fragment and static page fragments are already HTML and are
//! inserted unescaped.

use crate::config::{self, AliasMode, ConfigError, SiteConfig};
use crate::naming;
use crate::scan::{self, LanguageVariant, ScanError, Skipped};
use crate::transform::{self, Highlighter, KeywordHighlighter, TransformContext};
use crate::types::{AliasOutcome, GeneratedPage, IndexLanguage, PostIndexEntry, WriteOutcome};
use crate::videos::{self, Video};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use rayon::prelude::*;
use regex::{Captures, Regex};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

/// File name of the shared header fragment inside the templates directory.
pub const HEADER_TEMPLATE: &str = "header.html";

/// File name of the primary-language alias inside each post directory.
pub const ALIAS_FILE: &str = "index.html";

static HEADER_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\s)(src|href)="([^"]*)""#).expect("invalid header link regex")
});

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("Cannot write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

/// Which kind of page a report entry describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageKind {
    Post { language: String },
    Index,
    Static,
    /// A video page or the video index.
    Video,
}

/// One page handled by a run. Paths are relative to the site root.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRecord {
    pub kind: PageKind,
    pub path: PathBuf,
    pub outcome: WriteOutcome,
}

/// A page that could not be produced. The run continued without it.
#[derive(Debug, Clone, PartialEq)]
pub struct PageFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Everything a regeneration run did.
#[derive(Debug, Default)]
pub struct GenerateReport {
    pub pages: Vec<PageRecord>,
    /// Alias path (relative to the site root) and what happened to it.
    pub aliases: Vec<(PathBuf, AliasOutcome)>,
    /// Posts and languages passed over by discovery.
    pub skipped: Vec<Skipped>,
    /// Published variants whose markdown source does not exist.
    pub missing_markdown: Vec<PathBuf>,
    /// Configured static pages whose template fragment does not exist.
    pub missing_templates: Vec<PathBuf>,
    pub failures: Vec<PageFailure>,
}

impl GenerateReport {
    pub fn written(&self) -> usize {
        self.count(WriteOutcome::Written)
    }

    pub fn unchanged(&self) -> usize {
        self.count(WriteOutcome::Unchanged)
    }

    fn count(&self, outcome: WriteOutcome) -> usize {
        self.pages.iter().filter(|p| p.outcome == outcome).count()
    }
}

/// Result of rendering one variant.
enum VariantOutcome {
    Rendered {
        variant: LanguageVariant,
        record: PageRecord,
        alias: Option<(PathBuf, AliasOutcome)>,
    },
    MissingMarkdown(PathBuf),
    Failed(PageFailure),
}

/// Load `config.toml` from the site root and run [`generate_all`].
pub fn regenerate(site_root: &Path) -> Result<GenerateReport, GenerateError> {
    let config = config::load_config(site_root)?;
    generate_all(site_root, &config)
}

/// Regenerate every page of the site with the built-in highlighter.
pub fn generate_all(site_root: &Path, config: &SiteConfig) -> Result<GenerateReport, GenerateError> {
    generate_with(site_root, config, &KeywordHighlighter)
}

/// Regenerate every page of the site.
///
/// Per-post problems (missing markdown, unwritable page) are collected in
/// the report. A missing posts directory or an unwritable index aborts.
pub fn generate_with(
    site_root: &Path,
    config: &SiteConfig,
    highlighter: &dyn Highlighter,
) -> Result<GenerateReport, GenerateError> {
    let discovery = scan::scan(&site_root.join(&config.paths.posts))?;
    let mut variants = scan::published_variants(discovery.variants);
    scan::sort_by_date_desc(&mut variants);

    let mut report = GenerateReport {
        skipped: discovery.skipped,
        ..Default::default()
    };

    let header = load_header(site_root, config)?;
    let ctx = TransformContext::new(config, highlighter);

    let outcomes: Vec<VariantOutcome> = variants
        .into_par_iter()
        .map(|variant| render_variant(site_root, variant, config, header.as_deref(), &ctx))
        .collect();

    let mut rendered = Vec::new();
    for outcome in outcomes {
        match outcome {
            VariantOutcome::Rendered {
                variant,
                record,
                alias,
            } => {
                report.pages.push(record);
                report.aliases.extend(alias);
                rendered.push(variant);
            }
            VariantOutcome::MissingMarkdown(path) => report.missing_markdown.push(path),
            VariantOutcome::Failed(failure) => report.failures.push(failure),
        }
    }

    let entries = build_index_entries(site_root, &rendered);
    let index_path = site_root.join(&config.paths.output_index);
    let index_page = GeneratedPage {
        content: render_page(
            &config.site.title,
            &config.site.language,
            &config.site.index_styles,
            None,
            ".",
            header.as_deref(),
            render_index(&entries),
        )
        .into_string(),
        path: index_path,
    };
    let outcome = write_page(&index_page).map_err(|source| GenerateError::Write {
        path: index_page.path.clone(),
        source,
    })?;
    report.pages.push(PageRecord {
        kind: PageKind::Index,
        path: PathBuf::from(&config.paths.output_index),
        outcome,
    });

    generate_videos(site_root, config, header.as_deref(), &mut report);
    generate_static_pages(site_root, config, header.as_deref(), &mut report);

    Ok(report)
}

fn render_variant(
    site_root: &Path,
    variant: LanguageVariant,
    config: &SiteConfig,
    header: Option<&str>,
    ctx: &TransformContext<'_>,
) -> VariantOutcome {
    let html_rel = site_relative(site_root, &variant.html_path());
    let markdown_path = variant.markdown_path();
    if !markdown_path.is_file() {
        tracing::warn!(page = %markdown_path.display(), "markdown source not found, skipping");
        return VariantOutcome::MissingMarkdown(site_relative(site_root, &markdown_path));
    }

    match write_variant(site_root, &variant, config, header, ctx) {
        Ok((record, alias)) => VariantOutcome::Rendered {
            variant,
            record,
            alias,
        },
        Err(e) => {
            tracing::error!(page = %html_rel.display(), "failed to generate page: {e}");
            VariantOutcome::Failed(PageFailure {
                path: html_rel,
                error: e.to_string(),
            })
        }
    }
}

/// Render one variant's page and, for the primary language, its alias.
fn write_variant(
    site_root: &Path,
    variant: &LanguageVariant,
    config: &SiteConfig,
    header: Option<&str>,
    ctx: &TransformContext<'_>,
) -> io::Result<(PageRecord, Option<(PathBuf, AliasOutcome)>)> {
    let markdown = fs::read_to_string(variant.markdown_path())?;
    let dir_rel = site_relative(site_root, &variant.root_dir);
    let root = naming::relative_root(&dir_rel);
    let body = transform::render_post_body(
        &markdown,
        &url_path(&dir_rel),
        &variant.publish_date,
        variant.edited_date.as_deref(),
        ctx,
    );
    let page = GeneratedPage {
        content: render_page(
            &variant.title,
            &variant.language,
            &config.site.styles,
            Some(&config.site.body_class),
            &root,
            header,
            PreEscaped(body),
        )
        .into_string(),
        path: variant.html_path(),
    };
    let html_rel = site_relative(site_root, &page.path);
    let outcome = write_page(&page)?;
    tracing::debug!(page = %html_rel.display(), ?outcome, "post page");

    let alias = if variant.is_primary {
        let outcome = write_alias(
            &variant.root_dir,
            &variant.html_file_name(),
            &variant.language,
            config.alias.mode,
        )?;
        Some((site_relative(site_root, &variant.root_dir.join(ALIAS_FILE)), outcome))
    } else {
        None
    };

    let record = PageRecord {
        kind: PageKind::Post {
            language: variant.language.clone(),
        },
        path: html_rel,
        outcome,
    };
    Ok((record, alias))
}

fn generate_static_pages(
    site_root: &Path,
    config: &SiteConfig,
    header: Option<&str>,
    report: &mut GenerateReport,
) {
    let templates = site_root.join(&config.paths.templates);
    for page in &config.pages {
        let template_path = templates.join(format!("{}.html", page.template));
        if !template_path.is_file() {
            tracing::info!(template = %template_path.display(), "static page template not found, skipping");
            report
                .missing_templates
                .push(site_relative(site_root, &template_path));
            continue;
        }
        let output_rel = PathBuf::from(format!("{}.html", page.output));

        let result = fs::read_to_string(&template_path).and_then(|contents| {
            write_page(&GeneratedPage {
                content: render_page(
                    &config.site.title,
                    &config.site.language,
                    &config.site.styles,
                    Some(&config.site.body_class),
                    ".",
                    header,
                    PreEscaped(contents),
                )
                .into_string(),
                path: site_root.join(&output_rel),
            })
        });
        record_write(report, PageKind::Static, output_rel, result);
    }
}

/// Render one page per video catalog entry, then the video index.
///
/// A site without a catalog gets no video pages. A catalog that cannot be
/// read is reported as a failure and the rest of the run continues.
fn generate_videos(
    site_root: &Path,
    config: &SiteConfig,
    header: Option<&str>,
    report: &mut GenerateReport,
) {
    let settings = &config.videos;
    let dir_rel = PathBuf::from(&settings.dir);
    let catalog_path = site_root.join(&dir_rel).join(&settings.catalog);
    if !catalog_path.is_file() {
        tracing::debug!(catalog = %catalog_path.display(), "no video catalog");
        return;
    }

    let catalog = match videos::load_catalog(&catalog_path) {
        Ok(catalog) => catalog,
        Err(e) => {
            let catalog_rel = site_relative(site_root, &catalog_path);
            tracing::error!(catalog = %catalog_rel.display(), "failed to read video catalog: {e}");
            report.failures.push(PageFailure {
                path: catalog_rel,
                error: e.to_string(),
            });
            return;
        }
    };

    let root = naming::relative_root(&dir_rel);
    for video in &catalog {
        let output_rel = dir_rel.join(video.page_file_name());
        let page = GeneratedPage {
            content: render_page(
                video.display_title(),
                &config.site.language,
                &settings.styles,
                Some(&config.site.body_class),
                &root,
                header,
                render_video(video),
            )
            .into_string(),
            path: site_root.join(&output_rel),
        };
        record_write(report, PageKind::Video, output_rel, write_page(&page));
    }

    let index_rel = PathBuf::from(&settings.output_index);
    let index_page = GeneratedPage {
        content: render_page(
            &settings.title,
            &config.site.language,
            &settings.index_styles,
            None,
            ".",
            header,
            render_video_index(&catalog, &url_path(&dir_rel)),
        )
        .into_string(),
        path: site_root.join(&index_rel),
    };
    record_write(report, PageKind::Video, index_rel, write_page(&index_page));
}

/// Record a page write in the report. Failures are logged and the run goes on.
fn record_write(
    report: &mut GenerateReport,
    kind: PageKind,
    path: PathBuf,
    result: io::Result<WriteOutcome>,
) {
    match result {
        Ok(outcome) => report.pages.push(PageRecord {
            kind,
            path,
            outcome,
        }),
        Err(e) => {
            tracing::error!(page = %path.display(), "failed to generate page: {e}");
            report.failures.push(PageFailure {
                path,
                error: e.to_string(),
            });
        }
    }
}

/// Group rendered variants by post directory, keeping the order they arrive
/// in (most recent first). Title and date come from each post's first variant.
pub fn build_index_entries(site_root: &Path, variants: &[LanguageVariant]) -> Vec<PostIndexEntry> {
    let mut entries: Vec<(PathBuf, bool, PostIndexEntry)> = Vec::new();
    for variant in variants {
        let dir_url = url_path(&site_relative(site_root, &variant.root_dir));
        let language = IndexLanguage {
            language: variant.language.clone(),
            href: format!("{dir_url}/{}", variant.html_file_name()),
        };
        match entries.iter_mut().find(|(dir, _, _)| *dir == variant.root_dir) {
            Some((_, has_primary, entry)) => {
                *has_primary |= variant.is_primary;
                entry.languages.push(language);
            }
            None => entries.push((
                variant.root_dir.clone(),
                variant.is_primary,
                PostIndexEntry {
                    href: String::new(),
                    title: variant.title.clone(),
                    date: variant.publish_date.clone(),
                    languages: vec![language],
                },
            )),
        }
    }

    entries
        .into_iter()
        .map(|(dir, has_primary, mut entry)| {
            // The bare directory only resolves when the primary page exists
            entry.href = if has_primary {
                format!("{}/", url_path(&site_relative(site_root, &dir)))
            } else {
                entry.languages[0].href.clone()
            };
            entry
        })
        .collect()
}

// ============================================================================
// Writing
// ============================================================================

/// Replace a file's content atomically, skipping the write when unchanged.
pub fn write_page(page: &GeneratedPage) -> io::Result<WriteOutcome> {
    if let Ok(existing) = fs::read(&page.path)
        && existing == page.content.as_bytes()
    {
        return Ok(WriteOutcome::Unchanged);
    }
    if let Some(parent) = page.path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file_name = page
        .path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp = page.path.with_file_name(format!(".{file_name}.tmp"));
    fs::write(&tmp, &page.content)?;
    if let Err(e) = fs::rename(&tmp, &page.path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(WriteOutcome::Written)
}

/// Make `<dir>/index.html` reach `<target>`, unless something is already there.
///
/// `lang` is the target page's language, used by the redirect page.
pub fn write_alias(
    dir: &Path,
    target: &str,
    lang: &str,
    mode: AliasMode,
) -> io::Result<AliasOutcome> {
    let alias = dir.join(ALIAS_FILE);
    if alias.symlink_metadata().is_ok() {
        return Ok(AliasOutcome::Kept);
    }

    let result = match mode {
        #[cfg(unix)]
        AliasMode::Symlink => std::os::unix::fs::symlink(target, &alias).map(|_| AliasOutcome::Symlinked),
        _ => write_redirect(&alias, target, lang).map(|_| AliasOutcome::Redirected),
    };
    match result {
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(AliasOutcome::Kept),
        other => other,
    }
}

fn write_redirect(alias: &Path, target: &str, lang: &str) -> io::Result<()> {
    use std::io::Write;
    let page = redirect_page(target, lang).into_string();
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(alias)?;
    file.write_all(page.as_bytes())
}

// ============================================================================
// HTML Components
// ============================================================================

/// Renders the page shell shared by every generated page.
///
/// Stylesheets are site-relative and get prefixed with `root`; so do the
/// relative links of the header fragment.
pub fn render_page(
    title: &str,
    lang: &str,
    styles: &[String],
    body_class: Option<&str>,
    root: &str,
    header: Option<&str>,
    contents: Markup,
) -> Markup {
    html! {
        (DOCTYPE)
        html lang=(lang) {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                @for style in styles {
                    link rel="stylesheet" href=(naming::join_root(root, style));
                }
            }
            body {
                @if let Some(header) = header {
                    (PreEscaped(rewrite_header_links(header, root)))
                }
                main class=[body_class] {
                    (contents)
                }
            }
        }
    }
}

/// Renders the post index body.
fn render_index(entries: &[PostIndexEntry]) -> Markup {
    html! {
        ul.posts {
            @for entry in entries {
                li.post {
                    a.post-title href=(entry.href) { (entry.title) }
                    " "
                    span.post-date { (entry.date) }
                    " "
                    span.post-languages {
                        @for language in &entry.languages {
                            a.post-language href=(language.href) { (language.language) }
                        }
                    }
                }
            }
        }
    }
}

/// Renders one video page body.
fn render_video(video: &Video) -> Markup {
    html! {
        h1 { (video.display_title()) }
        div.video-div {
            iframe.video-embed src=(video.url) title=(video.display_title()) allowfullscreen {}
        }
        @if let Some(date) = &video.date {
            p.video-date { (date) }
        }
        @if let Some(description) = &video.description {
            p.video-description { (description) }
        }
    }
}

/// Renders the video index body, in catalog order.
fn render_video_index(catalog: &[Video], dir_url: &str) -> Markup {
    html! {
        ul.videos {
            @for video in catalog {
                li.video {
                    a.video-title href=(format!("{dir_url}/{}", video.page_file_name())) {
                        (video.display_title())
                    }
                    @if let Some(date) = &video.date {
                        " "
                        span.video-date { (date) }
                    }
                }
            }
        }
    }
}

/// Forwarding page used as the alias where symlinks are unavailable.
fn redirect_page(target: &str, lang: &str) -> Markup {
    html! {
        (DOCTYPE)
        html lang=(lang) {
            head {
                meta charset="UTF-8";
                meta http-equiv="refresh" content=(format!("0; url={target}"));
                link rel="canonical" href=(target);
                title { "Redirecting" }
            }
            body {
                a href=(target) { (target) }
            }
        }
    }
}

/// Prefix relative `src`/`href` values with the page's relative root.
///
/// Absolute paths, fragments and URLs with a scheme are left as written, and
/// so are look-alike attributes such as `data-src`.
pub fn rewrite_header_links(header: &str, root: &str) -> String {
    HEADER_LINK
        .replace_all(header, |caps: &Captures| {
            let value = &caps[3];
            if value.is_empty()
                || value.starts_with('/')
                || value.starts_with('#')
                || value.contains(':')
            {
                caps[0].to_string()
            } else {
                format!(
                    "{}{}=\"{}\"",
                    &caps[1],
                    &caps[2],
                    naming::join_root(root, value)
                )
            }
        })
        .into_owned()
}

fn load_header(site_root: &Path, config: &SiteConfig) -> Result<Option<String>, GenerateError> {
    let path = site_root.join(&config.paths.templates).join(HEADER_TEMPLATE);
    match fs::read_to_string(&path) {
        Ok(header) => Ok(Some(header)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// Paths
// ============================================================================

fn site_relative(site_root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(site_root).unwrap_or(path).to_path_buf()
}

/// Forward-slash form of a relative path, for URLs.
fn url_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
