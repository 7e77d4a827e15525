//! Site configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. The file lives in
//! the site root next to `posts/` and `templates/` and is entirely optional:
//! stock defaults reproduce the conventional layout.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [paths]
//! posts = "posts"           # Directory holding one subdirectory per post
//! templates = "templates"   # header.html and static page fragments
//! output_index = "posts.html"
//!
//! [site]
//! title = "Posts"
//! language = "en"          # lang attribute of the index and static pages
//! body_class = "centered-column"
//! styles = ["static/main.css"]
//! index_styles = ["static/main.css", "static/posts.css"]
//!
//! [[pages]]
//! template = "home"         # templates/home.html
//! output = "index"          # → index.html
//!
//! [videos]
//! dir = "videos"            # videos.yml lives here, pages are written here
//! catalog = "videos.yml"
//! output_index = "videos.html"
//! title = "Videos"
//! styles = ["static/main.css", "static/video.css"]
//! index_styles = ["static/main.css", "static/videos.css"]
//!
//! [figures]
//! exempt_id = "site-logo"
//! video_extensions = ["webm"]
//!
//! [highlight]
//! language = "python"       # Used for code blocks without a fence language
//!
//! [alias]
//! mode = "symlink"          # or "redirect"
//!
//! [watch]
//! debounce_ms = 300
//! patterns = ["templates/*.html", "posts/**/*.md", "posts/**/*.yml", "videos/*.yml", "config.toml"]
//!
//! [serve]
//! interface = "127.0.0.1"
//! port = 5000
//!
//! [processing]
//! max_processes = 4         # Max parallel page renders (omit for auto)
//! ```
//!
//! ## Partial Configuration
//!
//! The file is sparse: override just the values you want. Unknown keys are
//! rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File name of the site configuration, relative to the site root.
pub const CONFIG_FILE: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Source and output locations relative to the site root.
    pub paths: PathsConfig,
    /// Page-wide presentation settings.
    pub site: SiteSection,
    /// Static pages rendered from template fragments.
    pub pages: Vec<StaticPage>,
    /// Video catalog pages.
    pub videos: VideosConfig,
    /// Figure numbering settings.
    pub figures: FiguresConfig,
    /// Code highlighting settings.
    pub highlight: HighlightConfig,
    /// How the bare post directory points at the primary language.
    pub alias: AliasConfig,
    /// Regeneration watcher settings.
    pub watch: WatchConfig,
    /// Development server settings.
    pub serve: ServeConfig,
    /// Parallel rendering settings.
    pub processing: ProcessingConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            site: SiteSection::default(),
            pages: vec![
                StaticPage {
                    template: "home".to_string(),
                    output: "index".to_string(),
                },
                StaticPage {
                    template: "about".to_string(),
                    output: "about".to_string(),
                },
            ],
            videos: VideosConfig::default(),
            figures: FiguresConfig::default(),
            highlight: HighlightConfig::default(),
            alias: AliasConfig::default(),
            watch: WatchConfig::default(),
            serve: ServeConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(10..=10_000).contains(&self.watch.debounce_ms) {
            return Err(ConfigError::Validation(
                "watch.debounce_ms must be 10-10000".into(),
            ));
        }
        for pattern in &self.watch.patterns {
            glob::Pattern::new(pattern).map_err(|e| {
                ConfigError::Validation(format!("watch.patterns: invalid glob '{pattern}': {e}"))
            })?;
        }
        if self.serve.port == 0 {
            return Err(ConfigError::Validation("serve.port must be non-zero".into()));
        }
        if self.site.styles.is_empty() {
            return Err(ConfigError::Validation(
                "site.styles must not be empty".into(),
            ));
        }
        if self.paths.posts.trim().is_empty() {
            return Err(ConfigError::Validation(
                "paths.posts must not be empty".into(),
            ));
        }
        if self.site.language.trim().is_empty() {
            return Err(ConfigError::Validation(
                "site.language must not be empty".into(),
            ));
        }
        if self.videos.dir.trim().is_empty() || self.videos.catalog.trim().is_empty() {
            return Err(ConfigError::Validation(
                "videos.dir and videos.catalog must not be empty".into(),
            ));
        }
        for page in &self.pages {
            if page.template.trim().is_empty() || page.output.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "pages entries need both template and output".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Source and output locations, relative to the site root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    /// Directory with one subdirectory per post.
    pub posts: String,
    /// Directory holding `header.html` and static page fragments.
    pub templates: String,
    /// File name of the aggregated post index, written at the site root.
    pub output_index: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            posts: "posts".to_string(),
            templates: "templates".to_string(),
            output_index: "posts.html".to_string(),
        }
    }
}

/// Page-wide presentation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteSection {
    /// Text of the `<title>` element for the index and static pages.
    pub title: String,
    /// `lang` of pages that belong to no single post language.
    pub language: String,
    /// Class applied to the main content column of posts and static pages.
    pub body_class: String,
    /// Stylesheets linked from posts and static pages (site-relative).
    pub styles: Vec<String>,
    /// Stylesheets linked from the post index (site-relative).
    pub index_styles: Vec<String>,
}

impl Default for SiteSection {
    fn default() -> Self {
        Self {
            title: "Posts".to_string(),
            language: "en".to_string(),
            body_class: "centered-column".to_string(),
            styles: vec!["static/main.css".to_string()],
            index_styles: vec![
                "static/main.css".to_string(),
                "static/posts.css".to_string(),
            ],
        }
    }
}

/// A page whose contents come verbatim from `templates/<template>.html`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticPage {
    /// Fragment file stem under the templates directory.
    pub template: String,
    /// Output page name at the site root, without `.html`.
    pub output: String,
}

/// Video catalog settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VideosConfig {
    /// Directory holding the catalog; one page per video is written here.
    pub dir: String,
    /// Catalog file name inside `dir`. No catalog, no video pages.
    pub catalog: String,
    /// File name of the video index, written at the site root.
    pub output_index: String,
    /// Text of the `<title>` element of the video index.
    pub title: String,
    /// Stylesheets linked from each video page (site-relative).
    pub styles: Vec<String>,
    /// Stylesheets linked from the video index (site-relative).
    pub index_styles: Vec<String>,
}

impl Default for VideosConfig {
    fn default() -> Self {
        Self {
            dir: "videos".to_string(),
            catalog: "videos.yml".to_string(),
            output_index: "videos.html".to_string(),
            title: "Videos".to_string(),
            styles: vec![
                "static/main.css".to_string(),
                "static/video.css".to_string(),
            ],
            index_styles: vec![
                "static/main.css".to_string(),
                "static/videos.css".to_string(),
            ],
        }
    }
}

/// Figure numbering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FiguresConfig {
    /// Images with this `id` are never numbered (the site logo).
    pub exempt_id: String,
    /// Suffixes rendered as `<video>` instead of `<img>`.
    pub video_extensions: Vec<String>,
}

impl Default for FiguresConfig {
    fn default() -> Self {
        Self {
            exempt_id: "site-logo".to_string(),
            video_extensions: vec!["webm".to_string()],
        }
    }
}

/// Code highlighting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HighlightConfig {
    /// Language assumed for code blocks that do not name one.
    pub language: String,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            language: "python".to_string(),
        }
    }
}

/// How `posts/<dir>/index.html` reaches the primary language page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AliasMode {
    /// Relative symlink (falls back to `Redirect` on non-unix targets).
    #[default]
    Symlink,
    /// Small HTML page that forwards to the primary language.
    Redirect,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AliasConfig {
    pub mode: AliasMode,
}

/// Regeneration watcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchConfig {
    /// Quiet period after the last qualifying event before regenerating.
    pub debounce_ms: u64,
    /// Glob patterns, relative to the site root, that trigger regeneration.
    pub patterns: Vec<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            patterns: vec![
                "templates/*.html".to_string(),
                "posts/**/*.md".to_string(),
                "posts/**/*.yml".to_string(),
                "videos/*.yml".to_string(),
                CONFIG_FILE.to_string(),
            ],
        }
    }
}

/// Development server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServeConfig {
    pub interface: String,
    pub port: u16,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            interface: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

/// Parallel rendering settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of pages rendered in parallel.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(SiteConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config does not serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely, so an
///   overlay `[[pages]]` list replaces the stock page list.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from the site root as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = root.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Load the site config: stock defaults, user overrides, validation.
pub fn load_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    let merged = match load_raw_config(root)? {
        Some(overlay) => merge_toml(stock_defaults_value()?, overlay),
        None => stock_defaults_value()?,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `config.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# postgen configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Locations (relative to the site root)
# ---------------------------------------------------------------------------
[paths]
# One subdirectory per post: info.yml, <lang>.yml, <lang>.md
posts = "posts"
# header.html (optional) and static page fragments
templates = "templates"
# Aggregated post index written at the site root
output_index = "posts.html"

# ---------------------------------------------------------------------------
# Presentation
# ---------------------------------------------------------------------------
[site]
title = "Posts"
# lang attribute of the posts index and static pages; post pages use their own language
language = "en"
# Class on the main content column of posts and static pages
body_class = "centered-column"
# Stylesheets, site-relative; prefixed with ../ hops per page depth
styles = ["static/main.css"]
index_styles = ["static/main.css", "static/posts.css"]

# ---------------------------------------------------------------------------
# Static pages: templates/<template>.html -> <output>.html
# ---------------------------------------------------------------------------
[[pages]]
template = "home"
output = "index"

[[pages]]
template = "about"
output = "about"

# ---------------------------------------------------------------------------
# Videos: <dir>/<catalog> -> <dir>/<name_link>.html and <output_index>
# ---------------------------------------------------------------------------
[videos]
# Sites without a catalog get no video pages
dir = "videos"
catalog = "videos.yml"
output_index = "videos.html"
title = "Videos"
styles = ["static/main.css", "static/video.css"]
index_styles = ["static/main.css", "static/videos.css"]

# ---------------------------------------------------------------------------
# Figures
# ---------------------------------------------------------------------------
[figures]
# Images with this id are left alone and never numbered
exempt_id = "site-logo"
# Suffixes embedded as <video> instead of <img>
video_extensions = ["webm"]

# ---------------------------------------------------------------------------
# Code highlighting
# ---------------------------------------------------------------------------
[highlight]
# Language for code blocks without a fence language
language = "python"

# ---------------------------------------------------------------------------
# Primary language alias (posts/<dir>/index.html)
# ---------------------------------------------------------------------------
[alias]
# "symlink" or "redirect"
mode = "symlink"

# ---------------------------------------------------------------------------
# Watcher
# ---------------------------------------------------------------------------
[watch]
# Quiet period before a burst of file events triggers one regeneration
debounce_ms = 300
patterns = ["templates/*.html", "posts/**/*.md", "posts/**/*.yml", "videos/*.yml", "config.toml"]

# ---------------------------------------------------------------------------
# Development server
# ---------------------------------------------------------------------------
[serve]
interface = "127.0.0.1"
port = 5000

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel page renders.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
