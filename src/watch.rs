//! Regeneration watcher.
//!
//! Keeps the generated pages in sync with their sources. One thread owns the
//! notify channel, the debouncer and the regeneration call, so at most one
//! run happens at a time.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐   ┌────────────────┐   ┌───────────┐   ┌──────────────┐
//! │ notify     │──▶│ WatchPatterns  │──▶│ Debouncer │──▶│ Regenerate   │
//! │ events     │   │ (site-relative │   │ (300ms)   │   │ (full run)   │
//! │            │   │  globs)        │   │           │   │              │
//! └────────────┘   └────────────────┘   └───────────┘   └──────────────┘
//! ```
//!
//! # States
//!
//! - **Idle**: waiting on the channel. A qualifying event starts (or extends)
//!   the debounce window.
//! - **Regenerating**: the loop is inside [`Regenerate::regenerate`]. Events
//!   keep queueing in the channel; when the run ends they are drained into
//!   the debouncer and produce exactly one follow-up run.
//!
//! A failed run is logged and the loop goes back to Idle.

use crate::config::{self, ConfigError};
use crate::generate::{self, GenerateError, GenerateReport};
use crate::output;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};
use thiserror::Error;

/// How long to block on the channel when nothing is pending.
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("File watcher error: {0}")]
    Notify(#[from] notify::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Invalid watch pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },
}

// =============================================================================
// Path filtering
// =============================================================================

/// Check if path is a temp/backup file (editor artifacts).
pub fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

/// Glob patterns matched against paths relative to the site root.
#[derive(Debug, Clone)]
pub struct WatchPatterns {
    root: PathBuf,
    patterns: Vec<glob::Pattern>,
}

impl WatchPatterns {
    const MATCH_OPTIONS: glob::MatchOptions = glob::MatchOptions {
        case_sensitive: false,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };

    pub fn new(root: &Path, patterns: &[String]) -> Result<Self, WatchError> {
        let patterns = patterns
            .iter()
            .map(|p| {
                glob::Pattern::new(p).map_err(|source| WatchError::Pattern {
                    pattern: p.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            root: root.to_path_buf(),
            patterns,
        })
    }

    /// Whether a change to `path` should trigger a regeneration.
    ///
    /// Paths outside the root and editor temp files never match.
    pub fn matches(&self, path: &Path) -> bool {
        if is_temp_file(path) {
            return false;
        }
        let Ok(rel) = path.strip_prefix(&self.root) else {
            return false;
        };
        self.patterns
            .iter()
            .any(|p| p.matches_path_with(rel, Self::MATCH_OPTIONS))
    }
}

fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

// =============================================================================
// Debounce State
// =============================================================================

/// Batches rapid file events into one regeneration.
#[derive(Debug)]
pub struct Debouncer {
    pending: HashSet<PathBuf>,
    last_event: Option<Instant>,
    window: Duration,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            pending: HashSet::new(),
            last_event: None,
            window,
        }
    }

    pub fn add(&mut self, path: PathBuf) {
        self.pending.insert(path);
        self.last_event = Some(Instant::now());
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// True once the window has been quiet since the last event.
    pub fn ready(&self) -> bool {
        self.has_pending() && self.last_event.is_some_and(|t| t.elapsed() >= self.window)
    }

    /// Drain the pending paths, sorted for stable logging.
    pub fn take(&mut self) -> Vec<PathBuf> {
        self.last_event = None;
        let mut paths: Vec<PathBuf> = self.pending.drain().collect();
        paths.sort();
        paths
    }

    fn timeout(&self) -> Duration {
        match self.last_event {
            Some(t) if self.has_pending() => self.window.saturating_sub(t.elapsed()),
            _ => IDLE_TIMEOUT,
        }
    }
}

// =============================================================================
// Regeneration
// =============================================================================

/// One full regeneration of the site.
pub trait Regenerate {
    fn regenerate(&mut self) -> Result<GenerateReport, GenerateError>;
}

impl<F> Regenerate for F
where
    F: FnMut() -> Result<GenerateReport, GenerateError>,
{
    fn regenerate(&mut self) -> Result<GenerateReport, GenerateError> {
        self()
    }
}

/// Regenerates the site at `root`, reloading `config.toml` every run.
#[derive(Debug, Clone)]
pub struct SiteRegenerator {
    root: PathBuf,
}

impl SiteRegenerator {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

impl Regenerate for SiteRegenerator {
    fn regenerate(&mut self) -> Result<GenerateReport, GenerateError> {
        generate::regenerate(&self.root)
    }
}

/// Run once, logging the outcome. Failures never escape.
fn run_regeneration(regenerator: &mut impl Regenerate, trigger: &[PathBuf], root: &Path) {
    if !trigger.is_empty() {
        let names: Vec<String> = trigger
            .iter()
            .map(|p| p.strip_prefix(root).unwrap_or(p).display().to_string())
            .collect();
        tracing::info!(changed = %names.join(", "), "regenerating");
    }
    match regenerator.regenerate() {
        Ok(report) => tracing::info!("{}", output::format_regeneration_summary(&report)),
        Err(e) => tracing::error!("regeneration failed: {e}"),
    }
}

/// Drive the watcher state machine until the channel disconnects.
///
/// Performs the initial regeneration first. Pending changes are flushed
/// before returning, so a burst followed by a disconnect still regenerates.
pub fn run_loop(
    rx: &Receiver<notify::Result<Event>>,
    patterns: &WatchPatterns,
    debounce: Duration,
    regenerator: &mut impl Regenerate,
) {
    run_regeneration(regenerator, &[], &patterns.root);

    let mut debouncer = Debouncer::new(debounce);
    loop {
        match rx.recv_timeout(debouncer.timeout()) {
            Ok(Ok(event)) if is_relevant(&event) => {
                for path in event.paths {
                    if patterns.matches(&path) {
                        debouncer.add(path);
                    }
                }
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::warn!("watch error: {e}"),
            Err(RecvTimeoutError::Timeout) if debouncer.ready() => {
                run_regeneration(regenerator, &debouncer.take(), &patterns.root);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                if debouncer.has_pending() {
                    run_regeneration(regenerator, &debouncer.take(), &patterns.root);
                }
                break;
            }
        }
    }
}

/// Watch the site at `root` and regenerate on changes. Blocks forever.
pub fn watch_blocking(root: &Path) -> Result<(), WatchError> {
    let config = config::load_config(root)?;
    let root = fs::canonicalize(root)?;
    let patterns = WatchPatterns::new(&root, &config.watch.patterns)?;

    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx)?;
    watcher.watch(&root, RecursiveMode::Recursive)?;
    tracing::info!(
        root = %root.display(),
        patterns = %config.watch.patterns.join(", "),
        "watching for changes"
    );

    let mut regenerator = SiteRegenerator::new(&root);
    run_loop(
        &rx,
        &patterns,
        Duration::from_millis(config.watch.debounce_ms),
        &mut regenerator,
    );
    Ok(())
}
