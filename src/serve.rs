//! Development server.
//!
//! A small `tiny_http` server over the site root, run in the foreground
//! while the regeneration watcher keeps pages fresh on its own thread.
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐
//! │   Main Thread   │     │  Watcher Thread  │
//! │  (HTTP Server)  │     │  (regeneration)  │
//! └────────┬────────┘     └────────┬─────────┘
//!          │ reads                 │ writes
//!          └──────────┬────────────┘
//!                     ▼
//!                 site root
//! ```
//!
//! Pages are written atomically by the assembler, so a request never sees a
//! half-written file.
//!
//! ## Routes
//!
//! | Request            | Served file                                   |
//! |--------------------|-----------------------------------------------|
//! | `/`                | `index.html`                                  |
//! | `/static/main.css` | the file itself (known asset suffix)          |
//! | `/about`           | `about.html`                                  |
//! | `/posts/globe`     | `posts/globe/index.html` (the language alias) |
//!
//! Anything else is a 404. Paths with `..` segments are rejected.

use crate::config::{self, ConfigError};
use crate::watch;
use percent_encoding::percent_decode_str;
use std::fs;
use std::io::Cursor;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Invalid serve.interface: {0}")]
    Interface(#[from] std::net::AddrParseError),
    #[error("Failed to bind after {attempts} attempts (ports {first}-{last}): {message}")]
    Bind {
        attempts: u16,
        first: u16,
        last: u16,
        message: String,
    },
    #[error("Invalid response header {0}")]
    Header(String),
}

// ============================================================================
// Server Entry Point
// ============================================================================

/// Serve the site at `root`, regenerating on changes. Blocks forever.
pub fn serve_site(root: &Path) -> Result<(), ServeError> {
    let config = config::load_config(root)?;
    let interface: IpAddr = config.serve.interface.parse()?;
    let (server, addr) = try_bind_port(interface, config.serve.port, MAX_PORT_RETRIES)?;

    let watch_root = root.to_path_buf();
    std::thread::spawn(move || {
        if let Err(e) = watch::watch_blocking(&watch_root) {
            tracing::error!("watcher stopped: {e}");
        }
    });

    tracing::info!("serving http://{addr}");
    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, root) {
            tracing::warn!("request error: {e}");
        }
    }
    Ok(())
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(
    interface: IpAddr,
    base_port: u16,
    max_retries: u16,
) -> Result<(Server, SocketAddr), ServeError> {
    let mut last_error = String::new();
    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);
        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    tracing::info!("port {base_port} in use, using {port} instead");
                }
                let bound = server.server_addr().to_ip().unwrap_or(addr);
                return Ok((server, bound));
            }
            Err(e) => last_error = e.to_string(),
        }
    }
    Err(ServeError::Bind {
        attempts: max_retries,
        first: base_port,
        last: base_port.saturating_add(max_retries.saturating_sub(1)),
        message: last_error,
    })
}

// ============================================================================
// Routing
// ============================================================================

/// Map a request path onto a file under `root`.
///
/// The path is percent-decoded and stripped of its query string first.
pub fn resolve_route(root: &Path, url_path: &str) -> Option<PathBuf> {
    let raw = url_path.split(['?', '#']).next().unwrap_or_default();
    let decoded = percent_decode_str(raw).decode_utf8().ok()?;
    let page = decoded.trim_matches('/');

    if page.split(['/', '\\']).any(|segment| segment == "..") {
        return None;
    }

    if page.is_empty() {
        let index = root.join("index.html");
        return index.is_file().then_some(index);
    }

    let direct = root.join(page);
    if is_known_asset(&direct) && direct.is_file() {
        return Some(direct);
    }

    let html = root.join(format!("{page}.html"));
    if html.is_file() {
        return Some(html);
    }

    let index = direct.join("index.html");
    index.is_file().then_some(index)
}

fn is_known_asset(path: &Path) -> bool {
    guess_content_type(path) != "application/octet-stream"
}

// ============================================================================
// Request Handling
// ============================================================================

fn handle_request(request: Request, root: &Path) -> Result<(), ServeError> {
    if !matches!(request.method(), Method::Get | Method::Head) {
        return respond_status(request, 405, "405 Method Not Allowed");
    }

    match resolve_route(root, request.url()) {
        Some(path) => {
            tracing::debug!(url = %request.url(), file = %path.display(), "200");
            respond_file(request, &path)
        }
        None => {
            tracing::debug!(url = %request.url(), "404");
            respond_status(request, 404, "404 Not Found")
        }
    }
}

fn header(name: &str, value: &str) -> Result<Header, ServeError> {
    Header::from_bytes(name, value).map_err(|()| ServeError::Header(format!("{name}: {value}")))
}

/// Serve a file with appropriate content type. HEAD gets headers only.
fn respond_file(request: Request, path: &Path) -> Result<(), ServeError> {
    let content_type = header("Content-Type", guess_content_type(path))?;
    if request.method() == &Method::Head {
        let response = Response::empty(StatusCode(200)).with_header(content_type);
        request.respond(response)?;
        return Ok(());
    }

    let content = fs::read(path)?;
    let response = Response::from_data(content).with_header(content_type);
    request.respond(response)?;
    Ok(())
}

fn respond_status(request: Request, status: u16, message: &str) -> Result<(), ServeError> {
    let response = Response::new(
        StatusCode(status),
        vec![header("Content-Type", "text/plain; charset=utf-8")?],
        Cursor::new(message.as_bytes().to_vec()),
        Some(message.len()),
        None,
    );
    request.respond(response)?;
    Ok(())
}

// ============================================================================
// Content Type Detection
// ============================================================================

/// Guess MIME content type from file extension.
///
/// Returns `application/octet-stream` for unknown extensions.
pub fn guess_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",

        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("webm") => "video/webm",
        Some("mp4") => "video/mp4",

        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",

        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain; charset=utf-8",

        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::SiteFixture;

    fn site() -> SiteFixture {
        let site = SiteFixture::new();
        for (rel, content) in [
            ("index.html", "home"),
            ("about.html", "about"),
            ("static/main.css", "body {}"),
            ("posts/globe/en.html", "en"),
            ("posts/globe/index.html", "alias"),
            ("posts/globe/Night Sky.png", "png"),
        ] {
            let path = site.root().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        site
    }

    fn route(site: &SiteFixture, url: &str) -> Option<String> {
        resolve_route(site.root(), url).map(|p| {
            p.strip_prefix(site.root())
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
    }

    #[test]
    fn root_serves_index() {
        let site = site();
        assert_eq!(route(&site, "/").as_deref(), Some("index.html"));
    }

    #[test]
    fn page_name_serves_html_file() {
        let site = site();
        assert_eq!(route(&site, "/about").as_deref(), Some("about.html"));
    }

    #[test]
    fn asset_served_directly() {
        let site = site();
        assert_eq!(
            route(&site, "/static/main.css?v=2").as_deref(),
            Some("static/main.css")
        );
    }

    #[test]
    fn post_directory_serves_alias() {
        let site = site();
        assert_eq!(
            route(&site, "/posts/globe/").as_deref(),
            Some("posts/globe/index.html")
        );
        assert_eq!(
            route(&site, "/posts/globe/en").as_deref(),
            Some("posts/globe/en.html")
        );
    }

    #[test]
    fn percent_encoded_paths_decoded() {
        let site = site();
        assert_eq!(
            route(&site, "/posts/globe/Night%20Sky.png").as_deref(),
            Some("posts/globe/Night Sky.png")
        );
    }

    #[test]
    fn parent_segments_rejected() {
        let site = site();
        assert_eq!(route(&site, "/posts/../about"), None);
        assert_eq!(route(&site, "/%2e%2e/etc/passwd"), None);
    }

    #[test]
    fn unknown_path_is_none() {
        let site = site();
        assert_eq!(route(&site, "/nope"), None);
    }

    #[test]
    fn content_types() {
        assert_eq!(guess_content_type(Path::new("a.HTML")), "text/html; charset=utf-8");
        assert_eq!(guess_content_type(Path::new("clip.webm")), "video/webm");
        assert_eq!(guess_content_type(Path::new("x.bin")), "application/octet-stream");
    }

    #[test]
    fn bind_retries_next_port() {
        let localhost: IpAddr = "127.0.0.1".parse().unwrap();
        let (_first, addr) = try_bind_port(localhost, 0, 1).unwrap();
        let (_second, next) = try_bind_port(localhost, addr.port(), 5).unwrap();
        assert_ne!(addr.port(), next.port());
    }
}
