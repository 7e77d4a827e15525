//! End-to-end regeneration over a temp site.
//!
//! These tests go through the public library API only: write a site on disk,
//! run a full regeneration, inspect the files it produced.

use postgen::config::{AliasMode, SiteConfig};
use postgen::generate::{self, GenerateReport};
use postgen::types::{AliasOutcome, WriteOutcome};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn site() -> TempDir {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("posts")).unwrap();
    tmp
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn read(root: &Path, rel: &str) -> String {
    fs::read_to_string(root.join(rel)).unwrap()
}

fn build(root: &Path) -> GenerateReport {
    generate::regenerate(root).unwrap()
}

fn globe(root: &Path) {
    write(
        root,
        "posts/globe/info.yml",
        "title: Globe\ndate: 2024-03-02\npublished: true\nlanguages: [en, fr]\n",
    );
    write(root, "posts/globe/en.yml", "");
    write(
        root,
        "posts/globe/en.md",
        "# Drawing\n\n![Night side](night.png)\n\nSee [[night]].\n\n```rust\nfn main() {}\n```\n",
    );
    write(root, "posts/globe/fr.yml", "title: Globe (fr)\nedited: 2024-04-01\n");
    write(root, "posts/globe/fr.md", "# Dessin\n\nVoir [[night]].\n\n![Nuit](night.png)\n");
}

#[test]
fn renders_every_language_and_the_index() {
    let tmp = site();
    let root = tmp.path();
    globe(root);

    let report = build(root);
    assert!(report.failures.is_empty());

    let en = read(root, "posts/globe/en.html");
    assert!(en.contains(r#"<h1 id="drawing">Drawing</h1>"#));
    assert!(en.contains("<i>Figure 1</i>"));
    assert!(en.contains(r#"<div class="highlight">"#));
    assert!(en.contains("Published: 2024-03-02"));
    assert!(en.contains("/posts/globe/night.png"));

    let fr = read(root, "posts/globe/fr.html");
    assert!(fr.contains("<title>Globe (fr)</title>"));
    assert!(fr.contains("Edited: 2024-04-01"));

    let index = read(root, "posts.html");
    assert!(index.contains("Globe"));
    assert!(index.contains("posts/globe/"));
}

#[test]
fn regeneration_is_byte_identical_and_writes_nothing() {
    let tmp = site();
    let root = tmp.path();
    globe(root);

    build(root);
    let first = read(root, "posts/globe/en.html");
    let report = build(root);

    assert_eq!(read(root, "posts/globe/en.html"), first);
    assert_eq!(report.written(), 0);
    assert!(
        report
            .pages
            .iter()
            .all(|p| p.outcome == WriteOutcome::Unchanged)
    );
}

#[test]
fn existing_alias_is_never_touched() {
    let tmp = site();
    let root = tmp.path();
    globe(root);
    write(root, "posts/globe/index.html", "hand written");

    let report = build(root);

    assert_eq!(read(root, "posts/globe/index.html"), "hand written");
    assert_eq!(report.aliases.len(), 1);
    assert_eq!(report.aliases[0].1, AliasOutcome::Kept);
}

#[cfg(unix)]
#[test]
fn alias_points_at_primary_language() {
    let tmp = site();
    let root = tmp.path();
    globe(root);

    build(root);

    let target = fs::read_link(root.join("posts/globe/index.html")).unwrap();
    assert_eq!(target, Path::new("en.html"));
}

#[test]
fn redirect_alias_when_configured() {
    let tmp = site();
    let root = tmp.path();
    globe(root);
    write(root, "config.toml", "[alias]\nmode = \"redirect\"\n");

    let report = build(root);

    assert_eq!(report.aliases[0].1, AliasOutcome::Redirected);
    assert!(read(root, "posts/globe/index.html").contains("en.html"));
}

#[test]
fn unpublished_posts_are_not_rendered_or_listed() {
    let tmp = site();
    let root = tmp.path();
    write(
        root,
        "posts/draft/info.yml",
        "title: Secret Draft\npublished: false\nlanguages: [en]\n",
    );
    write(root, "posts/draft/en.yml", "");
    write(root, "posts/draft/en.md", "# Draft\n");

    build(root);

    assert!(!root.join("posts/draft/en.html").exists());
    assert!(!read(root, "posts.html").contains("Secret Draft"));
}

#[test]
fn post_without_info_is_skipped_without_aborting() {
    let tmp = site();
    let root = tmp.path();
    globe(root);
    write(root, "posts/loose/en.md", "# Loose\n");

    let report = build(root);

    assert!(!root.join("posts/loose/en.html").exists());
    assert_eq!(report.skipped.len(), 1);
    assert!(root.join("posts/globe/en.html").exists());
}

#[test]
fn generate_all_with_explicit_config() {
    let tmp = site();
    let root = tmp.path();
    globe(root);

    let mut config = SiteConfig::default();
    config.alias.mode = AliasMode::Redirect;
    config.site.title = "Field Notes".to_string();
    let report = generate::generate_all(root, &config).unwrap();

    assert!(report.failures.is_empty());
    assert!(read(root, "posts.html").contains("<title>Field Notes</title>"));
}

#[test]
fn author_html_images_are_numbered_in_pages() {
    let tmp = site();
    let root = tmp.path();
    write(
        root,
        "posts/logo/info.yml",
        "title: Logo\npublished: true\nlanguages: [fr]\n",
    );
    write(root, "posts/logo/fr.yml", "");
    write(
        root,
        "posts/logo/fr.md",
        "<img id=\"site-logo\" src=\"logo.png\">\n\n<p><img src=\"map.png\" title=\"\"></p>\n\nVoir [[map]].\n",
    );

    build(root);
    let page = read(root, "posts/logo/fr.html");
    assert!(page.contains(r#"<html lang="fr">"#));
    assert!(page.contains("Voir <i>Figure 1</i>."));
    assert!(page.contains(r#"src="/posts/logo/map.png""#));
    assert!(!page.contains("img-title"));
    assert!(!page.contains("Figure 2"));
}

#[test]
fn video_catalog_renders_pages_and_index() {
    let tmp = site();
    let root = tmp.path();
    write(
        root,
        "videos/videos.yml",
        "- name-link: timelapse\n  title: Timelapse\n  url: https://youtu.be/xyz789\n",
    );

    let report = build(root);
    assert!(report.failures.is_empty());
    assert!(read(root, "videos/timelapse.html")
        .contains(r#"src="https://youtube.com/embed/xyz789?vq=hd720p""#));
    assert!(read(root, "videos.html").contains(r#"href="videos/timelapse.html""#));

    let rerun = build(root);
    assert_eq!(rerun.written(), 0);
}
