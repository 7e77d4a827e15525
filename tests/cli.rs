//! Drives the compiled `postgen` binary.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn postgen(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_postgen"))
        .arg("--root")
        .arg(root)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn site_with_post() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let post = tmp.path().join("posts/globe");
    fs::create_dir_all(&post).unwrap();
    fs::write(
        post.join("info.yml"),
        "title: Globe\ndate: 2024-03-02\npublished: true\nlanguages: [en]\n",
    )
    .unwrap();
    fs::write(post.join("en.yml"), "").unwrap();
    fs::write(post.join("en.md"), "# Globe\n").unwrap();
    tmp
}

#[test]
fn gen_config_prints_parseable_stock_config() {
    let tmp = TempDir::new().unwrap();
    let output = postgen(tmp.path(), &["gen-config"]);
    assert!(output.status.success());

    let text = stdout(&output);
    let parsed: toml::Value = toml::from_str(&text).unwrap();
    assert!(parsed.get("watch").is_some());
}

#[test]
fn build_writes_pages_and_reports() {
    let tmp = site_with_post();
    let output = postgen(tmp.path(), &["build"]);
    assert!(output.status.success());

    assert!(tmp.path().join("posts/globe/en.html").is_file());
    assert!(tmp.path().join("posts.html").is_file());
    assert!(stdout(&output).contains("posts/globe/en.html (written)"));
}

#[test]
fn second_build_reports_unchanged() {
    let tmp = site_with_post();
    postgen(tmp.path(), &["build"]);
    let output = postgen(tmp.path(), &["build"]);

    assert!(stdout(&output).contains("posts/globe/en.html (unchanged)"));
}

#[test]
fn scan_prints_variants_as_json() {
    let tmp = site_with_post();
    let output = postgen(tmp.path(), &["scan"]);
    assert!(output.status.success());

    let variants: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(variants[0]["language"], "en");
    assert_eq!(variants[0]["is_primary"], true);
    assert_eq!(variants[0]["title"], "Globe");
}

#[test]
fn check_writes_nothing() {
    let tmp = site_with_post();
    let output = postgen(tmp.path(), &["check"]);
    assert!(output.status.success());

    assert!(stdout(&output).contains("1 language in 1 post, 1 published, 0 skipped"));
    assert!(!tmp.path().join("posts/globe/en.html").exists());
}

#[test]
fn invalid_config_fails() {
    let tmp = site_with_post();
    fs::write(tmp.path().join("config.toml"), "[watch]\ndebounce = 5\n").unwrap();

    let output = postgen(tmp.path(), &["build"]);
    assert!(!output.status.success());
}
