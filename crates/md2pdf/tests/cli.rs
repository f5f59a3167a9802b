//! Runs the `md2pdf` binary and checks output and exit codes.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn md2pdf(cwd: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_md2pdf"))
        .args(args)
        .current_dir(cwd)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run md2pdf")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// =============================================================================
// list / check / refresh
// =============================================================================

#[test]
fn test_list_json() {
    let dir = TempDir::new().unwrap();
    let out = md2pdf(dir.path(), &["list", "--json"]);
    assert!(out.status.success(), "{}", stderr(&out));

    let listing: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let styles: Vec<&str> = listing["styles"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(styles, vec!["academic", "modern", "story", "technical"]);
    assert_eq!(listing["themes"][1]["display_name"], "Default");
}

#[test]
fn test_list_text() {
    let dir = TempDir::new().unwrap();
    let out = md2pdf(dir.path(), &["list"]);
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.contains("Styles"));
    assert!(text.contains("technical"));
    assert!(text.contains("oceanic"));
}

#[test]
fn test_check_unknown_theme() {
    let dir = TempDir::new().unwrap();
    let out = md2pdf(dir.path(), &["check", "technical", "neon"]);
    assert_eq!(out.status.code(), Some(3));
    assert!(stderr(&out).contains("available: dark, default, oceanic, sepia"));
}

#[test]
fn test_check_discouraged() {
    let dir = TempDir::new().unwrap();
    let lenient = md2pdf(dir.path(), &["check", "story", "dark"]);
    assert_eq!(lenient.status.code(), Some(0));
    assert!(stdout(&lenient).contains("discouraged"));

    let strict = md2pdf(dir.path(), &["check", "story", "dark", "--strict"]);
    assert_eq!(strict.status.code(), Some(3));
}

#[test]
fn test_check_vars() {
    let dir = TempDir::new().unwrap();
    let out = md2pdf(dir.path(), &["check", "technical", "dark", "--vars"]);
    assert!(out.status.success());
    assert!(stdout(&out).contains("--theme-bg"));
}

#[test]
fn test_refresh_reports_warnings() {
    let dir = TempDir::new().unwrap();
    let themes = dir.path().join("themes");
    fs::create_dir_all(&themes).unwrap();
    fs::write(themes.join("night.css"), ":root { --theme-bg: #000; }").unwrap();
    fs::write(themes.join("blank.css"), "   \n").unwrap();

    let out = md2pdf(dir.path(), &["refresh", "--themes-dir", "themes"]);
    assert!(out.status.success(), "{}", stderr(&out));
    let text = stdout(&out);
    assert!(text.contains("4 style(s), 1 theme(s)"));
    assert!(text.contains("blank.css"));
}

#[test]
fn test_missing_styles_dir_fails() {
    let dir = TempDir::new().unwrap();
    let out = md2pdf(dir.path(), &["list", "--styles-dir", "nope"]);
    assert_eq!(out.status.code(), Some(1));
}

// =============================================================================
// convert
// =============================================================================

#[test]
fn test_convert_html() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("notes.md"), "# Notes\n").unwrap();

    let out = md2pdf(
        dir.path(),
        &["convert", "notes.md", "--format", "html", "-t", "sepia"],
    );
    assert!(out.status.success(), "{}", stderr(&out));
    let html = fs::read_to_string(dir.path().join("notes.html")).unwrap();
    assert!(html.contains("md2pdf:theme sepia"));
}

#[test]
fn test_convert_same_stem_keeps_both_outputs() {
    let dir = TempDir::new().unwrap();
    for (sub, text) in [("a", "# Alpha\n"), ("b", "# Beta\n")] {
        fs::create_dir_all(dir.path().join(sub)).unwrap();
        fs::write(dir.path().join(sub).join("report.md"), text).unwrap();
    }

    let out = md2pdf(
        dir.path(),
        &["convert", "a/report.md", "b/report.md", "-o", "out", "--format", "html"],
    );
    assert!(out.status.success(), "{}", stderr(&out));
    let first = fs::read_to_string(dir.path().join("out/report.html")).unwrap();
    let second = fs::read_to_string(dir.path().join("out/report_1.html")).unwrap();
    assert!(first.contains("Alpha"));
    assert!(second.contains("Beta"));
}

#[test]
fn test_convert_missing_input() {
    let dir = TempDir::new().unwrap();
    let out = md2pdf(dir.path(), &["convert", "ghost.md", "--format", "html"]);
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn test_invalid_config_fails() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("md2pdf.yaml"), "jobs: 0\n").unwrap();
    let out = md2pdf(dir.path(), &["list"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("jobs"));
}

#[cfg(unix)]
#[test]
fn test_convert_with_configured_renderer() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("doc.md"), "# Doc\n").unwrap();
    fs::write(
        dir.path().join("md2pdf.yaml"),
        "style: academic\noutput_dir: out\nrenderer:\n  command: \"cat\"\n",
    )
    .unwrap();

    let out = md2pdf(dir.path(), &["convert", "doc.md"]);
    assert!(out.status.success(), "{}", stderr(&out));
    let pdf = fs::read_to_string(dir.path().join("out/doc.pdf")).unwrap();
    assert!(pdf.contains("md2pdf:style academic"));
}

#[cfg(unix)]
#[test]
fn test_renderer_failure_exit_code() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("doc.md"), "# Doc\n").unwrap();
    fs::write(
        dir.path().join("md2pdf.yaml"),
        "renderer:\n  command: \"echo broken >&2; exit 1\"\n",
    )
    .unwrap();

    let out = md2pdf(dir.path(), &["convert", "doc.md"]);
    assert_eq!(out.status.code(), Some(4));
    assert!(stderr(&out).contains("broken"));
}

// =============================================================================
// batch
// =============================================================================

#[cfg(unix)]
#[test]
fn test_batch_command() {
    let dir = TempDir::new().unwrap();
    let docs = dir.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("one.md"), "1\n").unwrap();
    fs::write(docs.join("two.md"), "2\n").unwrap();
    fs::write(
        dir.path().join("md2pdf.yaml"),
        "renderer:\n  command: \"cat\"\n",
    )
    .unwrap();

    let out = md2pdf(
        dir.path(),
        &["batch", "docs", "-o", "out", "-t", "dark", "--processed", "done", "-j", "2"],
    );
    assert!(out.status.success(), "{}", stderr(&out));
    assert!(dir.path().join("out/one_technical_dark.pdf").is_file());
    assert!(dir.path().join("out/two_technical_dark.pdf").is_file());
    assert!(dir.path().join("done/one.md").is_file());
    assert!(stdout(&out).contains("2 converted"));
}
