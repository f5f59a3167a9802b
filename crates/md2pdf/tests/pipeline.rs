//! End-to-end conversions with an in-process renderer.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use md2pdf::{
    collect_inputs, exit, BatchOptions, BatchRunner, Config, ConvertJob, ConvertOptions,
    Converter, FileResult, LibraryStore, OutputFormat, RenderError, RenderRequest, Renderer,
};
use md2pdf_styles::{RegistryHandle, Validator};
use tempfile::TempDir;

/// Writes the HTML it is given, prefixed so the output is recognizable.
#[derive(Clone, Default)]
struct FakePdf {
    calls: Arc<AtomicUsize>,
}

impl Renderer for FakePdf {
    fn render(&self, request: &RenderRequest<'_>) -> Result<Vec<u8>, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut out = b"%PDF-fake\n".to_vec();
        out.extend_from_slice(request.document.as_str().as_bytes());
        Ok(out)
    }

    fn name(&self) -> &str {
        "fake-pdf"
    }
}

fn write(path: &Path, text: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, text).unwrap();
}

fn converter_for(library: &LibraryStore, config: &Config) -> (Converter, FakePdf) {
    let renderer = FakePdf::default();
    let registry = RegistryHandle::new(library.load().unwrap());
    let converter = Converter::new(registry, ConvertOptions::from_config(config))
        .unwrap()
        .with_validator(Validator::new(config.policy()))
        .with_renderer(renderer.clone())
        .with_date("02 Mar 2025");
    (converter, renderer)
}

fn builtin_converter() -> (Converter, FakePdf) {
    converter_for(&LibraryStore::new(None, None), &Config::default())
}

fn batch_options(output_dir: PathBuf) -> BatchOptions {
    let config = Config::default();
    BatchOptions {
        output_dir,
        style: config.style,
        theme: config.theme,
        format: OutputFormat::Pdf,
        overrides: Default::default(),
        processed_dir: None,
        jobs: Some(4),
    }
}

// =============================================================================
// Single conversions
// =============================================================================

#[test]
fn test_custom_theme_directory() {
    let dir = TempDir::new().unwrap();
    let themes = dir.path().join("themes");
    write(
        &themes.join("Solarized_Light.css"),
        "/* Solarized Light - Low contrast */\n:root { --theme-bg: #fdf6e3; }\n",
    );
    let input = dir.path().join("doc.md");
    write(&input, "# Doc\n");

    let (converter, _) = converter_for(&LibraryStore::new(None, Some(&themes)), &Config::default());
    let outcome = converter
        .convert(&ConvertJob {
            input,
            output: dir.path().join("doc.pdf"),
            style: "technical".to_string(),
            theme: "Solarized Light".to_string(),
            format: OutputFormat::Pdf,
        })
        .unwrap();

    assert_eq!(outcome.theme, "solarized-light");
    let pdf = fs::read_to_string(dir.path().join("doc.pdf")).unwrap();
    assert!(pdf.starts_with("%PDF-fake"));
    assert!(pdf.contains("--theme-bg: #fdf6e3"));
}

#[test]
fn test_configured_discouraged_pair_blocks_in_strict_mode() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("doc.md");
    write(&input, "text\n");

    let config = Config::from_yaml(
        "strict: true\ndiscouraged:\n  - style: modern\n    theme: sepia\n    reason: washed out\n",
        dir.path(),
    )
    .unwrap();
    let (converter, renderer) = converter_for(&LibraryStore::new(None, None), &config);

    let err = converter
        .convert(&ConvertJob {
            input,
            output: dir.path().join("doc.pdf"),
            style: "modern".to_string(),
            theme: "sepia".to_string(),
            format: OutputFormat::Pdf,
        })
        .unwrap_err();
    assert_eq!(err.exit_code(), exit::UNKNOWN_COMBINATION);
    assert!(err.to_string().contains("washed out"));
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
    assert!(!dir.path().join("doc.pdf").exists());
}

#[test]
fn test_edited_source_rerenders() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("doc.md");
    write(&input, "first\n");
    let (converter, renderer) = builtin_converter();
    let job = ConvertJob {
        input: input.clone(),
        output: dir.path().join("doc.pdf"),
        style: "technical".to_string(),
        theme: "default".to_string(),
        format: OutputFormat::Pdf,
    };

    converter.convert(&job).unwrap();
    assert!(converter.convert(&job).unwrap().cached);

    write(&input, "second\n");
    let outcome = converter.convert(&job).unwrap();
    assert!(!outcome.cached);
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 2);
    assert!(fs::read_to_string(&job.output).unwrap().contains("second"));
}

#[test]
fn test_toc_and_extensions() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("guide.md");
    write(
        &input,
        "[TOC]\n\n# Intro\n\n## Setup\n\n| a | b |\n|---|---|\n| 1 | 2 |\n\n- [x] done\n\n~~old~~\n",
    );
    let (converter, _) = builtin_converter();
    let outcome = converter
        .convert(&ConvertJob {
            input,
            output: dir.path().join("guide.html"),
            style: "academic".to_string(),
            theme: "oceanic".to_string(),
            format: OutputFormat::Html,
        })
        .unwrap();

    let html = fs::read_to_string(outcome.output).unwrap();
    assert!(html.contains("<nav class=\"toc\">"));
    assert!(html.contains("href=\"#setup\""));
    assert!(html.contains("<table>"));
    assert!(html.contains("checkbox"));
    assert!(html.contains("<del>old</del>"));
}

// =============================================================================
// Batch
// =============================================================================

#[test]
fn test_batch_names_outputs_and_never_overwrites() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("src");
    write(&src.join("a.md"), "# A\n");
    write(&src.join("b.md"), "# B\n");
    let out = dir.path().join("out");
    write(&out.join("a_technical_default.pdf"), "existing");

    let (converter, _) = builtin_converter();
    let inputs = collect_inputs(&src, false).unwrap();
    let report = BatchRunner::new(&converter, batch_options(out.clone())).run(&inputs);

    assert_eq!(report.exit_code(), exit::SUCCESS);
    assert_eq!(fs::read_to_string(out.join("a_technical_default.pdf")).unwrap(), "existing");
    assert!(out.join("a_technical_default_1.pdf").is_file());
    assert!(out.join("b_technical_default.pdf").is_file());
}

#[test]
fn test_batch_overrides_and_processed_dir() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("src");
    write(&src.join("report.md"), "# Report\n");
    write(&src.join("story-chapter.md"), "Once upon a time.\n");

    let config = Config::from_yaml(
        "overrides:\n  - pattern: \"story-*.md\"\n    style: story\n    theme: sepia\n",
        dir.path(),
    )
    .unwrap();
    let (converter, _) = converter_for(&LibraryStore::new(None, None), &config);

    let processed = dir.path().join("done");
    let mut options = batch_options(dir.path().join("out"));
    options.overrides = config.override_set().unwrap();
    options.processed_dir = Some(processed.clone());

    let report = BatchRunner::new(&converter, options).run(&collect_inputs(&src, false).unwrap());
    assert_eq!(report.summary().converted, 2);

    let out = dir.path().join("out");
    assert!(out.join("report_technical_default.pdf").is_file());
    assert!(out.join("story-chapter_story_sepia.pdf").is_file());
    assert!(processed.join("report.md").is_file());
    assert!(!src.join("report.md").exists());
}

#[test]
fn test_batch_failure_keeps_source_and_reports_code() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("src");
    write(&src.join("good.md"), "ok\n");
    write(&src.join("bad.md"), "ok\n");

    let config = Config::from_yaml(
        "overrides:\n  - pattern: \"bad.md\"\n    theme: neon\n",
        dir.path(),
    )
    .unwrap();
    let (converter, _) = converter_for(&LibraryStore::new(None, None), &config);
    let processed = dir.path().join("done");
    let mut options = batch_options(dir.path().join("out"));
    options.overrides = config.override_set().unwrap();
    options.processed_dir = Some(processed.clone());

    let report = BatchRunner::new(&converter, options).run(&collect_inputs(&src, false).unwrap());
    assert_eq!(report.exit_code(), exit::UNKNOWN_COMBINATION);
    assert!(src.join("bad.md").is_file());
    assert!(processed.join("good.md").is_file());
}

#[test]
fn test_batch_identical_sources_render_once() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("src");
    for i in 0..12 {
        write(&src.join(format!("part{:02}", i)).join("same.md"), "# Same\n\nbody\n");
    }

    let (converter, renderer) = builtin_converter();
    let out = dir.path().join("out");
    let report = BatchRunner::new(&converter, batch_options(out.clone()))
        .run(&collect_inputs(&src, true).unwrap());

    let summary = report.summary();
    assert_eq!(summary.converted, 12);
    assert_eq!(summary.cached, 11);
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);

    let mut names: Vec<String> = fs::read_dir(&out)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names.len(), 12);
    assert!(names.contains(&"same_technical_default.pdf".to_string()));
    assert!(names.contains(&"same_technical_default_11.pdf".to_string()));
}

#[test]
fn test_stopped_batch_skips_everything() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("src");
    write(&src.join("a.md"), "a\n");
    write(&src.join("b.md"), "b\n");

    let (converter, renderer) = builtin_converter();
    let runner = BatchRunner::new(&converter, batch_options(dir.path().join("out")));
    runner.stop_handle().store(true, Ordering::SeqCst);
    let report = runner.run(&collect_inputs(&src, false).unwrap());

    assert_eq!(report.summary().skipped, 2);
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
    assert!(matches!(report.results[0], FileResult::Skipped(_)));
}
