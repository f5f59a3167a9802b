//! Batch conversion of a directory of Markdown files.
//!
//! Files are converted in parallel on a `rayon` pool. Every output is named
//! `<stem>_<style>_<theme>.<ext>` and never overwrites an existing file; a
//! `_1`, `_2`, ... suffix is appended instead. Cancellation works by not
//! starting new files once [`BatchRunner::stop_handle`] has been set.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use glob::{MatchOptions, Pattern};
use md2pdf_styles::normalize_name;
use rayon::prelude::*;
use serde::Serialize;

use crate::config::OverrideSet;
use crate::convert::{ConvertJob, ConvertOutcome, Converter, OutputFormat};
use crate::error::{exit, ConfigError, ConvertError};

/// Markdown files under `path`, sorted.
///
/// A file path is returned as-is. For a directory, `*.md` files are
/// collected (case-insensitively), descending into subdirectories when
/// `recursive` is set.
pub fn collect_inputs(path: &Path, recursive: bool) -> Result<Vec<PathBuf>, ConvertError> {
    let meta = fs::metadata(path).map_err(|source| ConvertError::Input {
        path: path.to_path_buf(),
        source,
    })?;
    if meta.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let root = Pattern::escape(&path.to_string_lossy());
    let pattern = if recursive {
        format!("{}/**/*.md", root)
    } else {
        format!("{}/*.md", root)
    };
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };
    let paths = glob::glob_with(&pattern, options).map_err(|source| {
        ConvertError::Config(ConfigError::Pattern {
            pattern: pattern.clone(),
            source,
        })
    })?;

    let mut inputs: Vec<PathBuf> = paths
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                log::warn!("skipping {}: {}", e.path().display(), e.error());
                None
            }
        })
        .filter(|p| p.is_file())
        .collect();
    inputs.sort();
    log::debug!("collected {} input file(s) from {}", inputs.len(), path.display());
    Ok(inputs)
}

/// Settings for one batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub output_dir: PathBuf,
    /// Default style, before overrides.
    pub style: String,
    /// Default theme, before overrides.
    pub theme: String,
    pub format: OutputFormat,
    pub overrides: OverrideSet,
    /// Successfully converted sources are moved here.
    pub processed_dir: Option<PathBuf>,
    /// Worker threads; `None` uses one per core.
    pub jobs: Option<usize>,
}

/// Result for one input file.
#[derive(Debug)]
pub enum FileResult {
    Converted(ConvertOutcome),
    Failed { input: PathBuf, error: ConvertError },
    /// Not started because the batch was stopped.
    Skipped(PathBuf),
}

/// Everything a batch run did, in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub results: Vec<FileResult>,
}

impl BatchReport {
    pub fn converted(&self) -> impl Iterator<Item = &ConvertOutcome> {
        self.results.iter().filter_map(|r| match r {
            FileResult::Converted(outcome) => Some(outcome),
            _ => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Path, &ConvertError)> {
        self.results.iter().filter_map(|r| match r {
            FileResult::Failed { input, error } => Some((input.as_path(), error)),
            _ => None,
        })
    }

    pub fn skipped(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r, FileResult::Skipped(_)))
            .count()
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            total: self.results.len(),
            converted: self.converted().count(),
            cached: self.converted().filter(|o| o.cached).count(),
            failed: self.failures().count(),
            skipped: self.skipped(),
        }
    }

    /// Exit code of the first failure in input order, or success.
    pub fn exit_code(&self) -> u8 {
        self.failures()
            .map(|(_, e)| e.exit_code())
            .next()
            .unwrap_or(exit::SUCCESS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub converted: usize,
    pub cached: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Runs a batch against one [`Converter`].
pub struct BatchRunner<'c> {
    converter: &'c Converter,
    options: BatchOptions,
    stop: Arc<AtomicBool>,
    reserved: Mutex<HashSet<PathBuf>>,
}

impl<'c> BatchRunner<'c> {
    pub fn new(converter: &'c Converter, options: BatchOptions) -> Self {
        Self {
            converter,
            options,
            stop: Arc::new(AtomicBool::new(false)),
            reserved: Mutex::new(HashSet::new()),
        }
    }

    /// Setting the flag stops the batch from starting further files.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn run(&self, inputs: &[PathBuf]) -> BatchReport {
        if let Err(source) = fs::create_dir_all(&self.options.output_dir) {
            let error = || ConvertError::Output {
                path: self.options.output_dir.clone(),
                source: io::Error::new(source.kind(), source.to_string()),
            };
            return BatchReport {
                results: inputs
                    .iter()
                    .map(|input| FileResult::Failed {
                        input: input.clone(),
                        error: error(),
                    })
                    .collect(),
            };
        }

        let work = || {
            inputs
                .par_iter()
                .map(|input| self.run_one(input))
                .collect::<Vec<FileResult>>()
        };
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(jobs) = self.options.jobs {
            builder = builder.num_threads(jobs);
        }
        let results = match builder.build() {
            Ok(pool) => {
                log::debug!("batch pool with {} thread(s)", pool.current_num_threads());
                pool.install(work)
            }
            Err(e) => {
                log::warn!("failed to build batch thread pool: {}. Using default.", e);
                work()
            }
        };
        BatchReport { results }
    }

    fn run_one(&self, input: &Path) -> FileResult {
        if self.stop.load(Ordering::SeqCst) {
            log::info!("batch stopped, skipping {}", input.display());
            return FileResult::Skipped(input.to_path_buf());
        }

        let (style, theme) =
            self.options
                .overrides
                .resolve(input, &self.options.style, &self.options.theme);
        let output = self.reserve(&self.output_name(input, &style, &theme));
        let job = ConvertJob {
            input: input.to_path_buf(),
            output: output.clone(),
            style,
            theme,
            format: self.options.format,
        };

        let result = self.converter.convert(&job);
        self.release(&output);
        match result {
            Ok(outcome) => {
                if let Some(dir) = &self.options.processed_dir {
                    if let Err(e) = self.move_processed(input, dir) {
                        log::warn!("could not move {} to {}: {}", input.display(), dir.display(), e);
                    }
                }
                FileResult::Converted(outcome)
            }
            Err(error) => {
                log::error!("{}: {}", input.display(), error);
                FileResult::Failed {
                    input: input.to_path_buf(),
                    error,
                }
            }
        }
    }

    fn output_name(&self, input: &Path, style: &str, theme: &str) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        self.options.output_dir.join(format!(
            "{}_{}_{}.{}",
            stem,
            normalize_name(style),
            normalize_name(theme),
            self.options.format.extension()
        ))
    }

    /// First free variant of `path`, held until [`release`](Self::release)
    /// so parallel workers never pick the same name.
    fn reserve(&self, path: &Path) -> PathBuf {
        let mut reserved = match self.reserved.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let chosen = unique_path(path, |candidate| reserved.contains(candidate));
        reserved.insert(chosen.clone());
        chosen
    }

    fn release(&self, path: &Path) {
        let mut reserved = match self.reserved.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        reserved.remove(path);
    }

    fn move_processed(&self, input: &Path, dir: &Path) -> io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let file_name = input.file_name().unwrap_or(input.as_os_str());
        let target = self.reserve(&dir.join(file_name));
        let result = move_file(input, &target);
        self.release(&target);
        result?;
        log::info!("moved {} to {}", input.display(), target.display());
        Ok(target)
    }
}

/// `path`, or `name_1.ext`, `name_2.ext`, ... if it exists on disk or
/// `taken` claims it.
pub fn unique_path(path: &Path, taken: impl Fn(&Path) -> bool) -> PathBuf {
    let free = |p: &Path| !p.exists() && !taken(p);
    if free(path) {
        return path.to_path_buf();
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());
    let mut n = 1usize;
    loop {
        let name = match &ext {
            Some(ext) => format!("{}_{}.{}", stem, n, ext),
            None => format!("{}_{}", stem, n),
        };
        let candidate = path.with_file_name(name);
        if free(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        // Cross-device moves need a copy.
        Err(_) => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // =========================================================================
    // Input collection
    // =========================================================================

    #[test]
    fn test_collect_flat_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.md"), "b").unwrap();
        fs::write(dir.path().join("a.MD"), "a").unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/c.md"), "c").unwrap();

        let inputs = collect_inputs(dir.path(), false).unwrap();
        let names: Vec<_> = inputs
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.MD", "b.md"]);
    }

    #[test]
    fn test_collect_recursive() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.md"), "a").unwrap();
        fs::create_dir_all(dir.path().join("sub/deeper")).unwrap();
        fs::write(dir.path().join("sub/deeper/c.md"), "c").unwrap();

        let inputs = collect_inputs(dir.path(), true).unwrap();
        assert_eq!(inputs.len(), 2);
        assert!(inputs.iter().any(|p| p.ends_with("sub/deeper/c.md")));
    }

    #[test]
    fn test_collect_single_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("one.md");
        fs::write(&file, "x").unwrap();
        assert_eq!(collect_inputs(&file, false).unwrap(), vec![file]);
    }

    #[test]
    fn test_collect_missing_is_bad_input() {
        let dir = TempDir::new().unwrap();
        let err = collect_inputs(&dir.path().join("nope"), false).unwrap_err();
        assert_eq!(err.exit_code(), exit::BAD_INPUT);
    }

    // =========================================================================
    // Naming
    // =========================================================================

    #[test]
    fn test_unique_path_counts_up() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report_technical_default.pdf");
        assert_eq!(unique_path(&path, |_| false), path);

        fs::write(&path, "x").unwrap();
        let first = unique_path(&path, |_| false);
        assert_eq!(first, dir.path().join("report_technical_default_1.pdf"));

        fs::write(&first, "x").unwrap();
        let taken = dir.path().join("report_technical_default_2.pdf");
        assert_eq!(
            unique_path(&path, |p| p == taken),
            dir.path().join("report_technical_default_3.pdf")
        );
    }

    #[test]
    fn test_unique_path_without_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("README");
        fs::write(&path, "x").unwrap();
        assert_eq!(unique_path(&path, |_| false), dir.path().join("README_1"));
    }

    #[test]
    fn test_report_exit_code_is_first_failure() {
        let report = BatchReport {
            results: vec![
                FileResult::Skipped(PathBuf::from("a.md")),
                FileResult::Failed {
                    input: PathBuf::from("b.md"),
                    error: ConvertError::Input {
                        path: PathBuf::from("b.md"),
                        source: io::Error::from(io::ErrorKind::NotFound),
                    },
                },
            ],
        };
        assert_eq!(report.exit_code(), exit::BAD_INPUT);
        let summary = report.summary();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(BatchReport::default().exit_code(), exit::SUCCESS);
    }
}
