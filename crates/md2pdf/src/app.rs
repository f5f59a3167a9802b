//! Command-line interface.

use std::collections::HashSet;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use console::style;
use serde::Serialize;

use md2pdf_styles::{merge, Descriptor, Registry, RegistryHandle, StoreError, Validator, Verdict};

use crate::batch::{collect_inputs, unique_path, BatchOptions, BatchRunner, FileResult};
use crate::builtin::LibraryStore;
use crate::config::Config;
use crate::convert::{default_output_path, ConvertJob, ConvertOptions, Converter, OutputFormat};
use crate::error::{exit, ConvertError};
use crate::render::CommandRenderer;
use crate::word::PandocExporter;

#[derive(Debug, Parser)]
#[command(name = "md2pdf")]
#[command(version, about = "Convert Markdown to styled PDF, Word and HTML", long_about = None)]
pub struct Cli {
    /// Configuration file (default: md2pdf.yaml in the working directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory of style sheets
    #[arg(long, global = true)]
    pub styles_dir: Option<PathBuf>,

    /// Directory of theme sheets
    #[arg(long, global = true)]
    pub themes_dir: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List available styles and themes
    List {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Check a style/theme combination
    Check {
        style: String,
        theme: String,

        /// Treat a discouraged combination as an error
        #[arg(long)]
        strict: bool,

        /// Print the effective CSS variables of the combination
        #[arg(long)]
        vars: bool,
    },

    /// Re-scan the style and theme directories and report the result
    Refresh,

    /// Convert one or more Markdown files
    Convert {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output file (single input) or directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short, long)]
        style: Option<String>,

        #[arg(short, long)]
        theme: Option<String>,

        #[arg(long, value_enum)]
        format: Option<OutputFormat>,

        /// Extra CSS appended after the theme
        #[arg(long)]
        css: Option<PathBuf>,

        /// Extra print CSS appended last
        #[arg(long)]
        print_css: Option<PathBuf>,

        /// Header directory (logo image and header.md)
        #[arg(long)]
        header: Option<PathBuf>,

        /// Treat a discouraged combination as an error
        #[arg(long)]
        strict: bool,
    },

    /// Convert every Markdown file in a directory
    Batch {
        dir: PathBuf,

        /// Output directory (default: <dir>/output)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,

        /// Move converted sources into this directory
        #[arg(long)]
        processed: Option<PathBuf>,

        /// Worker threads (default: one per core)
        #[arg(short, long)]
        jobs: Option<usize>,

        #[arg(short, long)]
        style: Option<String>,

        #[arg(short, long)]
        theme: Option<String>,

        #[arg(long, value_enum)]
        format: Option<OutputFormat>,

        #[arg(long)]
        strict: bool,
    },
}

/// Parses arguments, runs the command and maps failures to exit codes.
pub fn run_cli() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("{} {:#}", style("error:").red().bold(), err);
            ExitCode::from(exit_code_for(&err))
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .parse_default_env()
        .try_init();
}

/// Exit code for an error that reached the top level.
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    if let Some(e) = err.downcast_ref::<ConvertError>() {
        return e.exit_code();
    }
    if let Some(e) = err.downcast_ref::<md2pdf_styles::Error>() {
        return match e {
            md2pdf_styles::Error::Lookup(_) | md2pdf_styles::Error::Discouraged { .. } => {
                exit::UNKNOWN_COMBINATION
            }
            _ => exit::FAILURE,
        };
    }
    if err.downcast_ref::<md2pdf_styles::LookupError>().is_some() {
        return exit::UNKNOWN_COMBINATION;
    }
    exit::FAILURE
}

/// Runs a parsed command line. Returns the exit code for outcomes that are
/// reported rather than raised, such as partial batch failures.
pub fn run(cli: Cli) -> Result<u8> {
    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    let (mut config, origin) = Config::discover(cli.config.as_deref(), &cwd)?;
    if let Some(path) = &origin {
        log::info!("using config {}", path.display());
    }
    if cli.styles_dir.is_some() {
        config.styles_dir = cli.styles_dir;
    }
    if cli.themes_dir.is_some() {
        config.themes_dir = cli.themes_dir;
    }

    let library = LibraryStore::new(config.styles_dir.as_deref(), config.themes_dir.as_deref());

    match cli.command {
        Commands::List { json } => {
            let registry = library.load()?;
            list_command(&registry, json)?;
            Ok(exit::SUCCESS)
        }
        Commands::Check {
            style,
            theme,
            strict,
            vars,
        } => {
            let registry = library.load()?;
            let validator = Validator::new(config.policy());
            check_command(&registry, &validator, &style, &theme, strict || config.strict, vars)
        }
        Commands::Refresh => {
            refresh_command(&library)?;
            Ok(exit::SUCCESS)
        }
        Commands::Convert {
            files,
            output,
            style,
            theme,
            format,
            css,
            print_css,
            header,
            strict,
        } => {
            if let Some(style) = style {
                config.style = style;
            }
            if let Some(theme) = theme {
                config.theme = theme;
            }
            if let Some(format) = format {
                config.format = format;
            }
            if css.is_some() {
                config.custom_css = css;
            }
            if print_css.is_some() {
                config.print_css = print_css;
            }
            if header.is_some() {
                config.header_dir = header;
            }
            config.strict |= strict;

            let converter = build_converter(&config, &library)?;
            convert_command(&converter, &config, &files, output.as_deref())
        }
        Commands::Batch {
            dir,
            output,
            recursive,
            processed,
            jobs,
            style,
            theme,
            format,
            strict,
        } => {
            if let Some(style) = style {
                config.style = style;
            }
            if let Some(theme) = theme {
                config.theme = theme;
            }
            if let Some(format) = format {
                config.format = format;
            }
            if output.is_some() {
                config.output_dir = output;
            }
            if processed.is_some() {
                config.processed_dir = processed;
            }
            if jobs.is_some() {
                config.jobs = jobs;
            }
            config.strict |= strict;

            let converter = build_converter(&config, &library)?;
            batch_command(&converter, &config, &dir, recursive)
        }
    }
}

/// A converter wired to the configured renderer, exporter and policy.
pub fn build_converter(config: &Config, library: &LibraryStore) -> Result<Converter> {
    let registry = RegistryHandle::new(library.load()?);
    let timeout = config.renderer.timeout();
    let converter = Converter::new(registry, ConvertOptions::from_config(config))?
        .with_validator(Validator::new(config.policy()))
        .with_renderer(CommandRenderer::new(&config.renderer.command).with_timeout(timeout))
        .with_word_exporter(PandocExporter::new(&config.word.command).with_timeout(timeout));
    Ok(converter)
}

// =============================================================================
// list
// =============================================================================

#[derive(Serialize)]
struct Listing<'a> {
    styles: Vec<&'a Descriptor>,
    themes: Vec<&'a Descriptor>,
}

pub fn list_command(registry: &Registry, json: bool) -> Result<()> {
    let mut out = io::stdout().lock();
    if json {
        let listing = Listing {
            styles: registry.styles().collect(),
            themes: registry.themes().collect(),
        };
        serde_json::to_writer_pretty(&mut out, &listing)?;
        writeln!(out)?;
        return Ok(());
    }

    write_section(&mut out, "Styles", registry.styles())?;
    writeln!(out)?;
    write_section(&mut out, "Themes", registry.themes())?;
    Ok(())
}

fn write_section<'a>(
    out: &mut impl Write,
    title: &str,
    items: impl Iterator<Item = &'a Descriptor>,
) -> io::Result<()> {
    writeln!(out, "{}", style(title).bold().underlined())?;
    let items: Vec<_> = items.collect();
    let width = items.iter().map(|d| d.name.len()).max().unwrap_or(0);
    for d in items {
        let padded = format!("{:width$}", d.name, width = width);
        if d.description.is_empty() {
            writeln!(out, "  {}  {}", style(padded).cyan(), d.display_name)?;
        } else {
            writeln!(
                out,
                "  {}  {} {}",
                style(padded).cyan(),
                d.display_name,
                style(format!("- {}", d.description)).dim()
            )?;
        }
    }
    Ok(())
}

// =============================================================================
// check
// =============================================================================

pub fn check_command(
    registry: &Registry,
    validator: &Validator,
    style_name: &str,
    theme_name: &str,
    strict: bool,
    vars: bool,
) -> Result<u8> {
    let validation = if strict {
        validator.validate_strict(registry, style_name, theme_name)?
    } else {
        validator.validate(registry, style_name, theme_name)?
    };

    let pair = format!("{} + {}", validation.style.name, validation.theme.name);
    match &validation.verdict {
        Verdict::Valid => println!("{} {}", style("ok").green().bold(), pair),
        Verdict::Discouraged(reason) => println!(
            "{} {}: {}",
            style("discouraged").yellow().bold(),
            pair,
            reason
        ),
    }

    if vars {
        let merged = merge(validation.style, validation.theme, None, None)?;
        for (name, value, layer) in merged.effective_variables() {
            println!("  {}: {} {}", style(name).cyan(), value, style(format!("({})", layer)).dim());
        }
    }
    Ok(exit::SUCCESS)
}

// =============================================================================
// refresh
// =============================================================================

pub fn refresh_command(library: &LibraryStore) -> Result<()> {
    let registry = library.load().map_err(refresh_error)?;

    println!(
        "{} {} style(s), {} theme(s)",
        style("discovered").green().bold(),
        registry.style_names().len(),
        registry.theme_names().len()
    );
    for warning in registry.warnings() {
        println!("  {} {}", style("warning:").yellow(), warning);
    }
    Ok(())
}

fn refresh_error(err: StoreError) -> anyhow::Error {
    anyhow::Error::new(err).context("stylesheet discovery failed")
}

// =============================================================================
// convert
// =============================================================================

pub fn convert_command(
    converter: &Converter,
    config: &Config,
    files: &[PathBuf],
    output: Option<&Path>,
) -> Result<u8> {
    let format = config.format;
    let mut code = exit::SUCCESS;

    for (input, output) in files.iter().zip(output_paths(files, output, config)) {
        let job = ConvertJob {
            input: input.clone(),
            output,
            style: config.style.clone(),
            theme: config.theme.clone(),
            format,
        };

        match converter.convert(&job) {
            Ok(outcome) => {
                let note = if outcome.cached { " (cached)" } else { "" };
                println!(
                    "{} {} -> {}{}",
                    style("converted").green().bold(),
                    outcome.input.display(),
                    outcome.output.display(),
                    style(note).dim()
                );
                if let Some(reason) = outcome.discouraged {
                    println!("  {} {}", style("warning:").yellow(), reason);
                }
            }
            Err(err) => {
                eprintln!("{} {}: {}", style("failed").red().bold(), input.display(), err);
                if code == exit::SUCCESS {
                    code = err.exit_code();
                }
            }
        }
    }
    Ok(code)
}

/// One output path per input. Inputs sharing a stem get numbered names
/// instead of overwriting each other.
fn output_paths(files: &[PathBuf], output: Option<&Path>, config: &Config) -> Vec<PathBuf> {
    let format = config.format;
    let mut planned: HashSet<PathBuf> = HashSet::new();
    let mut paths = Vec::with_capacity(files.len());

    for input in files {
        let path = match output {
            Some(path) if files.len() == 1 && is_file_target(path, format) => path.to_path_buf(),
            Some(dir) => default_output_path(input, Some(dir), format),
            None => default_output_path(input, config.output_dir.as_deref(), format),
        };
        let path = if planned.contains(&path) {
            unique_path(&path, |p| planned.contains(p))
        } else {
            path
        };
        planned.insert(path.clone());
        paths.push(path);
    }
    paths
}

fn is_file_target(path: &Path, format: OutputFormat) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(format.extension()))
}

// =============================================================================
// batch
// =============================================================================

pub fn batch_command(
    converter: &Converter,
    config: &Config,
    dir: &Path,
    recursive: bool,
) -> Result<u8> {
    let inputs = collect_inputs(dir, recursive)?;
    if inputs.is_empty() {
        println!("no Markdown files in {}", dir.display());
        return Ok(exit::SUCCESS);
    }

    let options = BatchOptions {
        output_dir: config
            .output_dir
            .clone()
            .unwrap_or_else(|| dir.join("output")),
        style: config.style.clone(),
        theme: config.theme.clone(),
        format: config.format,
        overrides: config.override_set()?,
        processed_dir: config.processed_dir.clone(),
        jobs: config.jobs,
    };
    let report = BatchRunner::new(converter, options).run(&inputs);

    for result in &report.results {
        match result {
            FileResult::Converted(outcome) => println!(
                "{} {} -> {}",
                style("converted").green(),
                outcome.input.display(),
                outcome.output.display()
            ),
            FileResult::Failed { input, error } => eprintln!(
                "{} {}: {}",
                style("failed").red(),
                input.display(),
                error
            ),
            FileResult::Skipped(input) => {
                println!("{} {}", style("skipped").dim(), input.display())
            }
        }
    }

    let summary = report.summary();
    println!(
        "{} {} converted ({} cached), {} failed, {} skipped",
        style("done:").bold(),
        summary.converted,
        summary.cached,
        summary.failed,
        summary.skipped
    );
    Ok(report.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_convert() {
        let cli = Cli::try_parse_from([
            "md2pdf", "-vv", "convert", "a.md", "b.md", "-s", "academic", "-t", "sepia",
            "--format", "word",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Convert {
                files,
                style,
                theme,
                format,
                ..
            } => {
                assert_eq!(files.len(), 2);
                assert_eq!(style.as_deref(), Some("academic"));
                assert_eq!(theme.as_deref(), Some("sepia"));
                assert_eq!(format, Some(OutputFormat::Word));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_convert_requires_files() {
        assert!(Cli::try_parse_from(["md2pdf", "convert"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["md2pdf", "list", "--styles-dir", "s", "--json"]).unwrap();
        assert_eq!(cli.styles_dir, Some(PathBuf::from("s")));
        assert!(matches!(cli.command, Commands::List { json: true }));
    }

    #[test]
    fn test_exit_code_for_errors() {
        let lookup = md2pdf_styles::LookupError::ThemeNotFound {
            name: "neon".to_string(),
            known: vec!["dark".to_string()],
        };
        assert_eq!(
            exit_code_for(&anyhow::Error::new(lookup.clone())),
            exit::UNKNOWN_COMBINATION
        );
        assert_eq!(
            exit_code_for(&anyhow::Error::new(ConvertError::Lookup(lookup))),
            exit::UNKNOWN_COMBINATION
        );
        assert_eq!(exit_code_for(&anyhow::anyhow!("boom")), exit::FAILURE);
    }

    #[test]
    fn test_is_file_target() {
        assert!(is_file_target(Path::new("out/report.PDF"), OutputFormat::Pdf));
        assert!(!is_file_target(Path::new("out"), OutputFormat::Pdf));
        assert!(!is_file_target(Path::new("out/report.pdf"), OutputFormat::Word));
    }

    #[test]
    fn test_output_paths_number_shared_stems() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("out");
        let files = vec![
            PathBuf::from("a/report.md"),
            PathBuf::from("b/report.md"),
            PathBuf::from("c/report.md"),
            PathBuf::from("notes.md"),
        ];

        let paths = output_paths(&files, Some(&out), &Config::default());
        assert_eq!(
            paths,
            vec![
                out.join("report.pdf"),
                out.join("report_1.pdf"),
                out.join("report_2.pdf"),
                out.join("notes.pdf"),
            ]
        );
    }

    #[test]
    fn test_output_paths_single_file_target() {
        let target = PathBuf::from("final.pdf");
        let paths = output_paths(&[PathBuf::from("doc.md")], Some(&target), &Config::default());
        assert_eq!(paths, vec![target]);
    }
}
