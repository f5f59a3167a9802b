//! # md2pdf - Markdown to Styled Documents
//!
//! `md2pdf` turns Markdown files into PDF, Word or standalone HTML, styled by
//! a *style* (typography and layout) and a *theme* (colors), both plain CSS
//! files discovered at startup by [`md2pdf_styles`].
//!
//! ## Pipeline
//!
//! For PDF and HTML output, [`Converter::convert`] renders the Markdown with
//! a [`MarkdownParser`], merges base, style, theme, custom and print CSS,
//! wraps everything in an [`HtmlDocument`] and hands it to a [`Renderer`].
//! Results are cached per output format by content fingerprint, so
//! converting an unchanged file again does not run the renderer.
//!
//! Word output goes to a [`WordExporter`] directly; CSS plays no part.
//!
//! [`BatchRunner`] runs many conversions on a thread pool, and [`app`] is
//! the `md2pdf` command line built on top of all of it.
//!
//! ## Example
//!
//! ```rust,no_run
//! use md2pdf::{builtin_registry, ConvertJob, ConvertOptions, Converter, HtmlRenderer, OutputFormat};
//! use md2pdf_styles::RegistryHandle;
//!
//! let registry = RegistryHandle::new(builtin_registry()?);
//! let converter = Converter::new(registry, ConvertOptions::default())?
//!     .with_renderer(HtmlRenderer);
//!
//! let outcome = converter.convert(&ConvertJob {
//!     input: "notes.md".into(),
//!     output: "notes.pdf".into(),
//!     style: "academic".to_string(),
//!     theme: "sepia".to_string(),
//!     format: OutputFormat::Pdf,
//! })?;
//! println!("{} bytes", outcome.bytes);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod app;
pub mod assets;
pub mod batch;
pub mod builtin;
pub mod config;
pub mod convert;
pub mod document;
mod error;
pub mod header;
pub mod markdown;
pub mod render;
pub mod word;

pub use app::run_cli;
pub use batch::{collect_inputs, BatchOptions, BatchReport, BatchRunner, BatchSummary, FileResult};
pub use builtin::{builtin_registry, builtin_store, LibraryStore};
pub use config::{Config, Override, OverrideSet};
pub use convert::{
    default_output_path, ConvertJob, ConvertOptions, ConvertOutcome, Converter, OutputFormat,
};
pub use document::{HtmlDocument, PageOptions};
pub use error::{exit, ConfigError, ConvertError, RenderError};
pub use header::Header;
pub use markdown::{CmarkParser, Extensions, MarkdownParser};
pub use render::{CommandRenderer, HtmlRenderer, RenderRequest, Renderer};
pub use word::{PandocExporter, WordExporter, WordRequest};
