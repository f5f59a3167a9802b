//! Single-file conversion.
//!
//! [`Converter::convert`] runs one file through the whole pipeline:
//!
//! 1. read the Markdown source
//! 2. resolve and check the style/theme pair against the current registry
//! 3. render the body (and the header block, if configured)
//! 4. merge base, style, theme, custom and print CSS
//! 5. look the fingerprint up in the cache for the output format, rendering
//!    only on a miss
//! 6. write the artifact
//!
//! Word output skips steps 3 and 4; the Markdown goes straight to the
//! exporter.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use md2pdf_styles::{
    Artifact, ContentHash, ConversionCache, CssSource, Descriptor, Fingerprint, Merger, RegistryHandle,
    Validator, Verdict,
};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::assets::font_face_css;
use crate::builtin::BASE_CSS;
use crate::config::{Config, DEFAULT_RENDERER};
use crate::document::{print_layer, HtmlDocument, PageOptions};
use crate::error::{ConvertError, RenderError};
use crate::header::{today, Header, HEADER_CSS};
use crate::markdown::{CmarkParser, Extensions, MarkdownParser};
use crate::render::{CommandRenderer, HtmlRenderer, RenderRequest, Renderer};
use crate::word::{reference_doc_for, PandocExporter, WordExporter, WordRequest};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pdf,
    Word,
    Html,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 3] = [OutputFormat::Pdf, OutputFormat::Word, OutputFormat::Html];

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Word => "word",
            OutputFormat::Html => "html",
        }
    }

    /// File extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Word => "docx",
            OutputFormat::Html => "html",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings shared by every conversion a [`Converter`] runs.
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    pub custom_css: Option<CssSource>,
    pub print_css: Option<CssSource>,
    pub header_dir: Option<PathBuf>,
    pub assets_dir: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub page: PageOptions,
    pub strict: bool,
    pub extensions: Extensions,
    /// Word reference documents by style name.
    pub reference_docs: BTreeMap<String, PathBuf>,
}

impl ConvertOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            custom_css: config.custom_css.clone().map(CssSource::File),
            print_css: config.print_css.clone().map(CssSource::File),
            header_dir: config.header_dir.clone(),
            assets_dir: config.assets_dir.clone(),
            cache_dir: config.cache_dir.clone(),
            page: config.page.clone(),
            strict: config.strict,
            extensions: Extensions::default(),
            reference_docs: config.word.reference_docs.clone(),
        }
    }
}

/// One file to convert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub style: String,
    pub theme: String,
    pub format: OutputFormat,
}

/// What a successful conversion did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConvertOutcome {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Resolved registry names.
    pub style: String,
    pub theme: String,
    pub format: OutputFormat,
    pub bytes: usize,
    /// Served from the cache without rendering.
    pub cached: bool,
    /// Reason, if the pairing is discouraged.
    pub discouraged: Option<String>,
}

/// Runs conversions. Shareable across threads.
pub struct Converter {
    registry: RegistryHandle,
    validator: Validator,
    merger: Merger,
    renderer: Arc<dyn Renderer>,
    word: Arc<dyn WordExporter>,
    parser: Arc<dyn MarkdownParser>,
    caches: HashMap<OutputFormat, ConversionCache>,
    options: ConvertOptions,
    date: String,
    header: OnceCell<Option<Header>>,
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("renderer", &self.renderer.name())
            .field("validator", &self.validator)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Converter {
    /// A converter with the default collaborators: `weasyprint` for PDF,
    /// `pandoc` for Word, `pulldown-cmark` for Markdown.
    ///
    /// # Errors
    ///
    /// Fails only if a cache directory is configured and cannot be created.
    pub fn new(registry: RegistryHandle, options: ConvertOptions) -> Result<Self, ConvertError> {
        let mut base = BASE_CSS.to_string();
        if let Some(assets) = &options.assets_dir {
            let faces = font_face_css(assets);
            if !faces.is_empty() {
                base.push('\n');
                base.push_str(&faces);
            }
        }

        let mut caches = HashMap::new();
        for format in OutputFormat::ALL {
            let cache = match &options.cache_dir {
                Some(dir) => ConversionCache::with_dir(dir.join(format.as_str())).map_err(
                    |source| ConvertError::Output {
                        path: dir.clone(),
                        source,
                    },
                )?,
                None => ConversionCache::new(),
            };
            caches.insert(format, cache);
        }

        Ok(Self {
            registry,
            validator: Validator::default(),
            merger: Merger::new().with_base(base),
            renderer: Arc::new(CommandRenderer::new(DEFAULT_RENDERER)),
            word: Arc::new(PandocExporter::default()),
            parser: Arc::new(CmarkParser),
            caches,
            options,
            date: today(),
            header: OnceCell::new(),
        })
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_renderer(mut self, renderer: impl Renderer + 'static) -> Self {
        self.renderer = Arc::new(renderer);
        self
    }

    pub fn with_word_exporter(mut self, exporter: impl WordExporter + 'static) -> Self {
        self.word = Arc::new(exporter);
        self
    }

    pub fn with_parser(mut self, parser: impl MarkdownParser + 'static) -> Self {
        self.parser = Arc::new(parser);
        self
    }

    /// Fixes the date used for `#date#` in header text.
    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = date.into();
        self
    }

    pub fn registry(&self) -> &RegistryHandle {
        &self.registry
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    pub fn cache(&self, format: OutputFormat) -> Option<&ConversionCache> {
        self.caches.get(&format)
    }

    /// Empties every in-memory cache.
    pub fn clear_caches(&self) {
        for cache in self.caches.values() {
            cache.clear();
        }
    }

    /// Converts one file and writes the result to `job.output`.
    pub fn convert(&self, job: &ConvertJob) -> Result<ConvertOutcome, ConvertError> {
        let markdown = fs::read_to_string(&job.input).map_err(|source| ConvertError::Input {
            path: job.input.clone(),
            source,
        })?;

        let registry = self.registry.snapshot();
        let validation = if self.options.strict {
            self.validator
                .validate_strict(&registry, &job.style, &job.theme)?
        } else {
            self.validator.validate(&registry, &job.style, &job.theme)?
        };
        let discouraged = match validation.verdict {
            Verdict::Valid => None,
            Verdict::Discouraged(reason) => Some(reason),
        };
        let (style, theme) = (validation.style, validation.theme);

        let title = file_stem(&job.input);
        let (artifact, cached) = match job.format {
            OutputFormat::Word => self.export_word(&markdown, style, theme, &title)?,
            format => self.render_document(&markdown, style, theme, &title, format)?,
        };

        write_output(&job.output, artifact.bytes())?;
        log::info!(
            "{} -> {} ({}, {} bytes{})",
            job.input.display(),
            job.output.display(),
            job.format,
            artifact.len(),
            if cached { ", cached" } else { "" }
        );

        Ok(ConvertOutcome {
            input: job.input.clone(),
            output: job.output.clone(),
            style: style.name.clone(),
            theme: theme.name.clone(),
            format: job.format,
            bytes: artifact.len(),
            cached,
            discouraged,
        })
    }

    /// Builds the HTML document for a Markdown source.
    pub fn build_document(
        &self,
        markdown: &str,
        style: &Descriptor,
        theme: &Descriptor,
        title: &str,
    ) -> Result<(HtmlDocument, Fingerprint), ConvertError> {
        let body = self.parser.to_html(markdown, &self.options.extensions);
        let header_html = self.header().map(Header::to_html);

        let user_print = match &self.options.print_css {
            Some(source) => source.load()?,
            None => String::new(),
        };
        let header_css = if header_html.is_some() { HEADER_CSS } else { "" };
        let print = CssSource::Inline(print_layer(
            &self.options.page,
            &[header_css, user_print.as_str()],
        ));

        let merged = self.merger.merge(
            style,
            theme,
            self.options.custom_css.as_ref(),
            Some(&print),
        )?;

        let source_hash = ContentHash::of_parts([
            body.as_bytes(),
            header_html.as_deref().unwrap_or_default().as_bytes(),
            title.as_bytes(),
        ]);
        let fingerprint = Fingerprint::new(source_hash, &style.name, &theme.name, merged.hash());

        let document =
            HtmlDocument::assemble(title, merged.text(), header_html.as_deref(), &body);
        Ok((document, fingerprint))
    }

    fn render_document(
        &self,
        markdown: &str,
        style: &Descriptor,
        theme: &Descriptor,
        title: &str,
        format: OutputFormat,
    ) -> Result<(Arc<Artifact>, bool), ConvertError> {
        let (document, fingerprint) = self.build_document(markdown, style, theme, title)?;
        let renderer: &dyn Renderer = match format {
            OutputFormat::Html => &HtmlRenderer,
            _ => self.renderer.as_ref(),
        };
        let request = RenderRequest {
            document: &document,
            page: &self.options.page,
            title,
        };
        self.cached(format, &fingerprint, || renderer.render(&request))
    }

    fn export_word(
        &self,
        markdown: &str,
        style: &Descriptor,
        theme: &Descriptor,
        title: &str,
    ) -> Result<(Arc<Artifact>, bool), ConvertError> {
        let reference_doc = reference_doc_for(&self.options.reference_docs, &style.name);
        let reference = reference_doc
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        let source_hash = ContentHash::of_parts([markdown.as_bytes(), reference.as_bytes()]);
        // No stylesheet takes part in Word output.
        let fingerprint =
            Fingerprint::new(source_hash, &style.name, &theme.name, ContentHash::of(b""));

        let request = WordRequest {
            markdown,
            style: &style.name,
            reference_doc,
            title,
        };
        self.cached(OutputFormat::Word, &fingerprint, || self.word.export(&request))
    }

    fn cached<F>(
        &self,
        format: OutputFormat,
        fingerprint: &Fingerprint,
        produce: F,
    ) -> Result<(Arc<Artifact>, bool), ConvertError>
    where
        F: FnOnce() -> Result<Vec<u8>, RenderError>,
    {
        let mut rendered = false;
        let compute = || {
            rendered = true;
            produce()
        };
        let artifact = match self.caches.get(&format) {
            Some(cache) => cache.get_or_compute(fingerprint, compute)?,
            None => Arc::new(Artifact::new(compute()?)),
        };
        Ok((artifact, !rendered))
    }

    fn header(&self) -> Option<&Header> {
        self.header
            .get_or_init(|| {
                let dir = self.options.header_dir.as_ref()?;
                Header::load(dir, self.parser.as_ref(), &self.date)
            })
            .as_ref()
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<(), ConvertError> {
    let result = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => fs::create_dir_all(parent).and_then(|()| fs::write(path, bytes)),
        None => fs::write(path, bytes),
    };
    result.map_err(|source| ConvertError::Output {
        path: path.to_path_buf(),
        source,
    })
}

/// Default output path for a single conversion: next to the input, with the
/// format's extension, or inside `output_dir` if given.
pub fn default_output_path(input: &Path, output_dir: Option<&Path>, format: OutputFormat) -> PathBuf {
    let file_name = format!("{}.{}", file_stem(input), format.extension());
    match output_dir {
        Some(dir) => dir.join(file_name),
        None => input.with_file_name(file_name),
    }
}
