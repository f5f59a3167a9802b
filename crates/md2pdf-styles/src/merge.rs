//! Stylesheet layering.
//!
//! The final stylesheet for a conversion is built by appending fragments in
//! a fixed order:
//!
//! | Order | Layer | Source |
//! |-------|-------|--------|
//! | 1 | [`Layer::Base`] | reset and print defaults from the packaging layer |
//! | 2 | [`Layer::Style`] | the style descriptor |
//! | 3 | [`Layer::Theme`] | the theme descriptor |
//! | 4 | [`Layer::Custom`] | user CSS, inline or from a file |
//! | 5 | [`Layer::Print`] | print-media fragment (page geometry, header) |
//!
//! Composition is textual. Nothing here parses selectors or resolves
//! specificity; a theme overrides a style's `--theme-bg` simply because its
//! declaration comes later in the text and CSS keeps the last one. That only
//! works as long as the order above never changes, so the order is part of
//! the contract.
//!
//! Each fragment is preceded by a one-line marker comment, and the result
//! records the byte span of every fragment. User CSS is passed through
//! untouched: an `@import` of a remote resource is neither fetched nor
//! checked here.

use std::fmt;
use std::ops::Range;
use std::path::PathBuf;

use crate::descriptor::{Descriptor, SheetKind};
use crate::error::MergeError;
use crate::hash::ContentHash;
use crate::metadata::variable_declarations;

/// A position in the layering order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Layer {
    Base,
    Style,
    Theme,
    Custom,
    Print,
}

impl Layer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Base => "base",
            Layer::Style => "style",
            Layer::Theme => "theme",
            Layer::Custom => "custom",
            Layer::Print => "print",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CSS supplied by the caller rather than the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CssSource {
    /// CSS text held in memory.
    Inline(String),
    /// A file read at merge time.
    File(PathBuf),
}

impl CssSource {
    /// Short description for marker comments and logs.
    pub fn label(&self) -> String {
        match self {
            CssSource::Inline(_) => "inline".to_string(),
            CssSource::File(path) => path.display().to_string(),
        }
    }

    /// The CSS text, reading the file if needed.
    pub fn load(&self) -> Result<String, MergeError> {
        match self {
            CssSource::Inline(text) => Ok(text.clone()),
            CssSource::File(path) => {
                std::fs::read_to_string(path).map_err(|source| MergeError::Io {
                    path: path.clone(),
                    source,
                })
            }
        }
    }
}

/// Where one fragment landed in the merged text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentSpan {
    pub layer: Layer,
    pub label: String,
    /// Byte range of the fragment's own text (marker comment excluded).
    pub range: Range<usize>,
}

/// The composed stylesheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedStylesheet {
    text: String,
    spans: Vec<FragmentSpan>,
    hash: ContentHash,
}

impl MergedStylesheet {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn hash(&self) -> ContentHash {
        self.hash
    }

    /// Fragment spans in layer order.
    pub fn spans(&self) -> &[FragmentSpan] {
        &self.spans
    }

    /// Span of the given layer, if that layer contributed anything.
    pub fn span(&self, layer: Layer) -> Option<&FragmentSpan> {
        self.spans.iter().find(|span| span.layer == layer)
    }

    /// Text of the given layer.
    pub fn fragment(&self, layer: Layer) -> Option<&str> {
        self.span(layer).map(|span| &self.text[span.range.clone()])
    }

    /// Custom properties as the cascade would see them: later layers win.
    ///
    /// Only top-level rules are considered, same as descriptor metadata.
    /// Within one fragment the last declaration wins too.
    pub fn effective_variables(&self) -> Vec<(String, String, Layer)> {
        let mut resolved: Vec<(String, String, Layer)> = Vec::new();
        for span in &self.spans {
            let fragment = &self.text[span.range.clone()];
            for (name, value) in variable_declarations(fragment) {
                match resolved.iter_mut().find(|(n, _, _)| *n == name) {
                    Some(entry) => {
                        entry.1 = value;
                        entry.2 = span.layer;
                    }
                    None => resolved.push((name, value, span.layer)),
                }
            }
        }
        resolved
    }
}

/// Composes stylesheets in the fixed layer order.
#[derive(Debug, Clone, Default)]
pub struct Merger {
    base: Option<String>,
}

impl Merger {
    /// A merger with no base layer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base fragment (reset, print defaults, local font faces).
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }

    /// Builds the merged stylesheet.
    ///
    /// # Errors
    ///
    /// - [`MergeError::KindMismatch`] if `style` is not a style or `theme`
    ///   is not a theme
    /// - [`MergeError::Io`] if a file-backed fragment cannot be read
    pub fn merge(
        &self,
        style: &Descriptor,
        theme: &Descriptor,
        custom: Option<&CssSource>,
        print: Option<&CssSource>,
    ) -> Result<MergedStylesheet, MergeError> {
        expect_kind(style, SheetKind::Style)?;
        expect_kind(theme, SheetKind::Theme)?;

        let mut builder = Builder::default();
        if let Some(base) = &self.base {
            builder.push(Layer::Base, "defaults", base);
        }
        builder.push(Layer::Style, &style.name, &style.raw_content);
        builder.push(Layer::Theme, &theme.name, &theme.raw_content);
        if let Some(source) = custom {
            builder.push(Layer::Custom, &source.label(), &source.load()?);
        }
        if let Some(source) = print {
            builder.push(Layer::Print, &source.label(), &source.load()?);
        }

        Ok(builder.finish())
    }
}

/// Merges with no base layer.
pub fn merge(
    style: &Descriptor,
    theme: &Descriptor,
    custom: Option<&CssSource>,
    print: Option<&CssSource>,
) -> Result<MergedStylesheet, MergeError> {
    Merger::new().merge(style, theme, custom, print)
}

fn expect_kind(descriptor: &Descriptor, expected: SheetKind) -> Result<(), MergeError> {
    if descriptor.kind == expected {
        Ok(())
    } else {
        Err(MergeError::KindMismatch {
            name: descriptor.name.clone(),
            expected,
            found: descriptor.kind,
        })
    }
}

#[derive(Default)]
struct Builder {
    text: String,
    spans: Vec<FragmentSpan>,
}

impl Builder {
    fn push(&mut self, layer: Layer, label: &str, fragment: &str) {
        if !self.text.is_empty() {
            self.text.push('\n');
        }
        // Labels come from names and paths; keep them from closing the comment.
        let label = label.replace("*/", "* /");
        self.text
            .push_str(&format!("/* md2pdf:{} {} */\n", layer, label));

        let start = self.text.len();
        self.text.push_str(fragment);
        let end = self.text.len();
        if !fragment.ends_with('\n') {
            self.text.push('\n');
        }

        self.spans.push(FragmentSpan {
            layer,
            label,
            range: start..end,
        });
    }

    fn finish(self) -> MergedStylesheet {
        let hash = ContentHash::of(self.text.as_bytes());
        MergedStylesheet {
            text: self.text,
            spans: self.spans,
            hash,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::discover;
    use crate::store::MemoryStore;
    use std::io::Write;

    fn registry() -> crate::Registry {
        let store = MemoryStore::new()
            .with_style(
                "technical.css",
                ":root { --theme-bg: white; --font-body: serif; }\nbody { margin: 0; }",
            )
            .with_theme("dark.css", ":root { --theme-bg: black; }");
        discover(&store).unwrap()
    }

    #[test]
    fn test_layer_order() {
        let registry = registry();
        let style = registry.style("technical").unwrap();
        let theme = registry.theme("dark").unwrap();
        let custom = CssSource::Inline("h1 { color: red; }".to_string());
        let print = CssSource::Inline("@page { size: A4; }".to_string());

        let merged = Merger::new()
            .with_base("html { box-sizing: border-box; }")
            .merge(style, theme, Some(&custom), Some(&print))
            .unwrap();

        let layers: Vec<Layer> = merged.spans().iter().map(|s| s.layer).collect();
        assert_eq!(
            layers,
            vec![
                Layer::Base,
                Layer::Style,
                Layer::Theme,
                Layer::Custom,
                Layer::Print
            ]
        );
        let ranges: Vec<_> = merged.spans().iter().map(|s| s.range.clone()).collect();
        for pair in ranges.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
        assert_eq!(merged.fragment(Layer::Custom), Some("h1 { color: red; }"));
    }

    #[test]
    fn test_optional_layers_absent() {
        let registry = registry();
        let merged = merge(
            registry.style("technical").unwrap(),
            registry.theme("dark").unwrap(),
            None,
            None,
        )
        .unwrap();
        assert!(merged.span(Layer::Base).is_none());
        assert!(merged.span(Layer::Custom).is_none());
        assert!(merged.span(Layer::Print).is_none());
        assert!(merged.text().starts_with("/* md2pdf:style technical */\n"));
    }

    #[test]
    fn test_hash_is_deterministic() {
        let registry = registry();
        let style = registry.style("technical").unwrap();
        let theme = registry.theme("dark").unwrap();
        let a = merge(style, theme, None, None).unwrap();
        let b = merge(style, theme, None, None).unwrap();
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a, b);

        let custom = CssSource::Inline("p {}".to_string());
        let c = merge(style, theme, Some(&custom), None).unwrap();
        assert_ne!(a.hash(), c.hash());
    }

    #[test]
    fn test_kind_mismatch() {
        let registry = registry();
        let style = registry.style("technical").unwrap();
        let theme = registry.theme("dark").unwrap();
        let err = merge(theme, style, None, None).unwrap_err();
        assert!(matches!(
            err,
            MergeError::KindMismatch {
                expected: SheetKind::Style,
                found: SheetKind::Theme,
                ..
            }
        ));
    }

    #[test]
    fn test_custom_css_from_file() {
        let registry = registry();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"@import url(https://example.com/x.css);\nh2 {}")
            .unwrap();

        let custom = CssSource::File(file.path().to_path_buf());
        let merged = merge(
            registry.style("technical").unwrap(),
            registry.theme("dark").unwrap(),
            Some(&custom),
            None,
        )
        .unwrap();
        assert!(merged
            .fragment(Layer::Custom)
            .unwrap()
            .starts_with("@import url(https://example.com/x.css);"));
    }

    #[test]
    fn test_missing_custom_file_is_merge_error() {
        let registry = registry();
        let custom = CssSource::File(PathBuf::from("/nonexistent/custom.css"));
        let err = merge(
            registry.style("technical").unwrap(),
            registry.theme("dark").unwrap(),
            Some(&custom),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, MergeError::Io { .. }));
    }

    #[test]
    fn test_effective_variables_later_layer_wins() {
        let registry = registry();
        let custom = CssSource::Inline(":root { --font-body: sans-serif; }".to_string());
        let merged = merge(
            registry.style("technical").unwrap(),
            registry.theme("dark").unwrap(),
            Some(&custom),
            None,
        )
        .unwrap();

        let vars = merged.effective_variables();
        let bg = vars.iter().find(|(n, _, _)| n == "--theme-bg").unwrap();
        assert_eq!(bg.1, "black");
        assert_eq!(bg.2, Layer::Theme);
        let font = vars.iter().find(|(n, _, _)| n == "--font-body").unwrap();
        assert_eq!(font.1, "sans-serif");
        assert_eq!(font.2, Layer::Custom);
    }
}
