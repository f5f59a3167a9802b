//! Word (`.docx`) export.
//!
//! Word output skips the CSS pipeline entirely: styling comes from an
//! optional per-style reference document instead.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::RenderError;
use crate::render::run_piped;

#[derive(Debug, Clone, Copy)]
pub struct WordRequest<'a> {
    pub markdown: &'a str,
    pub style: &'a str,
    /// Reference document supplying Word styles, if any.
    pub reference_doc: Option<&'a Path>,
    pub title: &'a str,
}

pub trait WordExporter: Send + Sync {
    fn export(&self, request: &WordRequest<'_>) -> Result<Vec<u8>, RenderError>;
}

/// Exports through `pandoc`, Markdown on stdin and `.docx` on stdout.
#[derive(Debug, Clone)]
pub struct PandocExporter {
    program: String,
    timeout: Option<Duration>,
}

impl Default for PandocExporter {
    fn default() -> Self {
        Self::new("pandoc")
    }
}

impl PandocExporter {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The full shell command for a request.
    pub fn command_line(&self, reference_doc: Option<&Path>) -> String {
        let mut cmd = format!("{} --from markdown --to docx --output -", self.program);
        if let Some(path) = reference_doc {
            cmd.push_str(" --reference-doc=");
            cmd.push_str(&shell_quote(&path.to_string_lossy()));
        }
        cmd
    }
}

impl WordExporter for PandocExporter {
    fn export(&self, request: &WordRequest<'_>) -> Result<Vec<u8>, RenderError> {
        let command = self.command_line(request.reference_doc);
        log::info!("exporting {} to Word with `{}`", request.title, command);
        let output = run_piped(&command, request.markdown.as_bytes().to_vec(), self.timeout)?;
        if output.is_empty() {
            return Err(RenderError::EmptyOutput { command });
        }
        Ok(output)
    }
}

/// Reference document configured for `style`, if it exists on disk.
pub fn reference_doc_for<'a>(
    docs: &'a BTreeMap<String, PathBuf>,
    style: &str,
) -> Option<&'a Path> {
    let path = docs.get(style)?;
    if path.is_file() {
        Some(path.as_path())
    } else {
        log::warn!(
            "reference document for style '{}' not found: {}",
            style,
            path.display()
        );
        None
    }
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line() {
        let exporter = PandocExporter::default();
        assert_eq!(
            exporter.command_line(None),
            "pandoc --from markdown --to docx --output -"
        );
        assert_eq!(
            exporter.command_line(Some(Path::new("/refs/it's.docx"))),
            "pandoc --from markdown --to docx --output - --reference-doc='/refs/it'\\''s.docx'"
        );
    }

    #[test]
    fn test_reference_doc_must_exist() {
        let dir = tempfile::TempDir::new().unwrap();
        let existing = dir.path().join("academic.docx");
        std::fs::write(&existing, b"PK").unwrap();

        let mut docs = BTreeMap::new();
        docs.insert("academic".to_string(), existing.clone());
        docs.insert("modern".to_string(), dir.path().join("missing.docx"));

        assert_eq!(reference_doc_for(&docs, "academic"), Some(existing.as_path()));
        assert_eq!(reference_doc_for(&docs, "modern"), None);
        assert_eq!(reference_doc_for(&docs, "story"), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_export_through_fake_program() {
        // A shell function that ignores its arguments stands in for pandoc.
        let exporter = PandocExporter::new("f() { cat; }; f");
        let out = exporter
            .export(&WordRequest {
                markdown: "# Title\n",
                style: "technical",
                reference_doc: None,
                title: "doc",
            })
            .unwrap();
        assert_eq!(out, b"# Title\n");
    }
}
