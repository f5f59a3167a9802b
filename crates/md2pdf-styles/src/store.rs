//! Stylesheet sources.
//!
//! A [`StylesheetStore`] lists the style and theme files available to a
//! discovery pass and reads their contents. Two implementations ship:
//!
//! | Store | Backing | Used for |
//! |-------|---------|----------|
//! | [`DirStore`] | two directories on disk | user and project stylesheets |
//! | [`MemoryStore`] | `(file name, content)` pairs | built-in defaults, tests |
//!
//! # Directory Layout
//!
//! ```text
//! styles/
//! ├── technical.css
//! ├── story.css
//! └── _shared.css      (partial, skipped)
//! themes/
//! ├── default.css
//! └── dark.css
//! ```
//!
//! Only `*.css` files directly inside each directory are listed. Files whose
//! stem starts with `_` are partials and never become descriptors. Listings
//! are sorted by file name, so "first encountered" means the same thing on
//! every platform.
//!
//! # Missing vs. Empty
//!
//! A directory that does not exist is a [`StoreError::NotFound`]. An empty
//! directory is fine and yields no files.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::descriptor::SheetKind;
use crate::error::StoreError;

/// Recognized stylesheet extension.
pub const STYLESHEET_EXTENSION: &str = ".css";

/// A stylesheet file found by a store, not yet read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetFile {
    /// Style or theme.
    pub kind: SheetKind,
    /// File stem, original casing (e.g. `"Oceanic"` for `Oceanic.css`).
    pub stem: String,
    /// Location of the file. Virtual for in-memory stores.
    pub path: PathBuf,
    /// Last modification time, if the store knows it.
    pub modified: Option<SystemTime>,
}

/// Source of style and theme definition files.
pub trait StylesheetStore: Send + Sync {
    /// Lists style files in discovery order.
    fn list_style_files(&self) -> Result<Vec<SheetFile>, StoreError>;

    /// Lists theme files in discovery order.
    fn list_theme_files(&self) -> Result<Vec<SheetFile>, StoreError>;

    /// Reads the full text of a listed file.
    fn read(&self, file: &SheetFile) -> Result<String, StoreError>;

    /// Lists files of the given kind.
    fn list(&self, kind: SheetKind) -> Result<Vec<SheetFile>, StoreError> {
        match kind {
            SheetKind::Style => self.list_style_files(),
            SheetKind::Theme => self.list_theme_files(),
        }
    }
}

/// Returns the stem if `file_name` is a non-partial stylesheet.
fn stylesheet_stem(file_name: &str) -> Option<&str> {
    let stem = file_name.strip_suffix(STYLESHEET_EXTENSION)?;
    if stem.is_empty() || stem.starts_with('_') || stem.starts_with('.') {
        return None;
    }
    Some(stem)
}

// =============================================================================
// DirStore
// =============================================================================

/// Filesystem-backed store: one directory for styles, one for themes.
#[derive(Debug, Clone)]
pub struct DirStore {
    styles_dir: PathBuf,
    themes_dir: PathBuf,
}

impl DirStore {
    /// Creates a store over the two directories.
    ///
    /// The directories are not checked here; a missing directory surfaces
    /// as [`StoreError::NotFound`] when it is listed.
    pub fn new(styles_dir: impl Into<PathBuf>, themes_dir: impl Into<PathBuf>) -> Self {
        Self {
            styles_dir: styles_dir.into(),
            themes_dir: themes_dir.into(),
        }
    }

    pub fn styles_dir(&self) -> &Path {
        &self.styles_dir
    }

    pub fn themes_dir(&self) -> &Path {
        &self.themes_dir
    }

    fn list_dir(&self, kind: SheetKind) -> Result<Vec<SheetFile>, StoreError> {
        let dir = match kind {
            SheetKind::Style => &self.styles_dir,
            SheetKind::Theme => &self.themes_dir,
        };

        if !dir.is_dir() {
            return Err(StoreError::NotFound {
                kind,
                path: dir.clone(),
            });
        }

        let entries = std::fs::read_dir(dir).map_err(|source| StoreError::Unreadable {
            kind,
            path: dir.clone(),
            source,
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Unreadable {
                kind,
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(stem) = file_name.to_str().and_then(stylesheet_stem) else {
                continue;
            };
            let modified = entry.metadata().and_then(|m| m.modified()).ok();
            files.push(SheetFile {
                kind,
                stem: stem.to_string(),
                path,
                modified,
            });
        }

        files.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
        Ok(files)
    }
}

impl StylesheetStore for DirStore {
    fn list_style_files(&self) -> Result<Vec<SheetFile>, StoreError> {
        self.list_dir(SheetKind::Style)
    }

    fn list_theme_files(&self) -> Result<Vec<SheetFile>, StoreError> {
        self.list_dir(SheetKind::Theme)
    }

    fn read(&self, file: &SheetFile) -> Result<String, StoreError> {
        std::fs::read_to_string(&file.path).map_err(|e| StoreError::Read {
            path: file.path.clone(),
            message: e.to_string(),
        })
    }
}

// =============================================================================
// MemoryStore
// =============================================================================

/// In-memory store for embedded stylesheets.
///
/// Entries are `(file name, content)` pairs such as `("dark.css", "...")`.
/// Listing order is the same sorted-by-file-name order [`DirStore`] uses.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    styles: Vec<(String, String)>,
    themes: Vec<(String, String)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from static embedded entries.
    pub fn from_entries(styles: &[(&str, &str)], themes: &[(&str, &str)]) -> Self {
        let mut store = Self::new();
        for (name, content) in styles {
            store.add_style(*name, *content);
        }
        for (name, content) in themes {
            store.add_theme(*name, *content);
        }
        store
    }

    pub fn add_style(&mut self, file_name: impl Into<String>, content: impl Into<String>) {
        self.styles.push((file_name.into(), content.into()));
    }

    pub fn add_theme(&mut self, file_name: impl Into<String>, content: impl Into<String>) {
        self.themes.push((file_name.into(), content.into()));
    }

    pub fn with_style(mut self, file_name: &str, content: &str) -> Self {
        self.add_style(file_name, content);
        self
    }

    pub fn with_theme(mut self, file_name: &str, content: &str) -> Self {
        self.add_theme(file_name, content);
        self
    }

    fn entries(&self, kind: SheetKind) -> &[(String, String)] {
        match kind {
            SheetKind::Style => &self.styles,
            SheetKind::Theme => &self.themes,
        }
    }

    fn list_entries(&self, kind: SheetKind) -> Vec<SheetFile> {
        let root = match kind {
            SheetKind::Style => "builtin/styles",
            SheetKind::Theme => "builtin/themes",
        };
        let mut files: Vec<SheetFile> = self
            .entries(kind)
            .iter()
            .filter_map(|(file_name, _)| {
                stylesheet_stem(file_name).map(|stem| SheetFile {
                    kind,
                    stem: stem.to_string(),
                    path: Path::new(root).join(file_name),
                    modified: None,
                })
            })
            .collect();
        files.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
        files
    }
}

impl StylesheetStore for MemoryStore {
    fn list_style_files(&self) -> Result<Vec<SheetFile>, StoreError> {
        Ok(self.list_entries(SheetKind::Style))
    }

    fn list_theme_files(&self) -> Result<Vec<SheetFile>, StoreError> {
        Ok(self.list_entries(SheetKind::Theme))
    }

    fn read(&self, file: &SheetFile) -> Result<String, StoreError> {
        let file_name = file
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        self.entries(file.kind)
            .iter()
            .find(|(name, _)| name == file_name)
            .map(|(_, content)| content.clone())
            .ok_or_else(|| StoreError::Read {
                path: file.path.clone(),
                message: "no such embedded stylesheet".to_string(),
            })
    }
}
