//! Stylesheets compiled into the binary.
//!
//! Used whenever no style or theme directory is configured, or the
//! configured one holds nothing of its kind, so a fresh install can convert
//! out of the box. A configured directory that does not exist is still an
//! error.

use std::path::{Path, PathBuf};

use md2pdf_styles::{
    discover, DirStore, MemoryStore, Registry, SheetFile, SheetKind, StoreError, StylesheetStore,
};

/// Reset and print defaults placed before every style.
pub const BASE_CSS: &str = include_str!("../assets/base.css");

pub const STYLES: &[(&str, &str)] = &[
    ("academic.css", include_str!("../assets/styles/academic.css")),
    ("modern.css", include_str!("../assets/styles/modern.css")),
    ("story.css", include_str!("../assets/styles/story.css")),
    ("technical.css", include_str!("../assets/styles/technical.css")),
];

pub const THEMES: &[(&str, &str)] = &[
    ("dark.css", include_str!("../assets/themes/dark.css")),
    ("default.css", include_str!("../assets/themes/default.css")),
    ("oceanic.css", include_str!("../assets/themes/oceanic.css")),
    ("sepia.css", include_str!("../assets/themes/sepia.css")),
];

/// The built-in stylesheets as a store.
pub fn builtin_store() -> MemoryStore {
    MemoryStore::from_entries(STYLES, THEMES)
}

/// Registry over the built-in stylesheets.
pub fn builtin_registry() -> Result<Registry, StoreError> {
    discover(&builtin_store())
}

/// Configured directories, with the built-in sheets standing in for any
/// kind that has no directory.
#[derive(Debug, Clone)]
pub struct LibraryStore {
    dirs: DirStore,
    styles_configured: bool,
    themes_configured: bool,
    builtin: MemoryStore,
}

impl LibraryStore {
    pub fn new(styles_dir: Option<&Path>, themes_dir: Option<&Path>) -> Self {
        Self {
            dirs: DirStore::new(
                styles_dir.map(Path::to_path_buf).unwrap_or_default(),
                themes_dir.map(Path::to_path_buf).unwrap_or_default(),
            ),
            styles_configured: styles_dir.is_some(),
            themes_configured: themes_dir.is_some(),
            builtin: builtin_store(),
        }
    }

    fn configured(&self, kind: SheetKind) -> bool {
        match kind {
            SheetKind::Style => self.styles_configured,
            SheetKind::Theme => self.themes_configured,
        }
    }

    /// Directory scanned for `kind`, if one is configured.
    pub fn dir(&self, kind: SheetKind) -> Option<PathBuf> {
        if !self.configured(kind) {
            return None;
        }
        Some(match kind {
            SheetKind::Style => self.dirs.styles_dir().to_path_buf(),
            SheetKind::Theme => self.dirs.themes_dir().to_path_buf(),
        })
    }

    /// Discovers a registry, filling empty kinds from the built-in sheets.
    pub fn load(&self) -> Result<Registry, StoreError> {
        Ok(discover(self)?.or_defaults(&builtin_registry()?))
    }
}

impl StylesheetStore for LibraryStore {
    fn list_style_files(&self) -> Result<Vec<SheetFile>, StoreError> {
        if self.styles_configured {
            self.dirs.list_style_files()
        } else {
            self.builtin.list_style_files()
        }
    }

    fn list_theme_files(&self) -> Result<Vec<SheetFile>, StoreError> {
        if self.themes_configured {
            self.dirs.list_theme_files()
        } else {
            self.builtin.list_theme_files()
        }
    }

    fn read(&self, file: &SheetFile) -> Result<String, StoreError> {
        if self.configured(file.kind) {
            self.dirs.read(file)
        } else {
            self.builtin.read(file)
        }
    }
}
