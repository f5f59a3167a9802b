//! In-memory descriptors for discovered stylesheets.
//!
//! Styles and themes share one descriptor shape and one parser, but they are
//! never interchangeable: every [`Descriptor`] is tagged with its
//! [`SheetKind`], the registry keeps the two kinds in separate mappings, and
//! the merge engine rejects a descriptor of the wrong kind.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use serde::Serialize;

use crate::hash::ContentHash;

/// Which registry mapping a stylesheet belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetKind {
    /// Typography and layout.
    Style,
    /// Color palette, applied on top of a style.
    Theme,
}

impl SheetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SheetKind::Style => "style",
            SheetKind::Theme => "theme",
        }
    }
}

impl fmt::Display for SheetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discovered style or theme file.
///
/// `raw_content` is a snapshot taken at discovery time. Editing the file
/// afterwards has no effect until the next discovery pass.
#[derive(Debug, Clone, Serialize)]
pub struct Descriptor {
    /// Style or theme.
    pub kind: SheetKind,
    /// Normalized registry key (lowercase, `-` separated).
    pub name: String,
    /// File stem exactly as found on disk, original casing preserved.
    pub stem: String,
    /// Human label from the header comment, or derived from the stem.
    pub display_name: String,
    /// Free text from the header comment; may be empty.
    pub description: String,
    /// Backing file.
    pub source_path: PathBuf,
    /// Modification time reported by the store, if any.
    #[serde(skip)]
    pub modified: Option<SystemTime>,
    /// Full file text.
    #[serde(skip)]
    pub raw_content: Arc<str>,
    /// Custom properties declared in top-level rules, first value wins.
    ///
    /// Advisory only; merging never consults it.
    pub declared_variables: Vec<(String, String)>,
}

impl Descriptor {
    /// Hash of the raw content.
    pub fn content_hash(&self) -> ContentHash {
        ContentHash::of(self.raw_content.as_bytes())
    }

    /// Looks up a declared variable by token (with or without the `--` prefix).
    pub fn variable(&self, token: &str) -> Option<&str> {
        let token = token.strip_prefix("--").unwrap_or(token);
        self.declared_variables
            .iter()
            .find(|(name, _)| name.strip_prefix("--").unwrap_or(name) == token)
            .map(|(_, value)| value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> Descriptor {
        Descriptor {
            kind: SheetKind::Theme,
            name: "oceanic".to_string(),
            stem: "Oceanic".to_string(),
            display_name: "Oceanic".to_string(),
            description: String::new(),
            source_path: PathBuf::from("themes/Oceanic.css"),
            modified: None,
            raw_content: Arc::from(":root { --theme-primary: #036; }"),
            declared_variables: vec![("--theme-primary".to_string(), "#036".to_string())],
        }
    }

    #[test]
    fn test_variable_lookup_accepts_both_spellings() {
        let d = descriptor();
        assert_eq!(d.variable("--theme-primary"), Some("#036"));
        assert_eq!(d.variable("theme-primary"), Some("#036"));
        assert_eq!(d.variable("theme-accent"), None);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(SheetKind::Style.to_string(), "style");
        assert_eq!(SheetKind::Theme.to_string(), "theme");
    }

    #[test]
    fn test_content_hash_tracks_raw_content() {
        let a = descriptor();
        let mut b = descriptor();
        assert_eq!(a.content_hash(), b.content_hash());
        b.raw_content = Arc::from(":root { --theme-primary: #fff; }");
        assert_ne!(a.content_hash(), b.content_hash());
    }
}
