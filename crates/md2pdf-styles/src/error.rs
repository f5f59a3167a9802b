//! Error types for discovery, lookup and merging.
//!
//! Problems with a single stylesheet file never show up here: discovery
//! records them as [`DiscoveryWarning`](crate::DiscoveryWarning)s and moves
//! on. The errors below are the ones a caller has to act on.

use std::io;
use std::path::PathBuf;

use crate::descriptor::SheetKind;

/// The style or theme directory could not be used.
///
/// Fatal for the discovery pass that hit it. A previously published
/// [`Registry`](crate::Registry) stays in effect.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The configured directory does not exist or is not a directory.
    #[error("{kind} directory not found: {}", .path.display())]
    NotFound { kind: SheetKind, path: PathBuf },

    /// The directory exists but could not be listed.
    #[error("failed to list {kind} directory {}: {source}", .path.display())]
    Unreadable {
        kind: SheetKind,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A single stylesheet file could not be read.
    #[error("failed to read {}: {message}", .path.display())]
    Read { path: PathBuf, message: String },
}

/// A requested style or theme is not in the registry.
///
/// Both variants carry the full sorted list of registered names so the
/// caller can print alternatives.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("unknown style '{name}' (available: {})", list_or_none(.known))]
    StyleNotFound { name: String, known: Vec<String> },

    #[error("unknown theme '{name}' (available: {})", list_or_none(.known))]
    ThemeNotFound { name: String, known: Vec<String> },
}

impl LookupError {
    /// The name that could not be resolved.
    pub fn missing_name(&self) -> &str {
        match self {
            LookupError::StyleNotFound { name, .. } | LookupError::ThemeNotFound { name, .. } => {
                name
            }
        }
    }

    /// The sorted names that were available.
    pub fn candidates(&self) -> &[String] {
        match self {
            LookupError::StyleNotFound { known, .. } | LookupError::ThemeNotFound { known, .. } => {
                known
            }
        }
    }

    /// Which registry mapping the lookup went to.
    pub fn kind(&self) -> SheetKind {
        match self {
            LookupError::StyleNotFound { .. } => SheetKind::Style,
            LookupError::ThemeNotFound { .. } => SheetKind::Theme,
        }
    }
}

fn list_or_none(names: &[String]) -> String {
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

/// Composing the final stylesheet failed.
///
/// Not retried: re-run discovery instead of retrying against stale paths.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// A file-backed fragment could not be read.
    #[error("failed to read stylesheet fragment {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A theme was passed where a style was expected, or the reverse.
    #[error("'{name}' is a {found}, expected a {expected}")]
    KindMismatch {
        name: String,
        expected: SheetKind,
        found: SheetKind,
    },
}

/// A persisted cache artifact failed its integrity check.
///
/// Never returned to callers: the cache logs it, drops the file and treats
/// the lookup as a miss.
#[derive(Debug, thiserror::Error)]
pub enum CacheCorruption {
    #[error("cache file {} is truncated ({len} bytes)", .path.display())]
    Truncated { path: PathBuf, len: usize },

    #[error("cache file {} does not match its digest", .path.display())]
    DigestMismatch { path: PathBuf },
}

/// Umbrella error for callers that drive the whole core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    /// Raised only in strict mode; otherwise a discouraged pairing is a warning.
    #[error("combination '{style}' + '{theme}' is discouraged: {reason}")]
    Discouraged {
        style: String,
        theme: String,
        reason: String,
    },

    #[error(transparent)]
    Merge(#[from] MergeError),
}
