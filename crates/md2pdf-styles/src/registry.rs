//! Style and theme registry.
//!
//! [`discover`] scans a [`StylesheetStore`] and builds a [`Registry`]: two
//! independent mappings, styles by name and themes by name. A registry is a
//! value. It is built in one go, never mutated afterwards, and replaced
//! wholesale by the next discovery pass.
//!
//! # Discovery Rules
//!
//! For each kind, files are visited in the order the store lists them:
//!
//! 1. The registry name is [`normalize_name`] applied to the file stem.
//! 2. The first file to claim a name wins. Later claimants are skipped and
//!    recorded as [`DiscoveryWarning::Collision`].
//! 3. Files whose stem normalizes to nothing, files that cannot be read and
//!    files that contain only whitespace are skipped and recorded as
//!    warnings. One bad file never fails the scan.
//! 4. A store-level failure (directory missing or unlistable) fails the whole
//!    pass. Nothing is published.
//!
//! Running discovery twice against an unchanged store yields registries with
//! identical key sets and identical raw content.
//!
//! # Publication
//!
//! [`RegistryHandle`] holds the current registry behind an `Arc`. Readers
//! take a [`snapshot`](RegistryHandle::snapshot) and keep using it for as
//! long as they like; [`refresh`](RegistryHandle::refresh) swaps in a new
//! registry only after a complete, successful scan.
//!
//! ```rust
//! use md2pdf_styles::{MemoryStore, RegistryHandle};
//!
//! let store = MemoryStore::new()
//!     .with_style("technical.css", "/* Technical - Clean docs style */\nbody {}")
//!     .with_theme("default.css", ":root { --theme-bg: #fff; }");
//!
//! let handle = RegistryHandle::discover(&store)?;
//! let registry = handle.snapshot();
//! assert_eq!(registry.style_names(), vec!["technical"]);
//! # Ok::<(), md2pdf_styles::StoreError>(())
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::descriptor::{Descriptor, SheetKind};
use crate::error::{LookupError, StoreError};
use crate::metadata::{extract, normalize_name};
use crate::store::StylesheetStore;

/// A per-file problem found during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryWarning {
    /// Two files normalize to the same name; the earlier one was kept.
    Collision {
        kind: SheetKind,
        name: String,
        kept: PathBuf,
        skipped: PathBuf,
    },
    /// The file was listed but could not be read.
    Unreadable { path: PathBuf, message: String },
    /// The file has no content.
    Empty { path: PathBuf },
    /// The file stem has no characters that survive normalization.
    InvalidName { kind: SheetKind, path: PathBuf },
}

impl DiscoveryWarning {
    /// The file that was skipped.
    pub fn path(&self) -> &Path {
        match self {
            DiscoveryWarning::Collision { skipped, .. } => skipped,
            DiscoveryWarning::Unreadable { path, .. }
            | DiscoveryWarning::Empty { path }
            | DiscoveryWarning::InvalidName { path, .. } => path,
        }
    }
}

impl fmt::Display for DiscoveryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryWarning::Collision {
                kind,
                name,
                kept,
                skipped,
            } => write!(
                f,
                "{} name collision for \"{}\": keeping {}, skipping {}",
                kind,
                name,
                kept.display(),
                skipped.display()
            ),
            DiscoveryWarning::Unreadable { path, message } => {
                write!(f, "skipping unreadable {}: {}", path.display(), message)
            }
            DiscoveryWarning::Empty { path } => {
                write!(f, "skipping empty stylesheet {}", path.display())
            }
            DiscoveryWarning::InvalidName { kind, path } => write!(
                f,
                "skipping {} {}: file name has no usable characters",
                kind,
                path.display()
            ),
        }
    }
}

/// Immutable snapshot of discovered styles and themes.
///
/// Every key equals its descriptor's `name`, and every descriptor has
/// non-empty raw content.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    styles: BTreeMap<String, Descriptor>,
    themes: BTreeMap<String, Descriptor>,
    warnings: Vec<DiscoveryWarning>,
}

impl Registry {
    /// An empty registry.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Looks up a style, comparing names case-insensitively.
    pub fn style(&self, name: &str) -> Option<&Descriptor> {
        self.styles.get(&normalize_name(name))
    }

    /// Looks up a theme, comparing names case-insensitively.
    pub fn theme(&self, name: &str) -> Option<&Descriptor> {
        self.themes.get(&normalize_name(name))
    }

    /// Looks up a style, failing with the sorted list of known styles.
    pub fn require_style(&self, name: &str) -> Result<&Descriptor, LookupError> {
        self.style(name).ok_or_else(|| LookupError::StyleNotFound {
            name: name.to_string(),
            known: self.style_names(),
        })
    }

    /// Looks up a theme, failing with the sorted list of known themes.
    pub fn require_theme(&self, name: &str) -> Result<&Descriptor, LookupError> {
        self.theme(name).ok_or_else(|| LookupError::ThemeNotFound {
            name: name.to_string(),
            known: self.theme_names(),
        })
    }

    /// Sorted style names.
    pub fn style_names(&self) -> Vec<String> {
        self.styles.keys().cloned().collect()
    }

    /// Sorted theme names.
    pub fn theme_names(&self) -> Vec<String> {
        self.themes.keys().cloned().collect()
    }

    /// Styles in name order.
    pub fn styles(&self) -> impl Iterator<Item = &Descriptor> {
        self.styles.values()
    }

    /// Themes in name order.
    pub fn themes(&self) -> impl Iterator<Item = &Descriptor> {
        self.themes.values()
    }

    /// Descriptors of one kind, in name order.
    pub fn descriptors(&self, kind: SheetKind) -> impl Iterator<Item = &Descriptor> {
        self.mapping(kind).values()
    }

    /// Every `(style, theme)` pair the registry can serve.
    pub fn combinations(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.styles.len() * self.themes.len());
        for style in self.styles.keys() {
            for theme in self.themes.keys() {
                pairs.push((style.clone(), theme.clone()));
            }
        }
        pairs
    }

    /// Problems recorded while this registry was built.
    pub fn warnings(&self) -> &[DiscoveryWarning] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty() && self.themes.is_empty()
    }

    /// Fills in any kind with no entries from `defaults`.
    ///
    /// Styles and themes fall back independently: a directory with custom
    /// themes but no styles gets the default styles and keeps its themes.
    pub fn or_defaults(mut self, defaults: &Registry) -> Self {
        if self.styles.is_empty() {
            self.styles = defaults.styles.clone();
        }
        if self.themes.is_empty() {
            self.themes = defaults.themes.clone();
        }
        self
    }

    fn mapping(&self, kind: SheetKind) -> &BTreeMap<String, Descriptor> {
        match kind {
            SheetKind::Style => &self.styles,
            SheetKind::Theme => &self.themes,
        }
    }
}

/// Builds a fresh registry from a store.
///
/// # Errors
///
/// Returns the store's error if either listing fails. Per-file problems
/// become [`DiscoveryWarning`]s on the returned registry.
pub fn discover(store: &dyn StylesheetStore) -> Result<Registry, StoreError> {
    let mut warnings = Vec::new();
    let styles = discover_kind(store, SheetKind::Style, &mut warnings)?;
    let themes = discover_kind(store, SheetKind::Theme, &mut warnings)?;

    log::debug!(
        "discovered {} style(s) and {} theme(s), {} warning(s)",
        styles.len(),
        themes.len(),
        warnings.len()
    );

    Ok(Registry {
        styles,
        themes,
        warnings,
    })
}

fn discover_kind(
    store: &dyn StylesheetStore,
    kind: SheetKind,
    warnings: &mut Vec<DiscoveryWarning>,
) -> Result<BTreeMap<String, Descriptor>, StoreError> {
    let mut mapping: BTreeMap<String, Descriptor> = BTreeMap::new();

    for file in store.list(kind)? {
        let name = normalize_name(&file.stem);
        if name.is_empty() {
            let warning = DiscoveryWarning::InvalidName {
                kind,
                path: file.path.clone(),
            };
            log::warn!("{}", warning);
            warnings.push(warning);
            continue;
        }

        if let Some(existing) = mapping.get(&name) {
            let warning = DiscoveryWarning::Collision {
                kind,
                name,
                kept: existing.source_path.clone(),
                skipped: file.path.clone(),
            };
            log::warn!("{}", warning);
            warnings.push(warning);
            continue;
        }

        let content = match store.read(&file) {
            Ok(content) => content,
            Err(e) => {
                let warning = DiscoveryWarning::Unreadable {
                    path: file.path.clone(),
                    message: e.to_string(),
                };
                log::warn!("{}", warning);
                warnings.push(warning);
                continue;
            }
        };

        if content.trim().is_empty() {
            let warning = DiscoveryWarning::Empty {
                path: file.path.clone(),
            };
            log::warn!("{}", warning);
            warnings.push(warning);
            continue;
        }

        let meta = extract(&file.stem, &content);
        let descriptor = Descriptor {
            kind,
            name: name.clone(),
            stem: file.stem,
            display_name: meta.display_name,
            description: meta.description,
            source_path: file.path,
            modified: file.modified,
            raw_content: Arc::from(content),
            declared_variables: meta.declared_variables,
        };
        mapping.insert(name, descriptor);
    }

    Ok(mapping)
}

/// Shared handle to the currently published registry.
///
/// Cloning the handle shares the same slot. Publishing is a single pointer
/// swap, so a reader sees either the old registry or the new one.
#[derive(Debug, Clone, Default)]
pub struct RegistryHandle {
    current: Arc<RwLock<Arc<Registry>>>,
}

impl RegistryHandle {
    /// Wraps an existing registry.
    pub fn new(registry: Registry) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(registry))),
        }
    }

    /// Runs discovery and wraps the result.
    pub fn discover(store: &dyn StylesheetStore) -> Result<Self, StoreError> {
        Ok(Self::new(discover(store)?))
    }

    /// The registry currently in effect.
    pub fn snapshot(&self) -> Arc<Registry> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Replaces the current registry.
    pub fn publish(&self, registry: Registry) -> Arc<Registry> {
        let next = Arc::new(registry);
        match self.current.write() {
            Ok(mut guard) => *guard = Arc::clone(&next),
            Err(poisoned) => *poisoned.into_inner() = Arc::clone(&next),
        }
        next
    }

    /// Re-runs discovery and publishes the result.
    ///
    /// On error the previous registry stays in effect.
    pub fn refresh(&self, store: &dyn StylesheetStore) -> Result<Arc<Registry>, StoreError> {
        let registry = discover(store)?;
        Ok(self.publish(registry))
    }
}
