//! # md2pdf-styles - Style and Theme Engine
//!
//! `md2pdf-styles` decides which CSS a Markdown conversion is rendered with.
//! It finds style and theme stylesheets, checks that a requested pairing
//! exists and is advisable, layers the pieces into one stylesheet in a fixed
//! order, and caches the artifacts produced from them.
//!
//! It has no opinion about Markdown, HTML or PDF. Those live in the `md2pdf`
//! crate, which feeds this one text and hands its output to a renderer.
//!
//! ## Core Concepts
//!
//! - [`StylesheetStore`]: where stylesheet files come from ([`DirStore`] for
//!   directories, [`MemoryStore`] for embedded content)
//! - [`Descriptor`]: one discovered style or theme, with its metadata
//! - [`Registry`]: the result of a discovery pass; [`RegistryHandle`]
//!   publishes it to concurrent readers
//! - [`Validator`]: resolves a `(style, theme)` pair and applies the
//!   [`CompatibilityPolicy`]
//! - [`Merger`]: composes base, style, theme, custom and print CSS into a
//!   [`MergedStylesheet`]
//! - [`ConversionCache`]: artifacts keyed by [`Fingerprint`]
//!
//! ## Quick Start
//!
//! ```rust
//! use md2pdf_styles::{discover, ContentHash, ConversionCache, Fingerprint, MemoryStore, Merger, Validator};
//!
//! let store = MemoryStore::new()
//!     .with_style("technical.css", "/* Technical - Clean docs */\n:root { --font-body: serif; }")
//!     .with_theme("dark.css", "/* Dark - Light on dark */\n:root { --theme-bg: #111; }");
//!
//! let registry = discover(&store)?;
//! let pair = Validator::default().validate(&registry, "technical", "dark")?;
//! assert!(pair.verdict.is_valid());
//!
//! let merged = Merger::new().merge(pair.style, pair.theme, None, None)?;
//! assert!(merged.text().contains("--theme-bg: #111"));
//!
//! let cache = ConversionCache::new();
//! let key = Fingerprint::new(ContentHash::of("# Title"), "technical", "dark", merged.hash());
//! let artifact = cache.get_or_compute(&key, || Ok::<_, std::io::Error>(b"%PDF".to_vec()))?;
//! assert_eq!(artifact.bytes(), b"%PDF");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cache;
pub mod descriptor;
mod error;
mod hash;
pub mod merge;
pub mod metadata;
pub mod registry;
pub mod store;
pub mod validate;

// Error types
pub use error::{CacheCorruption, Error, LookupError, MergeError, StoreError};

pub use hash::ContentHash;

pub use descriptor::{Descriptor, SheetKind};

pub use store::{DirStore, MemoryStore, SheetFile, StylesheetStore, STYLESHEET_EXTENSION};

pub use metadata::{
    declared_variables, display_name_from_stem, extract, normalize_name, variable_declarations,
    SheetMetadata,
};

pub use registry::{discover, DiscoveryWarning, Registry, RegistryHandle};

pub use validate::{validate, CompatibilityPolicy, PairingRule, Validation, Validator, Verdict};

pub use merge::{merge, CssSource, FragmentSpan, Layer, MergedStylesheet, Merger};

pub use cache::{Artifact, CacheStats, ConversionCache, Fingerprint};
