//! Conversion cache.
//!
//! Maps a [`Fingerprint`] to the artifact produced for it. The cache is
//! shared by every worker of a batch, so all methods take `&self`.
//!
//! ## Concurrency policy
//!
//! A second request for a fingerprint that is already being computed
//! waits for the first one. Each fingerprint owns a
//! [`OnceCell`](once_cell::sync::OnceCell) slot; the map lock is held only
//! long enough to find or create the slot, so distinct fingerprints never
//! block each other. Consequences:
//!
//! - [`get_or_compute`](ConversionCache::get_or_compute) runs at most one
//!   successful computation per fingerprint.
//! - [`put`](ConversionCache::put) is first-writer-wins: a later `put`
//!   for a filled slot is ignored and the stored artifact is returned.
//! - Readers only ever see a complete `Arc<Artifact>`.
//! - A computation that fails leaves the slot empty; the next request
//!   computes again.
//!
//! ## Persistence
//!
//! With [`with_dir`](ConversionCache::with_dir), artifacts are also written
//! to `<dir>/<fingerprint-hex>.bin` as a 32-byte SHA-256 digest followed by
//! the payload. A file whose digest does not match is logged, deleted and
//! treated as a miss.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use once_cell::sync::{Lazy, OnceCell};

use crate::error::CacheCorruption;
use crate::hash::ContentHash;

static NAMES: Lazy<Mutex<HashSet<Arc<str>>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Returns the shared copy of `name`.
fn intern(name: &str) -> Arc<str> {
    let mut names = lock(&NAMES);
    if let Some(existing) = names.get(name) {
        return Arc::clone(existing);
    }
    let interned: Arc<str> = Arc::from(name);
    names.insert(Arc::clone(&interned));
    interned
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// =============================================================================
// Fingerprint
// =============================================================================

/// Composite cache key.
///
/// Kept as separate fields rather than a joined string so that differently
/// delimited inputs can never produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    source: ContentHash,
    style: Arc<str>,
    theme: Arc<str>,
    stylesheet: ContentHash,
}

impl Fingerprint {
    pub fn new(source: ContentHash, style: &str, theme: &str, stylesheet: ContentHash) -> Self {
        Self {
            source,
            style: intern(style),
            theme: intern(theme),
            stylesheet,
        }
    }

    pub fn source(&self) -> ContentHash {
        self.source
    }

    pub fn style(&self) -> &str {
        &self.style
    }

    pub fn theme(&self) -> &str {
        &self.theme
    }

    pub fn stylesheet(&self) -> ContentHash {
        self.stylesheet
    }

    /// Stable hex digest of all four fields, for file names.
    pub fn to_hex(&self) -> String {
        ContentHash::of_parts([
            &self.source.as_bytes()[..],
            self.style.as_bytes(),
            self.theme.as_bytes(),
            &self.stylesheet.as_bytes()[..],
        ])
        .to_hex()
    }
}

// =============================================================================
// Artifact
// =============================================================================

/// A produced output plus the digest of its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    bytes: Vec<u8>,
    digest: ContentHash,
}

impl Artifact {
    pub fn new(bytes: Vec<u8>) -> Self {
        let digest = ContentHash::of(&bytes);
        Self { bytes, digest }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn digest(&self) -> ContentHash {
        self.digest
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether the bytes still match the recorded digest.
    pub fn verify(&self) -> bool {
        ContentHash::of(&self.bytes) == self.digest
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32 + self.bytes.len());
        out.extend_from_slice(self.digest.as_bytes());
        out.extend_from_slice(&self.bytes);
        out
    }

    fn decode(path: &Path, raw: Vec<u8>) -> Result<Self, CacheCorruption> {
        if raw.len() < 32 {
            return Err(CacheCorruption::Truncated {
                path: path.to_path_buf(),
                len: raw.len(),
            });
        }
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&raw[..32]);
        let artifact = Self {
            bytes: raw[32..].to_vec(),
            digest: ContentHash::from_bytes(digest),
        };
        if artifact.verify() {
            Ok(artifact)
        } else {
            Err(CacheCorruption::DigestMismatch {
                path: path.to_path_buf(),
            })
        }
    }
}

// =============================================================================
// Cache
// =============================================================================

/// Counters since creation or the last [`clear`](ConversionCache::clear).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub computations: u64,
}

type Slot = Arc<OnceCell<Arc<Artifact>>>;

/// Fingerprint → artifact map, safe to share between threads.
#[derive(Debug, Default)]
pub struct ConversionCache {
    slots: Mutex<HashMap<Fingerprint, Slot>>,
    dir: Option<PathBuf>,
    hits: AtomicU64,
    misses: AtomicU64,
    computations: AtomicU64,
}

impl ConversionCache {
    /// An in-memory cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache that also persists artifacts under `dir`.
    ///
    /// The directory is created if needed.
    pub fn with_dir(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir: Some(dir),
            ..Self::default()
        })
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Returns the stored artifact, if any.
    ///
    /// Does not wait for an in-flight computation.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<Arc<Artifact>> {
        let slot = self.slot(fingerprint);
        if let Some(artifact) = slot.get() {
            self.hit(fingerprint);
            return Some(Arc::clone(artifact));
        }

        if let Some(artifact) = self.load(fingerprint) {
            let stored = slot.get_or_init(|| Arc::new(artifact));
            self.hit(fingerprint);
            return Some(Arc::clone(stored));
        }

        self.miss(fingerprint);
        None
    }

    /// Stores `bytes` unless the fingerprint already has an artifact.
    ///
    /// Returns whichever artifact ends up stored.
    pub fn put(&self, fingerprint: &Fingerprint, bytes: Vec<u8>) -> Arc<Artifact> {
        let slot = self.slot(fingerprint);
        let mut fresh = false;
        let stored = slot.get_or_init(|| {
            fresh = true;
            Arc::new(Artifact::new(bytes))
        });
        if fresh {
            self.persist(fingerprint, stored);
        }
        Arc::clone(stored)
    }

    /// Returns the stored artifact or computes it.
    ///
    /// Concurrent callers with the same fingerprint block until the first
    /// computation finishes. If it fails, its error is returned to that
    /// caller only and a waiting caller takes over.
    pub fn get_or_compute<F, E>(
        &self,
        fingerprint: &Fingerprint,
        compute: F,
    ) -> Result<Arc<Artifact>, E>
    where
        F: FnOnce() -> Result<Vec<u8>, E>,
    {
        let slot = self.slot(fingerprint);
        if let Some(artifact) = slot.get() {
            self.hit(fingerprint);
            return Ok(Arc::clone(artifact));
        }

        let mut computed = false;
        let stored = slot.get_or_try_init(|| {
            if let Some(artifact) = self.load(fingerprint) {
                return Ok(Arc::new(artifact));
            }
            computed = true;
            self.miss(fingerprint);
            self.computations.fetch_add(1, Ordering::Relaxed);
            log::debug!("cache compute {}", fingerprint.to_hex());
            compute().map(|bytes| Arc::new(Artifact::new(bytes)))
        })?;

        if computed {
            self.persist(fingerprint, stored);
        } else {
            self.hit(fingerprint);
        }
        Ok(Arc::clone(stored))
    }

    /// Drops every in-memory entry and resets the counters.
    ///
    /// Persisted files are left alone.
    pub fn clear(&self) {
        lock(&self.slots).clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.computations.store(0, Ordering::Relaxed);
    }

    /// Number of fingerprints with a stored artifact.
    pub fn len(&self) -> usize {
        lock(&self.slots)
            .values()
            .filter(|slot| slot.get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            computations: self.computations.load(Ordering::Relaxed),
        }
    }

    fn slot(&self, fingerprint: &Fingerprint) -> Slot {
        let mut slots = lock(&self.slots);
        Arc::clone(slots.entry(fingerprint.clone()).or_default())
    }

    fn hit(&self, fingerprint: &Fingerprint) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        log::debug!("cache hit {}", fingerprint.to_hex());
    }

    fn miss(&self, fingerprint: &Fingerprint) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        log::debug!("cache miss {}", fingerprint.to_hex());
    }

    fn file_for(&self, fingerprint: &Fingerprint) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.bin", fingerprint.to_hex())))
    }

    fn load(&self, fingerprint: &Fingerprint) -> Option<Artifact> {
        let path = self.file_for(fingerprint)?;
        let raw = fs::read(&path).ok()?;
        match Artifact::decode(&path, raw) {
            Ok(artifact) => Some(artifact),
            Err(corruption) => {
                log::warn!("{}; discarding", corruption);
                if let Err(err) = fs::remove_file(&path) {
                    log::warn!("failed to remove {}: {}", path.display(), err);
                }
                None
            }
        }
    }

    fn persist(&self, fingerprint: &Fingerprint, artifact: &Artifact) {
        let Some(path) = self.file_for(fingerprint) else {
            return;
        };
        // Readers must never see a partial file under the final name.
        let tmp = path.with_extension("bin.tmp");
        let result = fs::write(&tmp, artifact.encode()).and_then(|()| fs::rename(&tmp, &path));
        if let Err(err) = result {
            log::warn!("failed to persist cache entry {}: {}", path.display(), err);
            let _ = fs::remove_file(&tmp);
        }
    }
}
