//! Cached, layered configuration resolver.
//!
//! Each cache key owns a slot guarded by its own mutex. A `load` holds the slot
//! lock while it reads and parses, so concurrent loads of one key perform a
//! single disk read; loads of different keys never wait on each other.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use archon_core::{ValueTree, merge_all};
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::errors::{ConfigError, Result};
use crate::layer::{ConfigLayer, FrameworkLayout};
use crate::loader::{normalize, read_document, write_document};

/// Environment lookup used for `${NAME}` substitution.
pub type EnvLookup = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Persists one layer document at its storage path.
pub type DocumentWriter = dyn Fn(&Path, &ValueTree) -> Result<()> + Send + Sync;

type Slot = Arc<Mutex<Option<Arc<ValueTree>>>>;

/// Loads, caches, saves, and merges configuration layers under one framework root.
///
/// Construct once per root and share it (`Arc<ConfigResolver>`); the cache is
/// owned state, not a process global.
pub struct ConfigResolver {
    layout: FrameworkLayout,
    env: Box<EnvLookup>,
    writer: Box<DocumentWriter>,
    cache: DashMap<String, Slot>,
    disk_reads: AtomicUsize,
}

impl ConfigResolver {
    /// Resolver substituting placeholders from the process environment.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_env(FrameworkLayout::new(root), |name| std::env::var(name).ok())
    }

    /// Resolver with an explicit layout and environment lookup.
    pub fn with_env<F>(layout: FrameworkLayout, env: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            layout,
            env: Box::new(env),
            writer: Box::new(write_document),
            cache: DashMap::new(),
            disk_reads: AtomicUsize::new(0),
        }
    }

    /// Replace how `save` persists documents. Defaults to [`write_document`].
    #[must_use]
    pub fn with_writer<F>(mut self, writer: F) -> Self
    where
        F: Fn(&Path, &ValueTree) -> Result<()> + Send + Sync + 'static,
    {
        self.writer = Box::new(writer);
        self
    }

    /// Directory layout this resolver reads from.
    pub fn layout(&self) -> &FrameworkLayout {
        &self.layout
    }

    /// Number of documents read from storage so far.
    pub fn disk_reads(&self) -> usize {
        self.disk_reads.load(Ordering::Relaxed)
    }

    /// Load a layer, from cache when present.
    ///
    /// Never fails: missing, unreadable, or malformed documents, as well as
    /// project layers with unusable names, resolve to an empty mapping.
    pub fn load(&self, layer: &ConfigLayer) -> Arc<ValueTree> {
        let Some(path) = self.layout.layer_path(layer) else {
            warn!(%layer, "config layer has no storage location, using empty mapping");
            return Arc::new(ValueTree::empty_mapping());
        };

        let key = layer.cache_key();
        let slot = self.slot(&key);
        let mut cached = slot.lock();
        if let Some(value) = cached.as_ref() {
            debug!(key = %key, "config cache hit");
            return Arc::clone(value);
        }

        debug!(key = %key, path = %path.display(), "loading config document");
        let _ = self.disk_reads.fetch_add(1, Ordering::Relaxed);
        let mut value = read_document(&path);
        let paths_root = matches!(layer, ConfigLayer::Global).then(|| self.layout.root());
        normalize(&mut value, self.env.as_ref(), paths_root);

        let value = Arc::new(value);
        *cached = Some(Arc::clone(&value));
        value
    }

    /// Persist `value` as the layer's document and make it the cached value.
    ///
    /// The value is cached exactly as given, so an immediate `load` returns it
    /// unchanged. On failure the cache entry is left untouched.
    pub fn save(&self, layer: &ConfigLayer, value: ValueTree) -> Result<()> {
        layer.validate()?;
        let path = self
            .layout
            .layer_path(layer)
            .ok_or_else(|| ConfigError::InvalidLayer(layer.to_string()))?;

        let key = layer.cache_key();
        let slot = self.slot(&key);
        let mut cached = slot.lock();
        (self.writer)(&path, &value)?;
        *cached = Some(Arc::new(value));
        info!(key = %key, path = %path.display(), "config saved");
        Ok(())
    }

    /// Merge all five layers of `project`, lowest precedence first.
    pub fn effective_config(&self, project: &str) -> ValueTree {
        merge_all(
            ConfigLayer::stack(project)
                .iter()
                .map(|layer| ValueTree::clone(&self.load(layer))),
        )
    }

    /// Drop the cached value of one layer; the next `load` reads storage.
    pub fn invalidate(&self, layer: &ConfigLayer) {
        self.invalidate_key(&layer.cache_key());
    }

    /// Drop both cached project layers of `project` along with their slots.
    pub fn invalidate_project(&self, project: &str) {
        for layer in [
            ConfigLayer::ProjectSettings(project.to_owned()),
            ConfigLayer::ProjectAgentConfig(project.to_owned()),
        ] {
            let key = layer.cache_key();
            self.invalidate_key(&key);
            let _ = self.cache.remove(&key);
        }
    }

    fn invalidate_key(&self, key: &str) {
        let slot = self.cache.get(key).map(|entry| Arc::clone(entry.value()));
        if let Some(slot) = slot {
            if slot.lock().take().is_some() {
                debug!(key = %key, "config cache entry invalidated");
            }
        }
    }

    // Clone the slot out so the map shard is released before the slot is locked.
    fn slot(&self, key: &str) -> Slot {
        if let Some(entry) = self.cache.get(key) {
            return Arc::clone(entry.value());
        }
        Arc::clone(self.cache.entry(key.to_owned()).or_default().value())
    }
}

impl fmt::Debug for ConfigResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigResolver")
            .field("layout", &self.layout)
            .field("cached_keys", &self.cache.len())
            .field("disk_reads", &self.disk_reads())
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
