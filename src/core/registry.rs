//! Model lifecycle: load, hand out, release.
//!
//! [`ModelRegistry::load`] reads a model file and returns a [`ModelHandle`],
//! the only owner of the loaded model. Handles are move-only: there is no
//! `Clone`, and [`ModelRegistry::release`] takes the handle by value, so a
//! released handle cannot be used or released again. Inference borrows the
//! handle (`&ModelHandle`), which lets many threads share one model while the
//! borrow checker keeps `release` from running under them.

use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use log::{debug, info};

use super::config::Config;
use super::model::{LoadError, Model, DEFAULT_CACHE_SIZE};

/// Generation of the segmentation, hashing and encoding algorithms.
///
/// Bumped whenever the same input and model can produce different output.
pub const ALGORITHM_VERSION: u32 = 1;

/// Owned reference to one loaded model.
#[derive(Debug)]
pub struct ModelHandle {
    id: u64,
    model: Box<Model>,
}

impl ModelHandle {
    /// Identifier unique among handles produced by the same registry.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn model(&self) -> &Model {
        &self.model
    }
}

impl std::ops::Deref for ModelHandle {
    type Target = Model;

    fn deref(&self) -> &Model {
        &self.model
    }
}

/// Loads models and tracks how many are alive.
#[derive(Debug)]
pub struct ModelRegistry {
    cache_size: usize,
    next_id: AtomicU64,
    live: AtomicUsize,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::with_cache_size(DEFAULT_CACHE_SIZE)
    }

    /// Registry sized by `config.cache_size`.
    pub fn with_config(config: &Config) -> Self {
        Self::with_cache_size(config.cache_size)
    }

    /// Registry whose models memoise up to `cache_size` words each.
    pub fn with_cache_size(cache_size: usize) -> Self {
        Self {
            cache_size,
            next_id: AtomicU64::new(1),
            live: AtomicUsize::new(0),
        }
    }

    /// Load a model file.
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<ModelHandle, LoadError> {
        let path = path.as_ref();
        if path.is_dir() {
            return Err(LoadError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is a directory", path.display()),
            )));
        }
        let data = std::fs::read(path)?;
        let handle = self.load_bytes(&data)?;
        info!(
            "loaded model {} from {} ({} kind, {} tokens)",
            handle.id,
            path.display(),
            handle.kind().name(),
            handle.vocab_size()
        );
        Ok(handle)
    }

    /// Load a model from the contents of a model file.
    pub fn load_bytes(&self, data: &[u8]) -> Result<ModelHandle, LoadError> {
        let model = Model::from_bytes(data, self.cache_size)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.live.fetch_add(1, Ordering::Relaxed);
        debug!("model {} created ({:?})", id, model);
        Ok(ModelHandle {
            id,
            model: Box::new(model),
        })
    }

    /// Release a model. The handle is consumed.
    pub fn release(&self, handle: ModelHandle) {
        self.live.fetch_sub(1, Ordering::Relaxed);
        info!("released model {}", handle.id);
        drop(handle);
    }

    /// Number of handles loaded and not yet released.
    pub fn live_models(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }

    /// Algorithm generation, for compatibility checks.
    pub fn version(&self) -> u32 {
        ALGORITHM_VERSION
    }
}
