//! Embedding tile store with a per-run in-process cache.
//!
//! Lookup is a pure function of the quantized coordinate. Both hits and
//! misses are cached, so every tile file is read at most once per store in the
//! common case. Two workers racing on the same cold key may both read the file;
//! tile contents are immutable, so whichever insert lands last is equivalent.
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use tracing::{debug, warn};

use habitat_core::artifact::write_json_atomic;
use habitat_core::config::{resolve_with_base, TileSettings};
use habitat_core::traits::EmbeddingSource;
use habitat_core::types::{Coord, Embedding, TileKey};
use habitat_core::{Error, Result};

use crate::format::{tile_path, TileFile};

pub struct TileStore {
    dir: PathBuf,
    tile_size: f64,
    dim: usize,
    cache: RwLock<HashMap<TileKey, Option<Embedding>>>,
}

impl TileStore {
    pub fn open(dir: impl Into<PathBuf>, tile_size: f64, dim: usize) -> Result<Self> {
        let dir = dir.into();
        if !(tile_size.is_finite() && tile_size > 0.0) {
            return Err(Error::InvalidConfig(format!("tile_size must be > 0, got {tile_size}")));
        }
        if dim == 0 {
            return Err(Error::InvalidConfig("tile dim must be > 0".into()));
        }
        if !dir.is_dir() {
            warn!(dir = %dir.display(), "tile directory does not exist; every lookup will miss");
        }
        Ok(Self { dir, tile_size, dim, cache: RwLock::new(HashMap::new()) })
    }

    /// Opens the store described by `[tiles]`, resolving a relative dir against `base`.
    pub fn from_settings(settings: &TileSettings, base: &Path) -> Result<Self> {
        Self::open(resolve_with_base(base, &settings.dir), settings.tile_size, settings.dim)
    }

    pub fn dir(&self) -> &Path { &self.dir }

    /// Embedding for a tile key, or `TileNotFound` when no file is cached.
    pub fn embedding_for_key(&self, key: TileKey) -> Result<Embedding> {
        let cached = self.cache.read().unwrap_or_else(PoisonError::into_inner).get(&key).cloned();
        let entry = match cached {
            Some(entry) => entry,
            None => {
                let loaded = self.load(key)?;
                self.cache.write().unwrap_or_else(PoisonError::into_inner).insert(key, loaded.clone());
                loaded
            }
        };
        entry.ok_or(Error::TileNotFound { key })
    }

    fn load(&self, key: TileKey) -> Result<Option<Embedding>> {
        let path = tile_path(&self.dir, key);
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(%key, "no tile on disk");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let tile: TileFile = serde_json::from_slice(&bytes)
            .map_err(|e| Error::CorruptTile { path: path.clone(), reason: e.to_string() })?;
        if tile.key != key {
            return Err(Error::CorruptTile { path, reason: format!("file holds {} instead of {}", tile.key, key) });
        }
        if tile.vector.len() != self.dim {
            return Err(Error::CorruptTile {
                path,
                reason: format!("vector has {} components, expected {}", tile.vector.len(), self.dim),
            });
        }
        if tile.vector.iter().any(|v| !v.is_finite()) {
            return Err(Error::CorruptTile { path, reason: "vector has non-finite components".into() });
        }
        debug!(%key, "tile loaded");
        Ok(Some(Embedding::from(tile.vector)))
    }

    /// Writes a tile into the store directory. Used by tile producers and fixtures;
    /// an already cached entry for `key` is replaced.
    pub fn write_tile(&self, key: TileKey, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: vector.len() });
        }
        write_json_atomic(&tile_path(&self.dir, key), &TileFile { key, vector: vector.to_vec() })?;
        self.cache.write().unwrap_or_else(PoisonError::into_inner).remove(&key);
        Ok(())
    }

    /// Number of tile keys resident in the cache (hits and misses).
    pub fn cached_tiles(&self) -> usize { self.cache.read().unwrap_or_else(PoisonError::into_inner).len() }
}

impl EmbeddingSource for TileStore {
    fn dim(&self) -> usize { self.dim }
    fn tile_size(&self) -> f64 { self.tile_size }
    fn embedding(&self, coord: Coord) -> Result<Embedding> { self.embedding_for_key(self.tile_key(coord)) }
}
