//! habitat-cache
//!
//! Read side of the pipeline: serves candidate collections by species,
//! loading `<results_dir>/<slug>/candidates.geojson` on first request.
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use habitat_core::artifact::{parse_collection, CandidateCollection};
use habitat_core::species::{normalize_species, CANDIDATES_FILE};
use habitat_core::{Error, Result};

/// Populate-on-miss cache of candidate collections keyed by species slug.
///
/// Entries never expire. Two tasks missing on the same species at once may
/// both load the file; the later insert wins and both see equal data.
pub struct ResultCache {
    results_dir: PathBuf,
    entries: RwLock<HashMap<String, Arc<CandidateCollection>>>,
}

impl ResultCache {
    pub fn new(results_dir: impl Into<PathBuf>) -> Self {
        Self { results_dir: results_dir.into(), entries: RwLock::new(HashMap::new()) }
    }

    pub fn results_dir(&self) -> &Path { &self.results_dir }

    pub fn artifact_path(&self, species: &str) -> PathBuf {
        self.results_dir.join(normalize_species(species)).join(CANDIDATES_FILE)
    }

    /// Collection for `species`, or `None` when no run has produced one.
    ///
    /// With `min_probability` set, returns a filtered copy; the cached entry
    /// is left untouched.
    pub async fn get(&self, species: &str, min_probability: Option<f64>) -> Result<Option<Arc<CandidateCollection>>> {
        if let Some(p) = min_probability {
            if !(0.0..=1.0).contains(&p) {
                return Err(Error::InvalidInput(format!("min_probability must be in [0, 1], got {p}")));
            }
        }
        let slug = normalize_species(species);
        let Some(collection) = self.lookup(&slug).await? else {
            return Ok(None);
        };
        Ok(Some(match min_probability {
            Some(p) => Arc::new(collection.filtered(p)),
            None => collection,
        }))
    }

    async fn lookup(&self, slug: &str) -> Result<Option<Arc<CandidateCollection>>> {
        if let Some(hit) = self.entries.read().await.get(slug) {
            debug!(species = slug, "result cache hit");
            return Ok(Some(Arc::clone(hit)));
        }

        let path = self.results_dir.join(slug).join(CANDIDATES_FILE);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(species = slug, path = %path.display(), "no candidate data");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let collection = Arc::new(parse_collection(&bytes, &path)?);
        info!(species = slug, candidates = collection.metadata.n_candidates, "loaded candidates");
        self.entries.write().await.insert(slug.to_string(), Arc::clone(&collection));
        Ok(Some(collection))
    }

    /// Drops the entry for `species` so the next `get` rereads the file.
    pub async fn invalidate(&self, species: &str) -> bool {
        self.entries.write().await.remove(&normalize_species(species)).is_some()
    }

    pub async fn clear(&self) { self.entries.write().await.clear(); }

    pub async fn len(&self) -> usize { self.entries.read().await.len() }

    pub async fn is_empty(&self) -> bool { self.entries.read().await.is_empty() }
}
