use std::path::Path;

use tracing::info;

use habitat_core::artifact::{write_collection, CandidateCollection, CandidateFeature, CollectionMetadata};
use habitat_core::config::ScanSettings;
use habitat_core::traits::HabitatModel;
use habitat_core::{Error, Result};

use crate::scanner::ScanOutput;

/// Where a collection came from. Copied out of the model so the artifact
/// never refers back to it.
#[derive(Debug, Clone, Default)]
pub struct Provenance {
    pub model_type: String,
    pub model_id: Option<String>,
    pub species: Option<String>,
    pub n_occurrences: Option<usize>,
}

impl Provenance {
    pub fn from_model<M: HabitatModel + ?Sized>(model: &M) -> Self {
        Self { model_type: model.model_type().to_string(), model_id: Some(model.model_id().to_string()), ..Self::default() }
    }

    pub fn with_species(mut self, species: impl Into<String>, n_occurrences: usize) -> Self {
        self.species = Some(species.into());
        self.n_occurrences = Some(n_occurrences);
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CandidateExtractor {
    threshold: f64,
    max_candidates: Option<usize>,
}

impl CandidateExtractor {
    pub fn new(threshold: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::InvalidConfig(format!("probability threshold must be in [0, 1], got {threshold}")));
        }
        Ok(Self { threshold, max_candidates: None })
    }

    pub fn from_settings(settings: &ScanSettings) -> Result<Self> {
        Ok(Self::new(settings.threshold)?.with_max_candidates(settings.max_candidates))
    }

    /// Keeps at most `max` features, highest probability first.
    pub fn with_max_candidates(mut self, max: Option<usize>) -> Self {
        self.max_candidates = max;
        self
    }

    pub fn threshold(&self) -> f64 { self.threshold }

    /// Thresholds the scan. Features are ordered by descending probability,
    /// ties in grid order.
    pub fn extract(&self, scan: &ScanOutput, provenance: &Provenance) -> CandidateCollection {
        let mut features: Vec<CandidateFeature> = scan
            .points
            .iter()
            .filter(|p| p.probability >= self.threshold)
            .map(|p| CandidateFeature::new(p.coord, p.probability, &provenance.model_type))
            .collect();
        features.sort_by(|a, b| b.probability().total_cmp(&a.probability()));
        if let Some(max) = self.max_candidates {
            features.truncate(max);
        }

        let metadata = CollectionMetadata {
            bbox: scan.grid.bbox(),
            resolution: scan.grid.resolution(),
            probability_threshold: self.threshold,
            total_grid_points: scan.total_grid_points,
            valid_grid_points: scan.valid_grid_points,
            n_candidates: features.len(),
            species: provenance.species.clone(),
            n_occurrences: provenance.n_occurrences,
            model_id: provenance.model_id.clone(),
        };
        info!(
            threshold = self.threshold,
            candidates = metadata.n_candidates,
            valid = metadata.valid_grid_points,
            "candidates extracted"
        );
        CandidateCollection::new(features, metadata)
    }

    pub fn extract_to(&self, scan: &ScanOutput, provenance: &Provenance, path: &Path) -> Result<CandidateCollection> {
        let collection = self.extract(scan, provenance);
        write_collection(path, &collection)?;
        info!(path = %path.display(), "candidates written");
        Ok(collection)
    }
}
