//! End-to-end run for one species: train, scan, extract, persist.
//!
//! Outputs land in `output_dir`:
//! - `candidates.geojson` (the artifact served by the result cache)
//! - `occurrences.geojson` (occurrences that resolved to a tile)
//! - `model.json` (reloadable classifier)
use std::path::PathBuf;

use tracing::info;

use habitat_core::artifact::{write_occurrences, CandidateCollection};
use habitat_core::config::Settings;
use habitat_core::species::{normalize_species, CANDIDATES_FILE, MODEL_FILE, OCCURRENCES_FILE};
use habitat_core::traits::{EmbeddingSource, HabitatModel};
use habitat_core::types::{BoundingBox, Coord, ScoredPoint};
use habitat_core::Result;
use habitat_train::train_from_occurrences;

use crate::extractor::{CandidateExtractor, Provenance};
use crate::scanner::RegionScanner;

pub struct RunRequest<'a> {
    pub species: &'a str,
    pub occurrences: &'a [Coord],
    pub bbox: BoundingBox,
    pub output_dir: PathBuf,
}

#[derive(Debug)]
pub struct RunSummary {
    pub collection: CandidateCollection,
    pub output_dir: PathBuf,
    pub model_id: String,
    pub positives: usize,
    pub dropped_occurrences: usize,
    pub negatives: usize,
}

impl RunSummary {
    pub fn candidates_path(&self) -> PathBuf { self.output_dir.join(CANDIDATES_FILE) }
    pub fn occurrences_path(&self) -> PathBuf { self.output_dir.join(OCCURRENCES_FILE) }
    pub fn model_path(&self) -> PathBuf { self.output_dir.join(MODEL_FILE) }
}

pub fn run_pipeline<S>(source: &S, request: &RunRequest<'_>, settings: &Settings) -> Result<RunSummary>
where
    S: EmbeddingSource + ?Sized,
{
    settings.validate()?;
    let slug = normalize_species(request.species);
    info!(species = %slug, occurrences = request.occurrences.len(), bbox = %request.bbox, "starting run");

    let training_region = settings.train.region.unwrap_or(request.bbox);
    let run = train_from_occurrences(source, request.occurrences, training_region, &settings.train)?;

    let scan = RegionScanner::from_settings(source, &run.model, &settings.scan).scan(request.bbox, settings.scan.resolution)?;
    if let Some((lo, hi)) = probability_range(&scan.points) {
        let high = count_above(&scan.points, HIGH_PROBABILITY);
        info!(min = lo, max = hi, high_probability_cells = high, "probability range");
    }

    // metadata records the name as given; the slug only names paths
    let provenance = Provenance::from_model(&run.model).with_species(request.species, run.positives.resolved.len());
    let collection = CandidateExtractor::from_settings(&settings.scan)?.extract_to(
        &scan,
        &provenance,
        &request.output_dir.join(CANDIDATES_FILE),
    )?;
    // model.json is replaced only once candidates.geojson is
    run.model.save(&request.output_dir.join(MODEL_FILE))?;
    write_occurrences(&request.output_dir.join(OCCURRENCES_FILE), &run.positives.resolved)?;

    info!(output = %request.output_dir.display(), candidates = collection.metadata.n_candidates, "run complete");
    Ok(RunSummary {
        collection,
        output_dir: request.output_dir.clone(),
        model_id: run.model.model_id().to_string(),
        positives: run.positives.resolved.len(),
        dropped_occurrences: run.positives.dropped,
        negatives: run.negatives.examples.len(),
    })
}

/// Cells above this are reported as high-probability in the run log.
const HIGH_PROBABILITY: f64 = 0.7;

fn count_above(points: &[ScoredPoint], cutoff: f64) -> usize { points.iter().filter(|p| p.probability > cutoff).count() }

fn probability_range(points: &[ScoredPoint]) -> Option<(f64, f64)> {
    let first = points.first()?.probability;
    Some(points.iter().fold((first, first), |(lo, hi), p| (lo.min(p.probability), hi.max(p.probability))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(ps: &[f64]) -> Vec<ScoredPoint> {
        ps.iter().map(|&probability| ScoredPoint { coord: Coord::new(0.0, 0.0), probability }).collect()
    }

    #[test]
    fn high_probability_count_is_strictly_above_cutoff() {
        assert_eq!(count_above(&points(&[0.2, 0.7, 0.71, 0.99]), HIGH_PROBABILITY), 2);
        assert_eq!(count_above(&[], HIGH_PROBABILITY), 0);
    }

    #[test]
    fn range_spans_all_points() {
        assert_eq!(probability_range(&points(&[0.4, 0.1, 0.9])), Some((0.1, 0.9)));
        assert_eq!(probability_range(&[]), None);
    }
}
