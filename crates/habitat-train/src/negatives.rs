//! Background (negative) sampling.
//!
//! Points are drawn uniformly from the training region with a seeded RNG.
//! A draw is rejected when its tile holds a positive, when it lies within
//! `min_distance_deg` of an occurrence, or when its tile has no embedding.
//! Draws stop at `target * attempts_per_sample`; an under-filled set is
//! returned rather than looping forever.
use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use habitat_core::config::TrainSettings;
use habitat_core::traits::EmbeddingSource;
use habitat_core::types::{BoundingBox, Coord, Label, TileKey, TrainingExample};
use habitat_core::Result;

use crate::occurrences::PositiveSet;

#[derive(Debug, Clone, Default)]
pub struct NegativeSet {
    pub examples: Vec<TrainingExample>,
    pub coords: Vec<Coord>,
    pub target: usize,
    pub attempts: usize,
    /// Draws rejected because the tile had no embedding.
    pub missing: usize,
}

impl NegativeSet {
    pub fn is_underfilled(&self) -> bool { self.examples.len() < self.target }
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn target_count(positives: usize, ratio: f64) -> usize { (positives as f64 * ratio).ceil() as usize }

pub fn sample_negatives<S>(
    source: &S,
    region: BoundingBox,
    positives: &PositiveSet,
    settings: &TrainSettings,
) -> Result<NegativeSet>
where
    S: EmbeddingSource + ?Sized,
{
    let target = target_count(positives.resolved.len(), settings.negative_ratio);
    let budget = target.saturating_mul(settings.attempts_per_sample);
    let positive_tiles: HashSet<TileKey> = positives.tiles();
    let mut rng = StdRng::seed_from_u64(settings.seed);
    let mut set = NegativeSet { target, ..NegativeSet::default() };

    while set.examples.len() < target && set.attempts < budget {
        set.attempts += 1;
        let coord = Coord::new(
            rng.gen_range(region.min_lon..=region.max_lon),
            rng.gen_range(region.min_lat..=region.max_lat),
        );
        let tile = source.tile_key(coord);
        if positive_tiles.contains(&tile) {
            continue;
        }
        if positives.resolved.iter().any(|p| p.distance_deg(&coord) <= settings.min_distance_deg) {
            continue;
        }
        match source.embedding(coord) {
            Ok(vector) => {
                set.examples.push(TrainingExample { vector, label: Label::Negative, tile });
                set.coords.push(coord);
            }
            Err(e) if e.is_tile_not_found() => set.missing += 1,
            Err(e) => return Err(e),
        }
    }

    if set.is_underfilled() {
        warn!(
            sampled = set.examples.len(),
            target,
            attempts = set.attempts,
            "negative sampling budget exhausted; continuing with an under-filled background set"
        );
    }
    info!(negatives = set.examples.len(), attempts = set.attempts, missing = set.missing, "negatives sampled");
    Ok(set)
}
