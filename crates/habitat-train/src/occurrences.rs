use std::collections::HashSet;

use tracing::{info, warn};

use habitat_core::traits::EmbeddingSource;
use habitat_core::types::{Coord, Label, TileKey, TrainingExample};
use habitat_core::{Error, Result};

/// Occurrences that resolved to an embedding.
#[derive(Debug, Clone, Default)]
pub struct PositiveSet {
    /// One example per distinct tile.
    pub examples: Vec<TrainingExample>,
    /// Every occurrence that resolved, in input order.
    pub resolved: Vec<Coord>,
    /// Occurrences whose tile has no cached embedding.
    pub dropped: usize,
}

impl PositiveSet {
    pub fn tiles(&self) -> HashSet<TileKey> { self.examples.iter().map(|e| e.tile).collect() }
}

/// Resolves raw occurrences through the tile store.
///
/// Occurrences without a tile are dropped and counted. Fails with
/// `InsufficientTrainingData` when fewer than `min_positives` resolve.
pub fn build_positives<S>(source: &S, occurrences: &[Coord], min_positives: usize) -> Result<PositiveSet>
where
    S: EmbeddingSource + ?Sized,
{
    let mut set = PositiveSet::default();
    let mut seen = HashSet::new();
    for &coord in occurrences {
        match source.embedding(coord) {
            Ok(vector) => {
                set.resolved.push(coord);
                let tile = source.tile_key(coord);
                if seen.insert(tile) {
                    set.examples.push(TrainingExample { vector, label: Label::Positive, tile });
                }
            }
            Err(e) if e.is_tile_not_found() => set.dropped += 1,
            Err(e) => return Err(e),
        }
    }
    if set.dropped > 0 {
        warn!(dropped = set.dropped, total = occurrences.len(), "occurrences without a cached tile were dropped");
    }
    info!(resolved = set.resolved.len(), tiles = set.examples.len(), "positives resolved");
    if set.resolved.len() < min_positives {
        return Err(Error::InsufficientTrainingData { resolved: set.resolved.len(), required: min_positives });
    }
    Ok(set)
}
