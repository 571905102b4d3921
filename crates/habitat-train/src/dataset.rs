use std::collections::HashSet;
use std::hash::Hasher;

use twox_hash::XxHash64;

use habitat_core::types::{Label, TileKey, TrainingExample};
use habitat_core::{Error, Result};

/// Combined positive and negative examples with a consistent dimensionality.
#[derive(Debug, Clone)]
pub struct TrainingSet {
    examples: Vec<TrainingExample>,
    dim: usize,
}

impl TrainingSet {
    /// Negatives whose tile also holds a positive are discarded, so no tile
    /// carries both labels.
    pub fn new(positives: Vec<TrainingExample>, negatives: Vec<TrainingExample>) -> Result<Self> {
        let positive_tiles: HashSet<TileKey> = positives.iter().map(|e| e.tile).collect();
        let mut examples = positives;
        examples.extend(negatives.into_iter().filter(|e| !positive_tiles.contains(&e.tile)));
        Self::from_examples(examples)
    }

    pub fn from_examples(examples: Vec<TrainingExample>) -> Result<Self> {
        let dim = examples.first().map_or(0, |e| e.vector.len());
        if let Some(bad) = examples.iter().find(|e| e.vector.len() != dim) {
            return Err(Error::DimensionMismatch { expected: dim, actual: bad.vector.len() });
        }
        Ok(Self { examples, dim })
    }

    pub fn examples(&self) -> &[TrainingExample] { &self.examples }
    pub fn dim(&self) -> usize { self.dim }
    pub fn len(&self) -> usize { self.examples.len() }
    pub fn is_empty(&self) -> bool { self.examples.is_empty() }
    pub fn n_positive(&self) -> usize { self.examples.iter().filter(|e| e.label.is_positive()).count() }
    pub fn n_negative(&self) -> usize { self.len() - self.n_positive() }

    /// Stable fingerprint of vectors, labels and `extra` hyperparameters.
    pub fn fingerprint(&self, extra: &[u64]) -> u64 {
        let mut hasher = XxHash64::with_seed(0);
        hasher.write_usize(self.dim);
        for &x in extra {
            hasher.write_u64(x);
        }
        for e in &self.examples {
            hasher.write_u8(u8::from(e.label == Label::Positive));
            for v in e.vector.iter() {
                hasher.write_u32(v.to_bits());
            }
        }
        hasher.finish()
    }
}
