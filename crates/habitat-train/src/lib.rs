//! habitat-train
//!
//! Learns a habitat signature: resolves occurrences into positive examples,
//! samples background negatives from the region, and fits the classifier.
pub mod classifier;
pub mod dataset;
pub mod negatives;
pub mod occurrences;

use tracing::info;

use habitat_core::config::TrainSettings;
use habitat_core::traits::EmbeddingSource;
use habitat_core::types::{BoundingBox, Coord};
use habitat_core::Result;

pub use classifier::KnnClassifier;
pub use dataset::TrainingSet;
pub use negatives::{sample_negatives, NegativeSet};
pub use occurrences::{build_positives, PositiveSet};

/// Output of one training run. The model is immutable from here on.
pub struct TrainingRun {
    pub model: KnnClassifier,
    pub positives: PositiveSet,
    pub negatives: NegativeSet,
}

/// Runs positives -> negatives -> fit for one species over `region`.
pub fn train_from_occurrences<S>(
    source: &S,
    occurrences: &[Coord],
    region: BoundingBox,
    settings: &TrainSettings,
) -> Result<TrainingRun>
where
    S: EmbeddingSource + ?Sized,
{
    let positives = build_positives(source, occurrences, settings.min_positives)?;
    let negatives = sample_negatives(source, region, &positives, settings)?;
    let set = TrainingSet::new(positives.examples.clone(), negatives.examples.clone())?;
    info!(positives = set.n_positive(), negatives = set.n_negative(), "training set assembled");
    let model = KnnClassifier::train(&set, settings.neighbors, settings.seed)?;
    info!(model_id = model.model_id_str(), k = model.k(), "classifier trained");
    Ok(TrainingRun { model, positives, negatives })
}
