use crate::error::Result;
use crate::types::{Coord, Embedding, TileKey};

/// Read-only lookup of the embedding covering a coordinate.
///
/// A location without data yields `Error::TileNotFound`; implementations
/// never substitute a zero vector.
pub trait EmbeddingSource: Send + Sync {
    fn dim(&self) -> usize;
    fn tile_size(&self) -> f64;
    fn embedding(&self, coord: Coord) -> Result<Embedding>;

    fn tile_key(&self, coord: Coord) -> TileKey { TileKey::containing(coord, self.tile_size()) }
}

/// A trained habitat classifier. Shared read-only across scan workers.
pub trait HabitatModel: Send + Sync {
    /// Fixed label written into every candidate feature (e.g. `knn`).
    fn model_type(&self) -> &str;
    /// Fingerprint of the training run that produced this model.
    fn model_id(&self) -> &str;
    fn dim(&self) -> usize;
    /// Probability in `[0, 1]` that `vector` is suitable habitat.
    fn predict_proba(&self, vector: &[f32]) -> Result<f64>;
}
