//! Standardized k-nearest-neighbours habitat classifier.
//!
//! - Inputs are z-scored with the training mean and population std; components
//!   with zero variance keep scale 1.
//! - `k = min(neighbors, max(1, n / 2))`.
//! - Votes are weighted by inverse Euclidean distance. When any of the k
//!   neighbours sits at distance 0 only those neighbours vote, equally.
//! - Neighbour ties are broken by training order, so predictions are a pure
//!   function of the training set and `k`.
use std::cmp::Ordering;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use habitat_core::artifact::{read_artifact, write_json_atomic};
use habitat_core::species::{species_dir, MODEL_FILE};
use habitat_core::traits::HabitatModel;
use habitat_core::types::Label;
use habitat_core::{Error, Result};

use crate::dataset::TrainingSet;

pub const MODEL_TYPE: &str = "knn";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    #[allow(clippy::cast_precision_loss)]
    fn fit(set: &TrainingSet) -> Self {
        let n = set.len() as f64;
        let mut mean = vec![0.0; set.dim()];
        for e in set.examples() {
            for (m, &v) in mean.iter_mut().zip(e.vector.iter()) {
                *m += f64::from(v);
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);
        let mut var = vec![0.0; set.dim()];
        for e in set.examples() {
            for ((s, &v), m) in var.iter_mut().zip(e.vector.iter()).zip(&mean) {
                *s += (f64::from(v) - m).powi(2);
            }
        }
        let scale = var.into_iter().map(|s| (s / n).sqrt()).map(|sd| if sd > f64::EPSILON { sd } else { 1.0 }).collect();
        Self { mean, scale }
    }

    fn transform(&self, vector: &[f32]) -> Vec<f64> {
        vector.iter().zip(&self.mean).zip(&self.scale).map(|((&v, m), s)| (f64::from(v) - m) / s).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnClassifier {
    model_type: String,
    model_id: String,
    trained_at: DateTime<Utc>,
    seed: u64,
    k: usize,
    dim: usize,
    scaler: StandardScaler,
    rows: Vec<Vec<f64>>,
    labels: Vec<Label>,
}

impl KnnClassifier {
    /// Fits the classifier. `seed` is recorded with the model and folded into
    /// its id; the fit itself draws no randomness.
    pub fn train(set: &TrainingSet, neighbors: usize, seed: u64) -> Result<Self> {
        let first = set
            .examples()
            .first()
            .ok_or(Error::InsufficientTrainingData { resolved: 0, required: 1 })?;
        if set.examples().iter().all(|e| e.label == first.label) {
            return Err(Error::DegenerateTrainingSet { label: first.label });
        }
        if neighbors == 0 {
            return Err(Error::InvalidConfig("neighbors must be > 0".into()));
        }
        let k = neighbors.min((set.len() / 2).max(1));
        let scaler = StandardScaler::fit(set);
        let rows = set.examples().iter().map(|e| scaler.transform(&e.vector)).collect();
        let labels = set.examples().iter().map(|e| e.label).collect();
        let model_id = format!("{MODEL_TYPE}-{:016x}", set.fingerprint(&[k as u64, seed]));
        Ok(Self {
            model_type: MODEL_TYPE.to_string(),
            model_id,
            trained_at: Utc::now(),
            seed,
            k,
            dim: set.dim(),
            scaler,
            rows,
            labels,
        })
    }

    pub fn k(&self) -> usize { self.k }
    pub fn model_id_str(&self) -> &str { &self.model_id }
    pub fn trained_at(&self) -> DateTime<Utc> { self.trained_at }
    pub fn seed(&self) -> u64 { self.seed }
    pub fn n_examples(&self) -> usize { self.rows.len() }

    pub fn predict(&self, vector: &[f32]) -> Result<f64> {
        if vector.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: vector.len() });
        }
        let z = self.scaler.transform(vector);
        let mut neighbours: Vec<(f64, usize)> = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| (row.iter().zip(&z).map(|(a, b)| (a - b).powi(2)).sum::<f64>().sqrt(), i))
            .collect();
        let by_distance = |a: &(f64, usize), b: &(f64, usize)| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1));
        if self.k < neighbours.len() {
            neighbours.select_nth_unstable_by(self.k - 1, by_distance);
            neighbours.truncate(self.k);
        }

        let exact: Vec<usize> = neighbours.iter().filter(|(d, _)| *d == 0.0).map(|&(_, i)| i).collect();
        if !exact.is_empty() {
            let hits = exact.iter().filter(|&&i| self.labels[i].is_positive()).count();
            return Ok(ratio(hits as f64, exact.len() as f64));
        }
        let (mut positive, mut total) = (0.0, 0.0);
        for &(d, i) in &neighbours {
            let w = 1.0 / d;
            total += w;
            if self.labels[i].is_positive() {
                positive += w;
            }
        }
        Ok(ratio(positive, total))
    }

    pub fn save(&self, path: &Path) -> Result<()> { write_json_atomic(path, self) }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = read_artifact(path)?;
        let model: Self = serde_json::from_slice(&bytes).map_err(|e| Error::corrupt_artifact(path, e))?;
        model.check().map_err(|reason| Error::corrupt_artifact(path, reason))?;
        Ok(model)
    }

    /// Loads `<results_dir>/<slug>/model.json` for `species` in any spelling.
    pub fn load_for_species(results_dir: &Path, species: &str) -> Result<Self> {
        Self::load(&species_dir(results_dir, species).join(MODEL_FILE))
    }

    fn check(&self) -> std::result::Result<(), String> {
        if self.model_type != MODEL_TYPE {
            return Err(format!("model_type '{}' is not '{MODEL_TYPE}'", self.model_type));
        }
        if self.rows.is_empty() || self.rows.len() != self.labels.len() {
            return Err(format!("{} rows vs {} labels", self.rows.len(), self.labels.len()));
        }
        if self.k == 0 || self.k > self.rows.len() {
            return Err(format!("k={} with {} rows", self.k, self.rows.len()));
        }
        if self.scaler.mean.len() != self.dim || self.scaler.scale.len() != self.dim {
            return Err("scaler does not match model dimension".into());
        }
        if self.rows.iter().any(|r| r.len() != self.dim) {
            return Err("training row does not match model dimension".into());
        }
        Ok(())
    }
}

fn ratio(part: f64, whole: f64) -> f64 {
    match whole.partial_cmp(&0.0) {
        Some(Ordering::Greater) => (part / whole).clamp(0.0, 1.0),
        _ => 0.0,
    }
}

impl HabitatModel for KnnClassifier {
    fn model_type(&self) -> &str { &self.model_type }
    fn model_id(&self) -> &str { &self.model_id }
    fn dim(&self) -> usize { self.dim }
    fn predict_proba(&self, vector: &[f32]) -> Result<f64> { self.predict(vector) }
}
