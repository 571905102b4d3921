//! GeoJSON documents exchanged with the dashboard layer.
//!
//! - `CandidateCollection`: scan result written by the extractor and served by
//!   the result cache. Shape and metadata invariants are checked on every read;
//!   anything that fails is `Error::CorruptArtifact`.
//! - Occurrence documents: the resolved positives written next to the
//!   candidates, and the occurrence input accepted by the pipeline (a bare
//!   `[[lon, lat], ...]` array or a Point FeatureCollection).
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{BoundingBox, Coord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureCollectionTag {
    FeatureCollection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureTag {
    Feature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointTag {
    Point,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointGeometry {
    #[serde(rename = "type")]
    pub kind: PointTag,
    pub coordinates: Coord,
}

impl PointGeometry {
    pub fn new(coord: Coord) -> Self { Self { kind: PointTag::Point, coordinates: coord } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateProperties {
    pub probability: f64,
    pub model_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateFeature {
    #[serde(rename = "type")]
    pub kind: FeatureTag,
    pub geometry: PointGeometry,
    pub properties: CandidateProperties,
}

impl CandidateFeature {
    pub fn new(coord: Coord, probability: f64, model_type: &str) -> Self {
        Self {
            kind: FeatureTag::Feature,
            geometry: PointGeometry::new(coord),
            properties: CandidateProperties { probability, model_type: model_type.to_string() },
        }
    }

    pub fn coord(&self) -> Coord { self.geometry.coordinates }
    pub fn probability(&self) -> f64 { self.properties.probability }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionMetadata {
    pub bbox: BoundingBox,
    pub resolution: f64,
    pub probability_threshold: f64,
    pub total_grid_points: usize,
    pub valid_grid_points: usize,
    pub n_candidates: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub species: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_occurrences: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateCollection {
    #[serde(rename = "type")]
    pub kind: FeatureCollectionTag,
    pub features: Vec<CandidateFeature>,
    pub metadata: CollectionMetadata,
}

impl CandidateCollection {
    pub fn new(features: Vec<CandidateFeature>, metadata: CollectionMetadata) -> Self {
        Self { kind: FeatureCollectionTag::FeatureCollection, features, metadata }
    }

    pub fn len(&self) -> usize { self.features.len() }
    pub fn is_empty(&self) -> bool { self.features.is_empty() }

    /// Checks the metadata counters against each other and the features.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let m = &self.metadata;
        if m.n_candidates != self.features.len() {
            return Err(format!("n_candidates={} but {} features", m.n_candidates, self.features.len()));
        }
        if m.valid_grid_points > m.total_grid_points {
            return Err(format!("valid_grid_points={} exceeds total_grid_points={}", m.valid_grid_points, m.total_grid_points));
        }
        if m.n_candidates > m.valid_grid_points {
            return Err(format!("n_candidates={} exceeds valid_grid_points={}", m.n_candidates, m.valid_grid_points));
        }
        if !(m.resolution.is_finite() && m.resolution > 0.0) {
            return Err(format!("resolution must be > 0, got {}", m.resolution));
        }
        if !(0.0..=1.0).contains(&m.probability_threshold) {
            return Err(format!("probability_threshold {} outside [0, 1]", m.probability_threshold));
        }
        for (i, f) in self.features.iter().enumerate() {
            let p = f.probability();
            if !(0.0..=1.0).contains(&p) {
                return Err(format!("feature {i}: probability {p} outside [0, 1]"));
            }
            if p < m.probability_threshold {
                return Err(format!("feature {i}: probability {p} below threshold {}", m.probability_threshold));
            }
            if !f.coord().is_finite() {
                return Err(format!("feature {i}: non-finite coordinates"));
            }
        }
        Ok(())
    }

    /// View keeping only features with `probability >= min_probability`.
    /// The receiver is left untouched.
    pub fn filtered(&self, min_probability: f64) -> CandidateCollection {
        let features: Vec<CandidateFeature> =
            self.features.iter().filter(|f| f.probability() >= min_probability).cloned().collect();
        let metadata = CollectionMetadata {
            probability_threshold: self.metadata.probability_threshold.max(min_probability),
            n_candidates: features.len(),
            ..self.metadata.clone()
        };
        CandidateCollection::new(features, metadata)
    }
}

/// Parses and validates a collection read from `path`.
pub fn parse_collection(bytes: &[u8], path: &Path) -> Result<CandidateCollection> {
    let collection: CandidateCollection =
        serde_json::from_slice(bytes).map_err(|e| Error::corrupt_artifact(path, e))?;
    collection.validate().map_err(|reason| Error::corrupt_artifact(path, reason))?;
    Ok(collection)
}

pub fn read_collection(path: &Path) -> Result<CandidateCollection> {
    let bytes = read_artifact(path)?;
    parse_collection(&bytes, path)
}

pub fn write_collection(path: &Path, collection: &CandidateCollection) -> Result<()> {
    collection
        .validate()
        .map_err(|reason| Error::InvalidInput(format!("refusing to write invalid collection: {reason}")))?;
    write_json_atomic(path, collection)
}

/// Reads an artifact, mapping a missing file to `ArtifactNotFound`.
pub fn read_artifact(path: &Path) -> Result<Vec<u8>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::ArtifactNotFound(path.to_path_buf())),
        Err(e) => Err(e.into()),
    }
}

/// Writes pretty JSON through a temp file in the target directory, so readers
/// never observe a half-written artifact.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, value)?;
    tmp.write_all(b"\n")?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccurrenceFeature {
    #[serde(rename = "type")]
    pub kind: FeatureTag,
    pub geometry: PointGeometry,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccurrenceCollection {
    #[serde(rename = "type")]
    pub kind: FeatureCollectionTag,
    pub features: Vec<OccurrenceFeature>,
}

impl OccurrenceCollection {
    pub fn from_coords(coords: &[Coord]) -> Self {
        let features = coords
            .iter()
            .map(|&c| OccurrenceFeature { kind: FeatureTag::Feature, geometry: PointGeometry::new(c), properties: serde_json::Map::new() })
            .collect();
        Self { kind: FeatureCollectionTag::FeatureCollection, features }
    }

    pub fn coords(&self) -> Vec<Coord> { self.features.iter().map(|f| f.geometry.coordinates).collect() }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OccurrenceInput {
    Pairs(Vec<Coord>),
    Collection(OccurrenceCollection),
}

/// Reads occurrence coordinates supplied by the occurrence-fetch collaborator.
pub fn read_occurrences(path: &Path) -> Result<Vec<Coord>> {
    let bytes = std::fs::read(path)?;
    let input: OccurrenceInput = serde_json::from_slice(&bytes).map_err(|e| {
        Error::InvalidInput(format!("{}: expected [[lon, lat], ...] or a Point FeatureCollection ({e})", path.display()))
    })?;
    let coords = match input {
        OccurrenceInput::Pairs(c) => c,
        OccurrenceInput::Collection(fc) => fc.coords(),
    };
    if let Some(bad) = coords.iter().find(|c| !c.is_finite()) {
        return Err(Error::InvalidInput(format!("{}: non-finite occurrence {bad:?}", path.display())));
    }
    Ok(coords)
}

pub fn write_occurrences(path: &Path, coords: &[Coord]) -> Result<()> {
    write_json_atomic(path, &OccurrenceCollection::from_coords(coords))
}
