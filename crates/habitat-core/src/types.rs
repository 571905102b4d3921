//! Geographic and training domain types.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Guards floor/ceil quantization against values that land a hair below a
/// cell boundary (`0.3 / 0.1 == 2.9999999999999996`).
pub const QUANT_EPS: f64 = 1e-9;

/// Embedding vectors are shared between the tile cache, training examples and
/// the scanner without copying.
pub type Embedding = Arc<[f32]>;

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coord {
    pub lon: f64,
    pub lat: f64,
}

impl Coord {
    pub fn new(lon: f64, lat: f64) -> Self { Self { lon, lat } }

    pub fn is_finite(&self) -> bool { self.lon.is_finite() && self.lat.is_finite() }

    /// Planar distance in degrees; only used for short-range exclusion checks.
    pub fn distance_deg(&self, other: &Coord) -> f64 {
        ((self.lon - other.lon).powi(2) + (self.lat - other.lat).powi(2)).sqrt()
    }
}

impl From<[f64; 2]> for Coord {
    fn from([lon, lat]: [f64; 2]) -> Self { Self { lon, lat } }
}

impl From<Coord> for [f64; 2] {
    fn from(c: Coord) -> Self { [c.lon, c.lat] }
}

/// Integer-quantized origin of an embedding tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "[i64; 2]", into = "[i64; 2]")]
pub struct TileKey {
    pub x: i64,
    pub y: i64,
}

impl TileKey {
    pub fn new(x: i64, y: i64) -> Self { Self { x, y } }

    /// Key of the tile containing `coord` for tiles of `tile_size` degrees.
    pub fn containing(coord: Coord, tile_size: f64) -> Self {
        Self { x: quantize_floor(coord.lon, tile_size), y: quantize_floor(coord.lat, tile_size) }
    }

    /// Center of this tile.
    pub fn center(&self, tile_size: f64) -> Coord {
        Coord::new((self.x as f64 + 0.5) * tile_size, (self.y as f64 + 0.5) * tile_size)
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "tile({}, {})", self.x, self.y) }
}

impl From<[i64; 2]> for TileKey {
    fn from([x, y]: [i64; 2]) -> Self { Self { x, y } }
}

impl From<TileKey> for [i64; 2] {
    fn from(k: TileKey) -> Self { [k.x, k.y] }
}

#[allow(clippy::cast_possible_truncation)]
pub fn quantize_floor(value: f64, step: f64) -> i64 { (value / step + QUANT_EPS).floor() as i64 }

#[allow(clippy::cast_possible_truncation)]
pub fn quantize_ceil(value: f64, step: f64) -> i64 { (value / step - QUANT_EPS).ceil() as i64 }

/// `[min_lon, min_lat, max_lon, max_lat]`, validated on construction and on
/// deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Result<Self, Error> {
        let bbox = Self { min_lon, min_lat, max_lon, max_lat };
        if ![min_lon, min_lat, max_lon, max_lat].iter().all(|v| v.is_finite()) {
            return Err(Error::InvalidInput(format!("bbox has non-finite bounds: {bbox}")));
        }
        if min_lon > max_lon || min_lat > max_lat {
            return Err(Error::InvalidInput(format!("bbox min exceeds max: {bbox}")));
        }
        if min_lon < -180.0 || max_lon > 180.0 || min_lat < -90.0 || max_lat > 90.0 {
            return Err(Error::InvalidInput(format!("bbox outside WGS84 range: {bbox}")));
        }
        Ok(bbox)
    }

    pub fn contains(&self, c: Coord) -> bool {
        c.lon >= self.min_lon && c.lon <= self.max_lon && c.lat >= self.min_lat && c.lat <= self.max_lat
    }

    pub fn width(&self) -> f64 { self.max_lon - self.min_lon }
    pub fn height(&self) -> f64 { self.max_lat - self.min_lat }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}, {}]", self.min_lon, self.min_lat, self.max_lon, self.max_lat)
    }
}

impl TryFrom<[f64; 4]> for BoundingBox {
    type Error = Error;
    fn try_from([a, b, c, d]: [f64; 4]) -> Result<Self, Error> { Self::new(a, b, c, d) }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self { [b.min_lon, b.min_lat, b.max_lon, b.max_lat] }
}

/// Parses `min_lon,min_lat,max_lon,max_lat`.
impl FromStr for BoundingBox {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| Error::InvalidInput(format!("bbox '{s}': {e}")))?;
        match parts.as_slice() {
            [a, b, c, d] => Self::new(*a, *b, *c, *d),
            _ => Err(Error::InvalidInput(format!("bbox '{s}' needs 4 comma-separated numbers"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Positive,
    Negative,
}

impl Label {
    pub fn is_positive(self) -> bool { matches!(self, Label::Positive) }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self { Label::Positive => "positive", Label::Negative => "negative" })
    }
}

/// An embedding paired with its class and the tile it was read from.
#[derive(Debug, Clone)]
pub struct TrainingExample {
    pub vector: Embedding,
    pub label: Label,
    pub tile: TileKey,
}

/// A grid point that resolved to an embedding and was scored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredPoint {
    pub coord: Coord,
    pub probability: f64,
}
