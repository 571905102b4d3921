//! On-disk tile layout: one JSON document per tile, `tile_<x>_<y>.json`,
//! holding the tile key and its embedding vector.
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use habitat_core::types::TileKey;

pub const TILE_PREFIX: &str = "tile_";
pub const TILE_EXT: &str = "json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileFile {
    pub key: TileKey,
    pub vector: Vec<f32>,
}

pub fn tile_file_name(key: TileKey) -> String { format!("{}{}_{}.{}", TILE_PREFIX, key.x, key.y, TILE_EXT) }

pub fn tile_path(dir: &Path, key: TileKey) -> PathBuf { dir.join(tile_file_name(key)) }

/// Inverse of `tile_file_name`; `None` for anything that is not a tile file.
pub fn parse_tile_file_name(name: &str) -> Option<TileKey> {
    let stem = name.strip_prefix(TILE_PREFIX)?.strip_suffix(TILE_EXT)?.strip_suffix('.')?;
    // x may carry a leading '-', so look for the separator after the first char
    let split = stem.get(1..)?.find('_')? + 1;
    let x = stem[..split].parse().ok()?;
    let y = stem[split + 1..].parse().ok()?;
    Some(TileKey::new(x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_round_trip_including_negative_keys() {
        for key in [TileKey::new(0, 521), TileKey::new(-3, -17), TileKey::new(12, -1)] {
            assert_eq!(parse_tile_file_name(&tile_file_name(key)), Some(key));
        }
    }

    #[test]
    fn foreign_files_are_ignored() {
        assert_eq!(parse_tile_file_name("grid_0.05_52.15.npy"), None);
        assert_eq!(parse_tile_file_name("tile_1.json"), None);
        assert_eq!(parse_tile_file_name("tile_a_b.json"), None);
    }
}
