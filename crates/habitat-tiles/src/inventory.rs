use std::path::Path;

use habitat_core::types::{BoundingBox, TileKey};

use crate::format::parse_tile_file_name;

/// Tiles present on disk and the extent they cover.
#[derive(Debug, Clone, Default)]
pub struct TileInventory {
    pub keys: Vec<TileKey>,
    pub bounds: Option<BoundingBox>,
}

/// Lists tile files anywhere under `dir`. Unreadable entries are skipped.
pub fn inventory(dir: &Path, tile_size: f64) -> TileInventory {
    let mut keys: Vec<TileKey> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.file_name().to_str().and_then(parse_tile_file_name))
        .collect();
    keys.sort();
    keys.dedup();
    let bounds = bounds_of(&keys, tile_size);
    TileInventory { keys, bounds }
}

fn bounds_of(keys: &[TileKey], tile_size: f64) -> Option<BoundingBox> {
    let min_x = keys.iter().map(|k| k.x).min()?;
    let max_x = keys.iter().map(|k| k.x).max()?;
    let min_y = keys.iter().map(|k| k.y).min()?;
    let max_y = keys.iter().map(|k| k.y).max()?;
    BoundingBox::new(
        min_x as f64 * tile_size,
        min_y as f64 * tile_size,
        (max_x + 1) as f64 * tile_size,
        (max_y + 1) as f64 * tile_size,
    )
    .ok()
}
