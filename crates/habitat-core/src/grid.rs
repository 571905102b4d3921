//! Scan grid over a bounding box.
//!
//! Cells are aligned to the global lattice of `resolution` degrees, so a grid
//! with `resolution == tile_size` puts exactly one point at every tile center
//! regardless of where the box edges fall. The cell count depends only on the
//! box and the resolution.

use crate::error::{Error, Result};
use crate::types::{quantize_ceil, quantize_floor, BoundingBox, Coord};

#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    bbox: BoundingBox,
    resolution: f64,
    col0: i64,
    row0: i64,
    cols: usize,
    rows: usize,
    len: usize,
}

impl Grid {
    pub fn new(bbox: BoundingBox, resolution: f64) -> Result<Self> {
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(Error::InvalidConfig(format!("grid resolution must be > 0, got {resolution}")));
        }
        let too_fine = || Error::InvalidInput(format!("{bbox} at resolution {resolution} has too many grid cells"));
        let (col0, cols) = span(bbox.min_lon, bbox.max_lon, resolution).ok_or_else(too_fine)?;
        let (row0, rows) = span(bbox.min_lat, bbox.max_lat, resolution).ok_or_else(too_fine)?;
        let len = cols.checked_mul(rows).ok_or_else(too_fine)?;
        Ok(Self { bbox, resolution, col0, row0, cols, rows, len })
    }

    pub fn bbox(&self) -> BoundingBox { self.bbox }
    pub fn resolution(&self) -> f64 { self.resolution }
    pub fn cols(&self) -> usize { self.cols }
    pub fn rows(&self) -> usize { self.rows }
    pub fn len(&self) -> usize { self.len }
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Center of the cell at row-major `index` (south to north, west to east).
    pub fn center(&self, index: usize) -> Coord {
        let row = (index / self.cols) as i64;
        let col = (index % self.cols) as i64;
        Coord::new(
            (self.col0 + col) as f64 * self.resolution + self.resolution / 2.0,
            (self.row0 + row) as f64 * self.resolution + self.resolution / 2.0,
        )
    }

    pub fn centers(&self) -> impl Iterator<Item = Coord> + '_ { (0..self.len()).map(|i| self.center(i)) }
}

/// First lattice index and number of cells covering `[min, max]`. A
/// zero-width extent still covers the single cell it falls in. `None` when
/// the lattice indices leave the integer range.
fn span(min: f64, max: f64, step: f64) -> Option<(i64, usize)> {
    let first = quantize_floor(min, step);
    let end = quantize_ceil(max, step);
    let cells = usize::try_from(end.checked_sub(first)?.max(1)).ok()?;
    Some((first, cells))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(a: f64, b: f64, c: f64, d: f64) -> BoundingBox { BoundingBox::new(a, b, c, d).unwrap() }

    #[test]
    fn single_tile_box_has_one_point_at_tile_center() {
        let g = Grid::new(bbox(0.0, 52.0, 0.1, 52.1), 0.1).unwrap();
        assert_eq!(g.len(), 1);
        let c = g.center(0);
        assert!((c.lon - 0.05).abs() < 1e-9 && (c.lat - 52.05).abs() < 1e-9);
    }

    #[test]
    fn unaligned_box_counts_every_touched_cell() {
        // cambridge: lon 0.03..0.22 touches 3 columns, lat 52.13..52.29 touches 2 rows
        let g = Grid::new(bbox(0.03, 52.13, 0.22, 52.29), 0.1).unwrap();
        assert_eq!((g.cols(), g.rows()), (3, 2));
        assert_eq!(g.centers().count(), 6);
    }

    #[test]
    fn finer_resolution_multiplies_cells() {
        let g = Grid::new(bbox(0.0, 0.0, 0.3, 0.2), 0.05).unwrap();
        assert_eq!((g.cols(), g.rows()), (6, 4));
    }

    #[test]
    fn degenerate_box_covers_one_cell() {
        let g = Grid::new(bbox(0.12, 0.12, 0.12, 0.12), 0.1).unwrap();
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn overflowing_cell_count_is_an_error() {
        let err = Grid::new(bbox(-180.0, -90.0, 180.0, 90.0), 1e-9).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)), "got {err:?}");
        assert!(Grid::new(bbox(-180.0, -90.0, 180.0, 90.0), 1e-300).is_err());
    }

    #[test]
    fn rejects_non_positive_resolution() {
        assert!(Grid::new(bbox(0.0, 0.0, 1.0, 1.0), 0.0).is_err());
    }
}
