//! Region scan: a parallel map over grid cells.
//!
//! Cells are independent. Each worker resolves its cell through the tile store
//! (the only shared mutable state, behind its own lock) and scores it with the
//! read-only model. Cells without an embedding are counted as invalid and
//! never imputed. Any other error aborts the scan.
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::info;

use habitat_core::config::ScanSettings;
use habitat_core::grid::Grid;
use habitat_core::traits::{EmbeddingSource, HabitatModel};
use habitat_core::types::{BoundingBox, ScoredPoint};
use habitat_core::{Error, Result};

/// Unfiltered scan result.
#[derive(Debug, Clone)]
pub struct ScanOutput {
    pub grid: Grid,
    /// Valid, scored cells in grid order.
    pub points: Vec<ScoredPoint>,
    pub total_grid_points: usize,
    pub valid_grid_points: usize,
}

pub struct RegionScanner<'a, S: ?Sized, M: ?Sized> {
    source: &'a S,
    model: &'a M,
    workers: Option<usize>,
    progress: bool,
}

impl<'a, S, M> RegionScanner<'a, S, M>
where
    S: EmbeddingSource + ?Sized,
    M: HabitatModel + ?Sized,
{
    pub fn new(source: &'a S, model: &'a M) -> Self { Self { source, model, workers: None, progress: false } }

    pub fn from_settings(source: &'a S, model: &'a M, settings: &ScanSettings) -> Self {
        Self::new(source, model).with_workers(settings.workers).with_progress(settings.progress)
    }

    /// Dedicated pool of `n` threads; `None` uses the global rayon pool.
    pub fn with_workers(mut self, workers: Option<usize>) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn scan(&self, bbox: BoundingBox, resolution: f64) -> Result<ScanOutput> {
        if self.model.dim() != self.source.dim() {
            return Err(Error::DimensionMismatch { expected: self.model.dim(), actual: self.source.dim() });
        }
        let grid = Grid::new(bbox, resolution)?;
        let total = grid.len();
        info!(%bbox, resolution, cols = grid.cols(), rows = grid.rows(), total, "scanning region");

        let pb = self.progress_bar(total as u64);
        let scored = match self.workers {
            Some(n) => rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| Error::InvalidConfig(format!("scan worker pool: {e}")))?
                .install(|| self.score_all(&grid, &pb)),
            None => self.score_all(&grid, &pb),
        }?;
        pb.finish_and_clear();

        let points: Vec<ScoredPoint> = scored.into_iter().flatten().collect();
        let valid = points.len();
        info!(total, valid, invalid = total - valid, "scan complete");
        Ok(ScanOutput { grid, points, total_grid_points: total, valid_grid_points: valid })
    }

    fn score_all(&self, grid: &Grid, pb: &ProgressBar) -> Result<Vec<Option<ScoredPoint>>> {
        (0..grid.len())
            .into_par_iter()
            .map(|i| {
                let coord = grid.center(i);
                let point = match self.source.embedding(coord) {
                    Ok(vector) => Some(ScoredPoint { coord, probability: self.model.predict_proba(&vector)? }),
                    Err(e) if e.is_tile_not_found() => None,
                    Err(e) => return Err(e),
                };
                pb.inc(1);
                Ok(point)
            })
            .collect()
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} cells ({percent}%)",
        ) {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}
