//! habitat-scan
//!
//! Scores every grid cell of a region with a trained habitat model and turns
//! the scores into the persisted candidate artifact. `pipeline` wires training,
//! scanning and extraction together for one species.
pub mod extractor;
pub mod pipeline;
pub mod scanner;

pub use extractor::{CandidateExtractor, Provenance};
pub use pipeline::{run_pipeline, RunRequest, RunSummary};
pub use scanner::{RegionScanner, ScanOutput};
