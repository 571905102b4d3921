//! habitat-core
//!
//! Domain types shared by the habitat pipeline crates: geographic primitives
//! and the scan grid, the error taxonomy, configuration, species-name
//! normalization and the persisted candidate artifact.
#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod artifact;
pub mod config;
pub mod error;
pub mod grid;
pub mod species;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
