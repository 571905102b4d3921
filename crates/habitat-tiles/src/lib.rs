//! habitat-tiles
//!
//! Read-only access to the pre-downloaded grid of embedding tiles. See `store`
//! for lookup and the per-run cache, `format` for the on-disk layout.
pub mod format;
pub mod inventory;
pub mod store;

pub use inventory::{inventory, TileInventory};
pub use store::TileStore;
