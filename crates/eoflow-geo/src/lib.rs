//! eoflow Geo - Tiles, target geometries and chip layout
//!
//! This crate handles the geospatial side of materialization: deriving tile
//! footprints from MGRS codes, loading and reprojecting target geometries,
//! laying out chip windows on the tile grid and rasterizing targets.

pub mod chips;
pub mod index;
pub mod rasterize;
pub mod targets;
pub mod tile;
pub mod transform;

pub use chips::{chip_windows, Chip, PixelWindow};
pub use index::TargetIndex;
pub use rasterize::burn_targets;
pub use targets::{load_targets, Target, TargetSet};
pub use tile::{normalize_tile_code, Tile, TileCache, TileGrid};
