//! eoflow Archive - Tile materialization
//!
//! An [`Archive`] owns one tile's revisits. It fills a chunked array with every
//! revisit's bands, masks no-data and out-of-scope pixels, composites each chip
//! over time and stores the chip images, target rasters and index records.

pub mod aggregate;
pub mod archive;
pub mod artifacts;
pub mod composite;
pub mod mask;
pub mod stats;

pub use aggregate::{extend_dataset_index, merge_archive_indices};
pub use archive::{Archive, ArchiveOptions, ArchiveState};
pub use mask::TileMask;
