//! eoflow Raster - Band decoding, resampling and chunked storage
//!
//! This crate reads granule bands from a byte store, brings coarse bands onto
//! the 10 m tile grid with a separable resampling kernel, and stores band
//! blocks in a chunked array addressable one chip-sized chunk at a time.

pub mod chunked;
pub mod decode;
pub mod granule;
pub mod resize;

pub use chunked::ChunkedArray;
pub use decode::{BandDecoder, TiffBandDecoder};
pub use granule::{BandTask, Granule};
pub use resize::{resize, upsample_band, Kernel, ScaleFactor};
