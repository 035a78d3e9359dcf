pub mod band;
pub mod geometry;
pub mod index;
pub mod options;
pub mod revisit;

pub use band::{Band, BandResolution};
pub use geometry::{Crs, GeoTransform};
pub use index::{ArchiveIndex, ChipMetaData, ChipStats, DataSetIndex};
pub use options::{CloudMask, CompositeStrategy, Constellation, LoaderOutput, UpsampleKernel};
pub use revisit::{parse_sensing_time, Revisit};
