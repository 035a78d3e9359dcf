//! Granule band access.
//!
//! A granule is one revisit of a tile. Its bands are never read up front: callers get one
//! [`BandTask`] per band and resolve each independently, so a fill worker only ever holds a
//! single band of a single revisit in memory.

use eoflow_core::error::{EoflowError, Result};
use eoflow_core::models::{Band, Revisit, UpsampleKernel};
use eoflow_core::ports::{join_path, ByteStore};
use ndarray::Array2;

use crate::decode::BandDecoder;
use crate::resize::{upsample_band, Kernel};

/// One band of one granule, resolvable on its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandTask {
    /// Position of the band in the requested band list
    pub band_index: usize,
    pub band: Band,
    /// Full source path of the encoded band image
    pub path: String,
}

/// Lazily read band stack of one revisit
#[derive(Debug, Clone)]
pub struct Granule {
    pub tile: String,
    pub granule_id: String,
    pub product_id: String,
    pub bands: Vec<Band>,
    pub kernel: Kernel,

    /// Side of the 10 m grid every band is brought onto
    pub grid_side: usize,

    /// Granule directory under the source root
    prefix: String,

    /// Sensing timestamp segment of band file names
    datatake: String,
}

impl Granule {
    /// Describe the granule of a revisit
    pub fn new(
        tile: &str,
        revisit: &Revisit,
        bands: &[Band],
        upsample: Option<UpsampleKernel>,
        source_root: &str,
        grid_side: usize,
    ) -> Result<Self> {
        if tile.len() != 5 {
            return Err(EoflowError::InvalidTile {
                code: tile.to_string(),
                reason: "expected a five character code such as 30UXC".to_string(),
            });
        }

        let datatake = revisit.product_id.split('_').nth(2).ok_or_else(|| {
            EoflowError::ConfigInvalid {
                key: "product_id".to_string(),
                reason: format!("cannot find the sensing segment in {}", revisit.product_id),
            }
        })?;

        let prefix = [
            "L2",
            "tiles",
            &tile[0..2],
            &tile[2..3],
            &tile[3..5],
            &format!("{}.SAFE", revisit.product_id),
            "GRANULE",
            &revisit.granule_id,
        ]
        .iter()
        .fold(source_root.to_string(), |acc, segment| join_path(&acc, segment));

        Ok(Self {
            tile: tile.to_string(),
            granule_id: revisit.granule_id.clone(),
            product_id: revisit.product_id.clone(),
            bands: bands.to_vec(),
            kernel: Kernel::for_upsample(upsample),
            grid_side,
            prefix,
            datatake: datatake.to_string(),
        })
    }

    /// Source path of one band image
    pub fn band_path(&self, band: Band, extension: &str) -> String {
        let resolution = band.resolution().label();
        let file_name = format!(
            "T{}_{}_{}_{}.{}",
            self.tile,
            self.datatake,
            band.code(),
            resolution,
            extension
        );
        join_path(&join_path(&self.prefix, &format!("IMG_DATA/R{}", resolution)), &file_name)
    }

    /// One task per requested band, in band order
    pub fn band_tasks(&self, extension: &str) -> Vec<BandTask> {
        self.bands
            .iter()
            .enumerate()
            .map(|(band_index, &band)| BandTask {
                band_index,
                band,
                path: self.band_path(band, extension),
            })
            .collect()
    }

    /// Fetch, decode and resample one band onto the 10 m grid
    pub fn read_band(
        &self,
        task: &BandTask,
        store: &dyn ByteStore,
        decoder: &dyn BandDecoder,
    ) -> Result<Array2<u16>> {
        let fetch_error = |reason: String| EoflowError::BandFetch {
            granule_id: self.granule_id.clone(),
            band: task.band.code().to_string(),
            path: task.path.clone(),
            reason,
        };

        let bytes = store.read(&task.path).map_err(|e| fetch_error(e.to_string()))?;
        let native = decoder.decode(&task.path, &bytes)?;

        let factor = task.band.resolution().upsample_factor();
        let expected_native = self.grid_side / factor;
        if native.dim() != (expected_native, expected_native) {
            return Err(fetch_error(format!(
                "expected a {}x{} image at {}, got {:?}",
                expected_native,
                expected_native,
                task.band.resolution().label(),
                native.dim()
            )));
        }

        let band = upsample_band(&native, factor, self.kernel)?;
        if band.dim() != (self.grid_side, self.grid_side) {
            return Err(EoflowError::Shape(format!(
                "band {} of {} resampled to {:?}, expected {}x{}",
                task.band,
                self.granule_id,
                band.dim(),
                self.grid_side,
                self.grid_side
            )));
        }

        tracing::trace!(granule = %self.granule_id, band = %task.band, "Read band");
        Ok(band)
    }
}
