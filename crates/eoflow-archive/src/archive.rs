//! Tile archive: fill, mask, composite and materialize one tile.
//!
//! The stages are ordered method calls. Each checks the archive state and fails with a
//! precondition error when called out of order, so a caller can never composite an
//! unfilled array or mask a half-written one.

use eoflow_core::config::DataSpec;
use eoflow_core::error::{EoflowError, Result};
use eoflow_core::models::{ArchiveIndex, ChipMetaData, DataSetIndex, Revisit};
use eoflow_core::ports::{join_path, ByteStore};
use eoflow_geo::rasterize::value_counts;
use eoflow_geo::{
    burn_targets, chip_windows, load_targets, normalize_tile_code, Chip, TargetIndex, TargetSet, Tile,
    TileGrid,
};
use eoflow_raster::{BandDecoder, BandTask, ChunkedArray, Granule, TiffBandDecoder};
use ndarray::{s, Array3, Array4};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::fmt;
use std::sync::Arc;

use crate::aggregate;
use crate::artifacts;
use crate::composite::{self, nan_chip};
use crate::mask::{chip_mask, TileMask};
use crate::stats::chip_stats;

/// Pipeline position of an archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ArchiveState {
    Constructed,
    Filled,
    Masked,
    Materialized,
}

impl ArchiveState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveState::Constructed => "constructed",
            ArchiveState::Filled => "filled",
            ArchiveState::Masked => "masked",
            ArchiveState::Materialized => "materialized",
        }
    }
}

impl fmt::Display for ArchiveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Knobs that are not part of the dataset specification
#[derive(Clone)]
pub struct ArchiveOptions {
    /// Scopes artifacts and scratch data to `{store}/{run_id}`
    pub run_id: Option<String>,
    pub grid: TileGrid,
    pub decoder: Arc<dyn BandDecoder>,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self { run_id: None, grid: TileGrid::default(), decoder: Arc::new(TiffBandDecoder) }
    }
}

impl fmt::Debug for ArchiveOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveOptions")
            .field("run_id", &self.run_id)
            .field("grid", &self.grid)
            .field("decoder", &self.decoder.extension())
            .finish()
    }
}

/// All revisits of one tile, materialized into chips
pub struct Archive {
    spec: DataSpec,
    tile: Arc<Tile>,
    revisits: Vec<Revisit>,
    store: Arc<dyn ByteStore>,
    options: ArchiveOptions,

    /// Targets intersecting the tile, in the tile's UTM CRS
    targets: TargetSet,
    chips: Vec<Chip>,
    granules: Vec<Granule>,

    state: ArchiveState,
    array: Option<ChunkedArray>,
    mask: Option<TileMask>,
}

impl fmt::Debug for Archive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archive")
            .field("tile", &self.tile.code)
            .field("revisits", &self.revisits.len())
            .field("targets", &self.targets.len())
            .field("chips", &self.chips.len())
            .field("state", &self.state)
            .finish()
    }
}

impl Archive {
    pub fn new(
        spec: DataSpec,
        tile: Arc<Tile>,
        revisits: Vec<Revisit>,
        store: Arc<dyn ByteStore>,
    ) -> Result<Self> {
        Self::with_options(spec, tile, revisits, store, ArchiveOptions::default())
    }

    /// Build an archive: order revisits, clip targets to the tile and lay out chips
    pub fn with_options(
        spec: DataSpec,
        tile: Arc<Tile>,
        mut revisits: Vec<Revisit>,
        store: Arc<dyn ByteStore>,
        options: ArchiveOptions,
    ) -> Result<Self> {
        spec.validate()?;
        composite::ensure_supported(spec.composite)?;

        if let Some(r) = revisits.iter().find(|r| normalize_tile_code(&r.mgrs_tile) != tile.code) {
            return Err(EoflowError::RevisitMismatch {
                granule_id: r.granule_id.clone(),
                revisit_tile: r.mgrs_tile.clone(),
                tile: tile.code.clone(),
            });
        }
        Revisit::sort_by_sensing_time(&mut revisits);

        if spec.cloud_mask.as_ref().is_some_and(|m| !m.is_empty()) {
            tracing::warn!(tile = %tile.code, "Cloud masking is not implemented, ignoring cloud_mask");
        }

        let targets = load_targets(store.as_ref(), &spec.target_geofile)?
            .intersecting(&tile.wgs84_polygon)
            .to_crs(&tile.utm_crs)?;
        let chips = chip_windows(&tile, options.grid, &targets, spec.chipsize)?;

        let granules = revisits
            .iter()
            .map(|r| {
                Granule::new(
                    &tile.code,
                    r,
                    &spec.bands,
                    spec.upsample,
                    &spec.source_store,
                    options.grid.side_px,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(
            tile = %tile.code,
            revisits = revisits.len(),
            targets = targets.len(),
            chips = chips.len(),
            "Constructed archive"
        );

        Ok(Self {
            spec,
            tile,
            revisits,
            store,
            options,
            targets,
            chips,
            granules,
            state: ArchiveState::Constructed,
            array: None,
            mask: None,
        })
    }

    pub fn tile(&self) -> &Tile {
        &self.tile
    }

    /// Revisits ordered oldest first
    pub fn revisits(&self) -> &[Revisit] {
        &self.revisits
    }

    pub fn chips(&self) -> &[Chip] {
        &self.chips
    }

    pub fn granules(&self) -> &[Granule] {
        &self.granules
    }

    pub fn targets(&self) -> &TargetSet {
        &self.targets
    }

    pub fn state(&self) -> ArchiveState {
        self.state
    }

    pub fn mask_ref(&self) -> Option<&TileMask> {
        self.mask.as_ref()
    }

    /// Root for chips, targets and index documents
    pub fn store_root(&self) -> String {
        artifacts::store_root(&self.spec.dataset_store, self.options.run_id.as_deref())
    }

    /// Location of the chunked pixel array
    pub fn array_root(&self) -> String {
        let scratch = artifacts::store_root(&self.spec.scratch_root(), self.options.run_id.as_deref());
        join_path(&scratch, &format!("{}.zarr", self.tile.code))
    }

    fn require(&self, operation: &'static str, required: ArchiveState) -> Result<()> {
        if self.state != required {
            return Err(EoflowError::Precondition {
                operation,
                required: required.as_str(),
                actual: self.state.as_str(),
            });
        }
        Ok(())
    }

    /// Compositing reads the mask, so it is allowed once masked and after materializing
    fn require_masked(&self) -> Result<()> {
        if self.state < ArchiveState::Masked {
            return Err(EoflowError::Precondition {
                operation: "composite",
                required: ArchiveState::Masked.as_str(),
                actual: self.state.as_str(),
            });
        }
        Ok(())
    }

    fn pool(&self, workers: usize) -> Result<ThreadPool> {
        ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| EoflowError::WorkerPool(e.to_string()))
    }

    /// Store every band of every revisit into the chunked array.
    ///
    /// Work is split into (revisit, band) tasks on a small pool, so at most `workers.fill`
    /// full bands are in memory at once. The first failing task fails the whole fill.
    #[tracing::instrument(skip_all, fields(tile = %self.tile.code))]
    pub fn fill(&mut self) -> Result<()> {
        self.require("fill", ArchiveState::Constructed)?;

        let side = self.options.grid.side_px;
        let shape = [self.revisits.len(), self.spec.bands.len(), side, side];
        let array = ChunkedArray::create(
            Arc::clone(&self.store),
            &self.array_root(),
            shape,
            self.spec.chipsize,
        )?;

        let extension = self.options.decoder.extension().to_string();
        let tasks: Vec<(usize, BandTask)> = self
            .granules
            .iter()
            .enumerate()
            .flat_map(|(r, g)| g.band_tasks(&extension).into_iter().map(move |t| (r, t)))
            .collect();

        tracing::info!(tasks = tasks.len(), workers = self.spec.workers.fill, ?shape, "Filling chunked array");

        let store = self.store.as_ref();
        let decoder = self.options.decoder.as_ref();
        let granules = &self.granules;
        self.pool(self.spec.workers.fill)?.install(|| {
            tasks.par_iter().try_for_each(|(r, task)| {
                let band = granules[*r].read_band(task, store, decoder)?;
                array.write_band(*r, task.band_index, band.view())?;
                tracing::debug!(revisit = r, band = %task.band, "Stored band");
                Ok::<(), EoflowError>(())
            })
        })?;

        self.array = Some(array);
        self.state = ArchiveState::Filled;
        Ok(())
    }

    /// Mask no-data pixels of every chip. Pixels outside the chips stay masked.
    #[tracing::instrument(skip_all, fields(tile = %self.tile.code))]
    pub fn mask(&mut self) -> Result<()> {
        self.require("mask", ArchiveState::Filled)?;
        let array = self.filled_array()?;

        let masks = self.pool(self.spec.workers.chips)?.install(|| {
            self.chips
                .par_iter()
                .map(|chip| chip_mask(array, chip.window))
                .collect::<Result<Vec<_>>>()
        })?;

        let windows: Vec<_> = self.chips.iter().map(|c| c.window).collect();
        let mask = TileMask::new(
            self.revisits.len(),
            self.spec.chipsize,
            &windows,
            masks,
        )?;

        tracing::info!(chips = mask.chip_count(), "Masked chips");
        self.mask = Some(mask);
        self.state = ArchiveState::Masked;
        Ok(())
    }

    fn filled_array(&self) -> Result<&ChunkedArray> {
        self.array.as_ref().ok_or(EoflowError::Precondition {
            operation: "read pixels",
            required: ArchiveState::Filled.as_str(),
            actual: self.state.as_str(),
        })
    }

    fn tile_mask(&self) -> Result<&TileMask> {
        self.mask.as_ref().ok_or(EoflowError::Precondition {
            operation: "composite",
            required: ArchiveState::Masked.as_str(),
            actual: self.state.as_str(),
        })
    }

    /// Composite one chip into a `(bands, chipsize, chipsize)` image.
    ///
    /// Parts of the window past the tile edge and fully masked chips come out as NaN.
    pub fn composite_chip(&self, ii: usize) -> Result<Array3<f32>> {
        self.require_masked()?;
        let chip = self
            .chips
            .get(ii)
            .ok_or_else(|| EoflowError::Shape(format!("no chip {} in tile {}", ii, self.tile.code)))?;
        let mask = self.tile_mask()?;
        let array = self.filled_array()?;

        let bands = self.spec.bands.len();
        let size = self.spec.chipsize;
        if mask.chip_fully_masked(ii) {
            tracing::debug!(chip = ii, "Chip fully masked");
            return Ok(nan_chip(bands, size, size));
        }
        let chip_mask = mask.chip(ii).ok_or_else(|| EoflowError::Shape(format!("no mask for chip {}", ii)))?;

        let w = chip.window;
        let (rows, cols) = w.valid_extent(self.options.grid.side_px);
        let mut stack = Array4::<u16>::zeros((self.revisits.len(), bands, size, size));
        for r in 0..self.revisits.len() {
            for b in 0..bands {
                let block =
                    array.read_region(r, b, w.row_off..w.row_off + rows, w.col_off..w.col_off + cols)?;
                stack.slice_mut(s![r, b, ..rows, ..cols]).assign(&block);
            }
        }

        composite::composite(stack.view(), chip_mask, self.spec.composite)
    }

    /// Composite every chip, in chip order
    pub fn composite(&self) -> Result<Vec<Array3<f32>>> {
        self.require_masked()?;
        self.pool(self.spec.workers.chips)?
            .install(|| (0..self.chips.len()).into_par_iter().map(|ii| self.composite_chip(ii)).collect())
    }

    /// Store chip composites and target rasters and index them.
    ///
    /// Chips are processed on the chip pool; the first failing chip fails the call.
    #[tracing::instrument(skip_all, fields(tile = %self.tile.code))]
    pub fn materialize(&mut self) -> Result<ArchiveIndex> {
        self.require("materialize", ArchiveState::Masked)?;

        let root = self.store_root();
        self.store.mkdir(&join_path(&root, artifacts::CHIPS_DIR))?;
        self.store.mkdir(&join_path(&root, artifacts::TARGETS_DIR))?;

        let index = TargetIndex::new(&self.targets.targets);
        let chips = self.pool(self.spec.workers.chips)?.install(|| {
            self.chips
                .par_iter()
                .map(|chip| self.materialize_chip(chip, &index, &root))
                .collect::<Result<Vec<_>>>()
        })?;

        tracing::info!(chips = chips.len(), root = %root, "Materialized tile");
        self.state = ArchiveState::Materialized;
        Ok(ArchiveIndex { tile: self.tile.code.clone(), chips })
    }

    fn materialize_chip(&self, chip: &Chip, index: &TargetIndex<'_>, root: &str) -> Result<ChipMetaData> {
        let code = &self.tile.code;
        let store = self.store.as_ref();

        let image = self.composite_chip(chip.ii)?;
        let chip_path = artifacts::chip_path(root, code, chip.ii);
        artifacts::write_npy(store, &chip_path, &image)?;

        let size = self.spec.chipsize;
        let target = burn_targets(&index.intersecting(&chip.bounds), chip.transform, size, size);
        let target_path = artifacts::target_path(root, code, chip.ii);
        artifacts::write_npy(store, &target_path, &target)?;

        tracing::debug!(chip = chip.ii, "Stored chip");
        Ok(ChipMetaData {
            tile: code.clone(),
            chip_ii: chip.ii,
            chip_idx: ChipMetaData::chip_key(code, chip.ii),
            chip_path,
            chip_stats: chip_stats(image.view()),
            target_path,
            target_pxcount: value_counts(&target),
        })
    }

    /// Merge tile indices into a dataset index
    pub fn merge_archive_indices(indices: &[ArchiveIndex]) -> DataSetIndex {
        aggregate::merge_archive_indices(indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_order() {
        assert!(ArchiveState::Constructed < ArchiveState::Filled);
        assert!(ArchiveState::Masked < ArchiveState::Materialized);
        assert_eq!(ArchiveState::Masked.to_string(), "masked");
    }
}
