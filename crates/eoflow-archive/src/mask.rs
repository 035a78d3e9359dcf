//! Revisit masks.
//!
//! Only chips are ever composited, so the mask is kept per chip as a `(revisit, y, x)`
//! block. Every pixel outside the retained chips is masked.

use eoflow_core::error::{EoflowError, Result};
use eoflow_geo::PixelWindow;
use eoflow_raster::ChunkedArray;
use ndarray::{s, Array2, Array3, ArrayView3, Zip};

/// Mask for one chip: a pixel is masked where every band is zero or where the window
/// runs past the edge of the tile grid
pub fn chip_mask(array: &ChunkedArray, window: PixelWindow) -> Result<Array3<bool>> {
    let [revisits, bands, side, _] = array.shape();
    let (rows, cols) = window.valid_extent(side);

    let mut mask = Array3::from_elem((revisits, window.height, window.width), true);
    if rows == 0 || cols == 0 {
        return Ok(mask);
    }

    for r in 0..revisits {
        let mut nodata = Array2::from_elem((rows, cols), true);
        for b in 0..bands {
            let block = array.read_region(
                r,
                b,
                window.row_off..window.row_off + rows,
                window.col_off..window.col_off + cols,
            )?;
            Zip::from(&mut nodata).and(&block).for_each(|m, &v| *m &= v == 0);
        }
        mask.slice_mut(s![r, ..rows, ..cols]).assign(&nodata);
    }

    Ok(mask)
}

/// Sparse tile-wide mask built from per-chip masks
#[derive(Debug, Clone)]
pub struct TileMask {
    masks: Vec<Array3<bool>>,
}

impl TileMask {
    /// Assemble from chip windows and their masks, in chip order
    pub fn new(
        revisits: usize,
        chipsize: usize,
        windows: &[PixelWindow],
        masks: Vec<Array3<bool>>,
    ) -> Result<Self> {
        if windows.len() != masks.len() {
            return Err(EoflowError::Shape(format!(
                "{} chip windows but {} chip masks",
                windows.len(),
                masks.len()
            )));
        }
        if let Some(bad) = masks.iter().find(|m| m.dim() != (revisits, chipsize, chipsize)) {
            return Err(EoflowError::Shape(format!(
                "chip mask of shape {:?}, expected {:?}",
                bad.dim(),
                (revisits, chipsize, chipsize)
            )));
        }

        Ok(Self { masks })
    }

    /// Mask of one chip
    pub fn chip(&self, ii: usize) -> Option<ArrayView3<'_, bool>> {
        self.masks.get(ii).map(|m| m.view())
    }

    /// Whether every pixel of a chip is masked in every revisit
    pub fn chip_fully_masked(&self, ii: usize) -> bool {
        self.masks.get(ii).map(|m| m.iter().all(|&v| v)).unwrap_or(true)
    }

    pub fn chip_count(&self) -> usize {
        self.masks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eoflow_core::ports::ByteStore;
    use eoflow_store::MemoryStore;
    use std::sync::Arc;

    fn filled_array() -> ChunkedArray {
        let store: Arc<dyn ByteStore> = Arc::new(MemoryStore::new());
        // 2 revisits, 2 bands, 4x4 grid, 2x2 chunks
        let array = ChunkedArray::create(store, "scratch/T.zarr", [2, 2, 4, 4], 2).unwrap();

        let mut b0 = Array2::<u16>::from_elem((4, 4), 100);
        b0[[0, 0]] = 0;
        b0[[0, 1]] = 0;
        let mut b1 = Array2::<u16>::from_elem((4, 4), 200);
        b1[[0, 0]] = 0;
        array.write_band(0, 0, b0.view()).unwrap();
        array.write_band(0, 1, b1.view()).unwrap();
        // revisit 1 is never written and reads back as zeros
        array
    }

    #[test]
    fn test_chip_mask_requires_all_bands_zero() {
        let array = filled_array();
        let window = PixelWindow { row_off: 0, col_off: 0, height: 2, width: 2 };
        let mask = chip_mask(&array, window).unwrap();

        assert!(mask[[0, 0, 0]]);
        // Band 1 still has data at (0, 1)
        assert!(!mask[[0, 0, 1]]);
        assert!(!mask[[0, 1, 1]]);
        assert!(mask.slice(s![1, .., ..]).iter().all(|&v| v));
    }

    #[test]
    fn test_window_past_grid_edge_is_masked() {
        let array = filled_array();
        let window = PixelWindow { row_off: 2, col_off: 2, height: 4, width: 4 };
        let mask = chip_mask(&array, window).unwrap();

        assert_eq!(mask.dim(), (2, 4, 4));
        assert!(!mask[[0, 1, 1]]);
        assert!(mask[[0, 2, 0]]);
        assert!(mask[[0, 0, 3]]);
    }

    #[test]
    fn test_tile_mask_lookup() {
        let array = filled_array();
        let windows = vec![PixelWindow { row_off: 2, col_off: 0, height: 2, width: 2 }];
        let masks = vec![chip_mask(&array, windows[0]).unwrap()];
        let tile_mask = TileMask::new(2, 2, &windows, masks).unwrap();

        let chip = tile_mask.chip(0).unwrap();
        assert_eq!(chip.dim(), (2, 2, 2));
        // Revisit 0 has data, revisit 1 was never written
        assert!(!chip[[0, 0, 1]]);
        assert!(chip[[1, 0, 1]]);
        assert!(tile_mask.chip(1).is_none());
        assert_eq!(tile_mask.chip_count(), 1);
        assert!(!tile_mask.chip_fully_masked(0));
        assert!(tile_mask.chip_fully_masked(5));
    }

    #[test]
    fn test_mismatched_masks_rejected() {
        let windows = vec![PixelWindow { row_off: 0, col_off: 0, height: 2, width: 2 }];
        assert!(TileMask::new(1, 2, &windows, Vec::new()).is_err());
        assert!(TileMask::new(1, 2, &windows, vec![Array3::from_elem((1, 3, 3), true)]).is_err());
    }
}
