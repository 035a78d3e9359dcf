//! Chip layout on the tile grid.
//!
//! Chips are square windows of `chipsize` pixels on a grid anchored at the tile's
//! top-left corner. Only windows touching at least one target are kept, in row-major
//! order, and each keeps its position in that order as its identity.

use eoflow_core::error::{EoflowError, Result};
use eoflow_core::models::{Crs, GeoTransform};
use geo::Rect;

use crate::index::TargetIndex;
use crate::targets::TargetSet;
use crate::tile::{Tile, TileGrid};
use crate::transform::{projection, utm_zone_for_longitude};

/// Pixel window on the tile grid. May extend past the grid's far edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub row_off: usize,
    pub col_off: usize,
    pub height: usize,
    pub width: usize,
}

impl PixelWindow {
    /// Rows and columns of the window that fall inside a grid of `side` pixels
    pub fn valid_extent(&self, side: usize) -> (usize, usize) {
        let rows = side.saturating_sub(self.row_off).min(self.height);
        let cols = side.saturating_sub(self.col_off).min(self.width);
        (rows, cols)
    }

    /// Whether the window lies entirely inside a grid of `side` pixels
    pub fn is_inside(&self, side: usize) -> bool {
        self.valid_extent(side) == (self.height, self.width)
    }
}

/// One chip window
#[derive(Debug, Clone, PartialEq)]
pub struct Chip {
    /// Position in the tile's chip list
    pub ii: usize,

    /// Footprint in the tile's UTM CRS
    pub bounds: Rect,

    pub window: PixelWindow,

    /// North-up transform of the chip's pixel grid
    pub transform: GeoTransform,
}

/// Lay out the chip windows covering a tile's targets.
///
/// Targets are reprojected to the tile CRS if needed. Windows whose center falls in a
/// different UTM zone than the tile are dropped.
pub fn chip_windows(
    tile: &Tile,
    grid: TileGrid,
    targets: &TargetSet,
    chipsize: usize,
) -> Result<Vec<Chip>> {
    let targets = targets.to_crs(&tile.utm_crs)?;
    let bbox = match targets.bounding_rect() {
        Some(bbox) => bbox,
        None => return Ok(Vec::new()),
    };

    let resolution = grid.resolution as f64;
    let size_m = chipsize as f64 * resolution;
    let (left, top) = tile.utm_top_left();
    let per_side = grid.side_px.div_ceil(chipsize);
    let last = per_side.saturating_sub(1) as f64;

    let grid_index = |offset_m: f64| (offset_m / size_m).floor().clamp(0.0, last) as usize;
    let col_range = grid_index(bbox.min().x - left)..=grid_index(bbox.max().x - left);
    let row_range = grid_index(top - bbox.max().y)..=grid_index(top - bbox.min().y);

    let index = TargetIndex::new(&targets.targets);
    let to_wgs84 = projection(&tile.utm_crs, &Crs::wgs84())?;

    let mut chips = Vec::new();
    for row in row_range {
        for col in col_range.clone() {
            let min_x = left + col as f64 * size_m;
            let max_y = top - row as f64 * size_m;
            let bounds = Rect::new((min_x, max_y - size_m), (min_x + size_m, max_y));

            if !index.any_intersecting(&bounds) {
                continue;
            }

            let center = bounds.center();
            let (lon, _) = to_wgs84
                .convert((center.x, center.y))
                .map_err(|e| EoflowError::Projection(e.to_string()))?;
            if utm_zone_for_longitude(lon) != tile.square.zone {
                tracing::debug!(tile = %tile.code, row, col, lon, "Dropping chip outside tile zone");
                continue;
            }

            chips.push(Chip {
                ii: chips.len(),
                bounds,
                window: PixelWindow {
                    row_off: row * chipsize,
                    col_off: col * chipsize,
                    height: chipsize,
                    width: chipsize,
                },
                transform: GeoTransform::north_up(min_x, max_y, resolution),
            });
        }
    }

    tracing::debug!(tile = %tile.code, chips = chips.len(), "Laid out chip windows");
    Ok(chips)
}
