//! MGRS grid tiles.
//!
//! A tile code such as `30UXC` names a 100 km MGRS square. Sentinel-2 granules cover that
//! square plus a 9.78 km overlap to the south and 20 m to the north, giving a
//! 109.8 km x 109.8 km footprint sampled by a 10980 x 10980 pixel grid at 10 m.

use eoflow_core::error::{EoflowError, Result};
use eoflow_core::models::{Crs, GeoTransform};
use geo::{Polygon, Rect};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::transform::{projection, reproject_with};

/// Side of the tile footprint in meters
pub const TILE_EXTENT_M: f64 = 109_800.0;

/// Footprint overlap below the MGRS square's southern edge
const SOUTH_OVERLAP_M: f64 = 9_780.0;

/// Footprint overlap above the MGRS square's northern edge
const NORTH_OVERLAP_M: f64 = 20.0;

const SQUARE_M: f64 = 100_000.0;

const LATITUDE_BANDS: &str = "CDEFGHJKLMNPQRSTUVWX";
const ROW_LETTERS: &str = "ABCDEFGHJKLMNPQRSTUV";

/// Minimum northing of each latitude band, in the hemisphere's own false-northing frame
const BAND_MIN_NORTHING: [(char, f64); 20] = [
    ('C', 1_100_000.0),
    ('D', 2_000_000.0),
    ('E', 2_800_000.0),
    ('F', 3_700_000.0),
    ('G', 4_600_000.0),
    ('H', 5_500_000.0),
    ('J', 6_400_000.0),
    ('K', 7_300_000.0),
    ('L', 8_200_000.0),
    ('M', 9_100_000.0),
    ('N', 0.0),
    ('P', 800_000.0),
    ('Q', 1_700_000.0),
    ('R', 2_600_000.0),
    ('S', 3_500_000.0),
    ('T', 4_400_000.0),
    ('U', 5_300_000.0),
    ('V', 6_200_000.0),
    ('W', 7_000_000.0),
    ('X', 7_900_000.0),
];

/// Pixel grid laid over a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    /// Pixels per side at the grid resolution
    pub side_px: usize,
    /// Ground resolution in meters
    pub resolution: u32,
}

impl Default for TileGrid {
    fn default() -> Self {
        Self { side_px: 10_980, resolution: 10 }
    }
}

impl TileGrid {
    pub fn new(side_px: usize, resolution: u32) -> Self {
        Self { side_px, resolution }
    }
}

/// Components of a parsed MGRS 100 km square code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MgrsSquare {
    pub zone: u8,
    pub band: char,
    pub column: char,
    pub row: char,
}

impl MgrsSquare {
    /// Parse a code like `30UXC` or `5VNK`
    pub fn parse(code: &str) -> Result<Self> {
        let invalid = |reason: &str| EoflowError::InvalidTile {
            code: code.to_string(),
            reason: reason.to_string(),
        };

        let code_upper = code.trim().to_uppercase();
        let digits: String = code_upper.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() || digits.len() > 2 {
            return Err(invalid("expected a one or two digit UTM zone"));
        }
        let zone: u8 = digits.parse().map_err(|_| invalid("zone is not a number"))?;
        if !(1..=60).contains(&zone) {
            return Err(invalid("UTM zone must be between 1 and 60"));
        }

        let letters: Vec<char> = code_upper[digits.len()..].chars().collect();
        if letters.len() != 3 {
            return Err(invalid("expected a latitude band and two square letters"));
        }
        let (band, column, row) = (letters[0], letters[1], letters[2]);

        if !LATITUDE_BANDS.contains(band) {
            return Err(invalid("latitude band must be a letter from C to X, excluding I and O"));
        }
        if !column_letters(zone).contains(column) {
            return Err(invalid("column letter is not valid for this zone"));
        }
        if !ROW_LETTERS.contains(row) {
            return Err(invalid("row letter must be between A and V, excluding I and O"));
        }

        Ok(Self { zone, band, column, row })
    }

    pub fn is_northern(&self) -> bool {
        self.band >= 'N'
    }

    /// Easting and northing of the square's south-west corner
    pub fn origin(&self) -> (f64, f64) {
        let columns = column_letters(self.zone);
        let col_idx = columns.find(self.column).unwrap_or(0);
        let easting = (col_idx + 1) as f64 * SQUARE_M;

        let offset = if self.zone % 2 == 0 { 5 } else { 0 };
        let row_idx = ROW_LETTERS.find(self.row).unwrap_or(0) as i64;
        let mut northing = (row_idx - offset).rem_euclid(20) as f64 * SQUARE_M;

        let band_min = BAND_MIN_NORTHING
            .iter()
            .find(|(b, _)| *b == self.band)
            .map(|(_, n)| *n)
            .unwrap_or(0.0);
        while northing < band_min {
            northing += 2_000_000.0;
        }

        (easting, northing)
    }
}

fn column_letters(zone: u8) -> &'static str {
    match zone % 3 {
        1 => "ABCDEFGH",
        2 => "JKLMNPQR",
        _ => "STUVWXYZ",
    }
}

/// A Sentinel-2 grid tile with its footprint in UTM and WGS 84
#[derive(Debug, Clone)]
pub struct Tile {
    /// Normalized tile code with a two-digit zone, e.g. `30UXC` or `05VNK`
    pub code: String,

    pub square: MgrsSquare,

    /// Native UTM CRS of the tile
    pub utm_crs: Crs,

    /// Zone and hemisphere shorthand, e.g. `N30`
    pub utm_crs_raw: String,

    /// Footprint in UTM coordinates
    pub utm_bounds: Rect,

    /// Footprint in WGS 84 longitude/latitude
    pub wgs84_polygon: Polygon,
}

impl Tile {
    /// Derive a tile from its code
    pub fn from_code(code: &str) -> Result<Self> {
        let square = MgrsSquare::parse(code)?;
        let north = square.is_northern();
        let utm_crs = Crs::utm(square.zone, north);
        let utm_crs_raw = format!("{}{}", if north { 'N' } else { 'S' }, square.zone);

        let (easting, northing) = square.origin();
        let utm_bounds = Rect::new(
            (easting, northing - SOUTH_OVERLAP_M),
            (easting + TILE_EXTENT_M, northing + SQUARE_M + NORTH_OVERLAP_M),
        );

        let proj = projection(&utm_crs, &Crs::wgs84())?;
        let wgs84 = reproject_with(&proj, &utm_bounds.to_polygon().into())?;
        let wgs84_polygon = match wgs84 {
            geo::Geometry::Polygon(p) => p,
            other => {
                return Err(EoflowError::Projection(format!(
                    "tile footprint reprojected to unexpected geometry: {:?}",
                    other
                )))
            }
        };

        tracing::debug!(tile = %code, crs = %utm_crs, "Derived tile footprint");

        Ok(Self {
            code: format!("{:02}{}{}{}", square.zone, square.band, square.column, square.row),
            square,
            utm_crs,
            utm_crs_raw,
            utm_bounds,
            wgs84_polygon,
        })
    }

    /// Footprint in UTM as a polygon
    pub fn utm_polygon(&self) -> Polygon {
        self.utm_bounds.to_polygon()
    }

    /// North-west corner of the footprint, the origin of the pixel grid.
    ///
    /// This is the corner itself, not a point 980 m inside the northern edge. Pixel windows
    /// and the tile polygon share this origin.
    pub fn utm_top_left(&self) -> (f64, f64) {
        (self.utm_bounds.min().x, self.utm_bounds.max().y)
    }

    /// Affine transform of the tile pixel grid
    pub fn transform(&self, grid: TileGrid) -> GeoTransform {
        let (left, top) = self.utm_top_left();
        GeoTransform::north_up(left, top, grid.resolution as f64)
    }
}

/// Uppercase a tile code and pad a single-digit zone, `5vnk` -> `05VNK`
pub fn normalize_tile_code(code: &str) -> String {
    let code = code.trim().to_uppercase();
    match code.chars().take_while(|c| c.is_ascii_digit()).count() {
        1 => format!("0{}", code),
        _ => code,
    }
}

/// Tiles derived once per process and shared between archives.
///
/// Poisoned locks are recovered: the map only ever holds fully built tiles.
#[derive(Debug, Default)]
pub struct TileCache {
    tiles: Mutex<HashMap<String, Arc<Tile>>>,
}

impl TileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a tile, deriving it on first use
    pub fn get(&self, code: &str) -> Result<Arc<Tile>> {
        let key = normalize_tile_code(code);
        {
            let tiles = self.tiles.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(tile) = tiles.get(&key) {
                return Ok(Arc::clone(tile));
            }
        }

        let tile = Arc::new(Tile::from_code(&key)?);
        let mut tiles = self.tiles.lock().unwrap_or_else(|e| e.into_inner());
        Ok(Arc::clone(tiles.entry(key).or_insert(tile)))
    }

    pub fn len(&self) -> usize {
        self.tiles.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
