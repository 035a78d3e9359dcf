//! JSON output documents of the commands

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct MaterializeOutput {
    pub tile: String,
    pub revisits: usize,
    pub chips: usize,
    pub index_path: String,
}

#[derive(Debug, Serialize)]
pub struct BandStats {
    pub band: String,
    pub mean: Option<f64>,
    pub std: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct MergeOutput {
    pub tiles: usize,
    pub chips: usize,
    pub index_path: String,
    pub bands: Vec<BandStats>,
}

#[derive(Debug, Serialize)]
pub struct TileOutput {
    pub code: String,
    pub utm_crs: String,
    pub utm_crs_raw: String,
    /// `[min_x, min_y, max_x, max_y]` in the UTM CRS
    pub utm_bounds: [f64; 4],
    /// `[lon, lat]` ring of the footprint
    pub wgs84_footprint: Vec<[f64; 2]>,
}

#[derive(Debug, Serialize)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
    pub source: String,
}

#[derive(Debug, Serialize)]
pub struct ConfigOutput {
    pub values: Vec<ConfigEntry>,
    pub valid: bool,
    pub error: Option<String>,
}
