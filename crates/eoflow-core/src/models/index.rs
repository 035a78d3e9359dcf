//! Per-chip, per-tile and per-dataset index records.
//!
//! These are value objects: produced once during materialization or merging and never
//! mutated afterwards. NaN statistics serialize as JSON `null` and read back as NaN.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-band statistics of a composite chip
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChipStats {
    #[serde(with = "nan_as_null")]
    pub mean: Vec<f64>,
    #[serde(with = "nan_as_null")]
    pub std: Vec<f64>,
}

impl ChipStats {
    pub fn new(mean: Vec<f64>, std: Vec<f64>) -> Self {
        Self { mean, std }
    }

    pub fn band_count(&self) -> usize {
        self.mean.len()
    }
}

/// Everything recorded about one stored chip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChipMetaData {
    /// Tile code the chip belongs to
    pub tile: String,

    /// Position of the chip in the tile's chip list
    pub chip_ii: usize,

    /// Globally unique chip key, `{tile}-{chip_ii}`
    pub chip_idx: String,

    /// Path of the stored composite image
    pub chip_path: String,

    pub chip_stats: ChipStats,

    /// Path of the stored target raster
    pub target_path: String,

    /// Pixel count per target raster value
    pub target_pxcount: BTreeMap<u8, u64>,
}

impl ChipMetaData {
    pub fn chip_key(tile: &str, chip_ii: usize) -> String {
        format!("{}-{}", tile, chip_ii)
    }
}

/// All chips materialized for one tile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveIndex {
    pub tile: String,
    pub chips: Vec<ChipMetaData>,
}

/// All chips of a dataset run with aggregate statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSetIndex {
    pub chips: Vec<ChipMetaData>,
    pub chip_stats: ChipStats,
}

pub(crate) mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let values: Vec<Option<f64>> =
            values.iter().map(|v| if v.is_nan() { None } else { Some(*v) }).collect();
        values.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let values: Vec<Option<f64>> = Vec::deserialize(deserializer)?;
        Ok(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    }
}
