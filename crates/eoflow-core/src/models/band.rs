//! Sentinel-2 spectral bands and their native ground resolution.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{EoflowError, Result};

/// Sentinel-2 MSI band code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Band {
    B01,
    B02,
    B03,
    B04,
    B05,
    B06,
    B07,
    B08,
    B8A,
    B09,
    B10,
    B11,
    B12,
}

/// Native ground sampling distance of a band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BandResolution {
    R10m,
    R20m,
    R60m,
}

impl BandResolution {
    /// Pixel size in meters
    pub fn meters(&self) -> u32 {
        match self {
            BandResolution::R10m => 10,
            BandResolution::R20m => 20,
            BandResolution::R60m => 60,
        }
    }

    /// Factor needed to bring this resolution onto the 10 m tile grid
    pub fn upsample_factor(&self) -> usize {
        match self {
            BandResolution::R10m => 1,
            BandResolution::R20m => 2,
            BandResolution::R60m => 6,
        }
    }

    /// Label used in product directory and file names, e.g. "20m"
    pub fn label(&self) -> &'static str {
        match self {
            BandResolution::R10m => "10m",
            BandResolution::R20m => "20m",
            BandResolution::R60m => "60m",
        }
    }
}

impl Band {
    pub const ALL: [Band; 13] = [
        Band::B01,
        Band::B02,
        Band::B03,
        Band::B04,
        Band::B05,
        Band::B06,
        Band::B07,
        Band::B08,
        Band::B8A,
        Band::B09,
        Band::B10,
        Band::B11,
        Band::B12,
    ];

    /// Static resolution lookup
    pub fn resolution(&self) -> BandResolution {
        match self {
            Band::B02 | Band::B03 | Band::B04 | Band::B08 => BandResolution::R10m,
            Band::B05 | Band::B06 | Band::B07 | Band::B8A | Band::B11 | Band::B12 => {
                BandResolution::R20m
            }
            Band::B01 | Band::B09 | Band::B10 => BandResolution::R60m,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Band::B01 => "B01",
            Band::B02 => "B02",
            Band::B03 => "B03",
            Band::B04 => "B04",
            Band::B05 => "B05",
            Band::B06 => "B06",
            Band::B07 => "B07",
            Band::B08 => "B08",
            Band::B8A => "B8A",
            Band::B09 => "B09",
            Band::B10 => "B10",
            Band::B11 => "B11",
            Band::B12 => "B12",
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Band {
    type Err = EoflowError;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_uppercase();
        Band::ALL.iter().copied().find(|b| b.code() == upper).ok_or_else(|| {
            EoflowError::ConfigInvalid {
                key: "bands".to_string(),
                reason: format!("Unknown band code: {}", s),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_lookup() {
        assert_eq!(Band::B02.resolution(), BandResolution::R10m);
        assert_eq!(Band::B8A.resolution(), BandResolution::R20m);
        assert_eq!(Band::B09.resolution(), BandResolution::R60m);
        assert_eq!(Band::B11.resolution().upsample_factor(), 2);
        assert_eq!(Band::B01.resolution().upsample_factor(), 6);
        assert_eq!(Band::B04.resolution().label(), "10m");
    }

    #[test]
    fn test_parse_band() {
        assert_eq!("b8a".parse::<Band>().unwrap(), Band::B8A);
        assert_eq!("B12".parse::<Band>().unwrap(), Band::B12);
        assert!("B13".parse::<Band>().is_err());
    }

    #[test]
    fn test_band_serialization() {
        let json = serde_json::to_string(&vec![Band::B01, Band::B8A]).unwrap();
        assert_eq!(json, r#"["B01","B8A"]"#);
    }
}
