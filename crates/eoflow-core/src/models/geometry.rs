use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate Reference System identified by EPSG code
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Crs {
    pub epsg: u32,
    pub name: String,
}

impl Default for Crs {
    fn default() -> Self {
        Self::wgs84()
    }
}

impl Crs {
    pub fn new(epsg: u32, name: impl Into<String>) -> Self {
        Self { epsg, name: name.into() }
    }

    /// WGS 84 (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::new(4326, "WGS 84")
    }

    /// WGS 84 / UTM zone, EPSG:326zz (north) or EPSG:327zz (south)
    pub fn utm(zone: u8, north: bool) -> Self {
        let (base, hemisphere) = if north { (32600, 'N') } else { (32700, 'S') };
        Self::new(base + zone as u32, format!("WGS 84 / UTM zone {}{}", zone, hemisphere))
    }

    /// Authority string, e.g. "EPSG:32630"
    pub fn authority(&self) -> String {
        format!("EPSG:{}", self.epsg)
    }

    /// UTM zone number if this is a WGS 84 / UTM CRS
    pub fn utm_zone(&self) -> Option<u8> {
        match self.epsg {
            32601..=32660 => Some((self.epsg - 32600) as u8),
            32701..=32760 => Some((self.epsg - 32700) as u8),
            _ => None,
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{} ({})", self.epsg, self.name)
    }
}

/// Six-coefficient affine transform in GDAL order:
/// `x = c0 + col * c1 + row * c2`, `y = c3 + col * c4 + row * c5`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform(pub [f64; 6]);

impl GeoTransform {
    /// North-up transform anchored at a top-left corner
    pub fn north_up(left: f64, top: f64, pixel_size: f64) -> Self {
        Self([left, pixel_size, 0.0, top, 0.0, -pixel_size])
    }

    /// World coordinate of a (possibly fractional) pixel position
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        let c = &self.0;
        (c[0] + col * c[1] + row * c[2], c[3] + col * c[4] + row * c[5])
    }

    pub fn coefficients(&self) -> [f64; 6] {
        self.0
    }
}
