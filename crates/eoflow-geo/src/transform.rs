//! CRS transformation

use eoflow_core::error::{EoflowError, Result};
use eoflow_core::models::Crs;
use geo::{Coord, Geometry, MapCoords};
use proj::Proj;

/// Check if two CRS are the same
pub fn crs_match(crs1: &Crs, crs2: &Crs) -> bool {
    crs1.epsg == crs2.epsg
}

/// Build a projection between two CRS. Coordinates are always (x, y), i.e. (lon, lat)
/// for geographic systems.
pub fn projection(from_crs: &Crs, to_crs: &Crs) -> Result<Proj> {
    let from_proj = from_crs.authority();
    let to_proj = to_crs.authority();

    Proj::new_known_crs(&from_proj, &to_proj, None).map_err(|e| {
        EoflowError::Projection(format!(
            "Failed to create projection from {} to {}: {}",
            from_proj, to_proj, e
        ))
    })
}

/// Reproject a single coordinate pair
pub fn reproject_point(x: f64, y: f64, from_crs: &Crs, to_crs: &Crs) -> Result<(f64, f64)> {
    if crs_match(from_crs, to_crs) {
        return Ok((x, y));
    }
    let proj = projection(from_crs, to_crs)?;
    convert(&proj, x, y)
}

fn convert(proj: &Proj, x: f64, y: f64) -> Result<(f64, f64)> {
    proj.convert((x, y)).map_err(|e| EoflowError::Projection(e.to_string()))
}

/// Reproject a geometry from one CRS to another
pub fn reproject_geometry(geometry: &Geometry, from_crs: &Crs, to_crs: &Crs) -> Result<Geometry> {
    // If CRS are the same, no transformation needed
    if crs_match(from_crs, to_crs) {
        return Ok(geometry.clone());
    }

    let proj = projection(from_crs, to_crs)?;
    reproject_with(&proj, geometry)
}

/// Reproject a geometry with an existing projection
pub fn reproject_with(proj: &Proj, geometry: &Geometry) -> Result<Geometry> {
    geometry.try_map_coords(|coord: Coord| {
        let (x, y) = convert(proj, coord.x, coord.y)?;
        Ok(Coord { x, y })
    })
}

/// UTM zone number containing a longitude
pub fn utm_zone_for_longitude(lon: f64) -> u8 {
    let zone = ((lon + 180.0) / 6.0).floor() as i64 + 1;
    zone.clamp(1, 60) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{point, polygon, BoundingRect};

    #[test]
    fn test_utm_zone_for_longitude() {
        assert_eq!(utm_zone_for_longitude(-180.0), 1);
        assert_eq!(utm_zone_for_longitude(-3.0), 30);
        assert_eq!(utm_zone_for_longitude(-0.0001), 30);
        assert_eq!(utm_zone_for_longitude(0.0), 31);
        assert_eq!(utm_zone_for_longitude(180.0), 60);
    }

    #[test]
    fn test_same_crs_is_identity() {
        let geometry = Geometry::Point(point!(x: 600100.0, y: 5799700.0));
        let utm = Crs::utm(30, true);
        assert_eq!(reproject_geometry(&geometry, &utm, &utm).unwrap(), geometry);
    }

    #[test]
    fn test_central_meridian_round_trip() {
        let utm = Crs::utm(30, true);
        // Zone 30 central meridian is 3 degrees west, false easting 500 km
        let (x, y) = reproject_point(-3.0, 0.0, &Crs::wgs84(), &utm).unwrap();
        assert!((x - 500000.0).abs() < 1e-3);
        assert!(y.abs() < 1e-3);

        let (lon, lat) = reproject_point(x, y, &utm, &Crs::wgs84()).unwrap();
        assert!((lon + 3.0).abs() < 1e-9);
        assert!(lat.abs() < 1e-9);
    }

    #[test]
    fn test_reproject_polygon_keeps_shape() {
        let square: Geometry = polygon![
            (x: 600000.0, y: 5700000.0),
            (x: 601000.0, y: 5700000.0),
            (x: 601000.0, y: 5701000.0),
            (x: 600000.0, y: 5701000.0),
            (x: 600000.0, y: 5700000.0),
        ]
        .into();

        let wgs84 = reproject_geometry(&square, &Crs::utm(30, true), &Crs::wgs84()).unwrap();
        let rect = wgs84.bounding_rect().unwrap();
        assert!(rect.min().x > -2.0 && rect.max().x < -1.0);
        assert!(rect.min().y > 51.0 && rect.max().y < 52.0);
    }
}
