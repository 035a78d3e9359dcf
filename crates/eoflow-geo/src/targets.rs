//! Target geometries loaded from GeoJSON

use eoflow_core::error::{EoflowError, Result};
use eoflow_core::models::Crs;
use eoflow_core::ports::ByteStore;
use geo::{BoundingRect, Geometry, Intersects, Polygon, Rect};

use crate::transform::{crs_match, projection, reproject_with};

/// A labelled geometry to be burned into target rasters
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    /// Feature ID, or its position in the file when the feature has none
    pub id: String,
    pub geometry: Geometry,
}

/// Target geometries sharing one CRS
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSet {
    pub crs: Crs,
    pub targets: Vec<Target>,
}

impl TargetSet {
    pub fn new(crs: Crs, targets: Vec<Target>) -> Self {
        Self { crs, targets }
    }

    /// Parse a GeoJSON document. A legacy `crs` member is honoured; WGS 84 otherwise.
    pub fn from_geojson_str(content: &str, source: &str) -> Result<Self> {
        let geojson: geojson::GeoJson = content.parse().map_err(|e| EoflowError::Decode {
            path: source.to_string(),
            reason: format!("Invalid GeoJSON: {}", e),
        })?;

        match geojson {
            geojson::GeoJson::FeatureCollection(fc) => {
                let crs = fc
                    .foreign_members
                    .as_ref()
                    .and_then(|fm| fm.get("crs"))
                    .and_then(extract_epsg_from_crs)
                    .map(crs_from_epsg)
                    .unwrap_or_else(Crs::wgs84);

                let mut targets = Vec::with_capacity(fc.features.len());
                for (idx, feature) in fc.features.into_iter().enumerate() {
                    if let Some(target) = convert_feature(feature, idx)? {
                        targets.push(target);
                    }
                }
                Ok(Self::new(crs, targets))
            }
            geojson::GeoJson::Feature(feature) => {
                let targets = convert_feature(feature, 0)?.into_iter().collect();
                Ok(Self::new(Crs::wgs84(), targets))
            }
            geojson::GeoJson::Geometry(geom) => {
                let geometry = to_geo(geom, "0")?;
                Ok(Self::new(Crs::wgs84(), vec![Target { id: "0".to_string(), geometry }]))
            }
        }
    }

    /// Reproject every target
    pub fn to_crs(&self, crs: &Crs) -> Result<TargetSet> {
        if crs_match(&self.crs, crs) {
            return Ok(self.clone());
        }

        let proj = projection(&self.crs, crs)?;
        let targets = self
            .targets
            .iter()
            .map(|t| {
                reproject_with(&proj, &t.geometry)
                    .map(|geometry| Target { id: t.id.clone(), geometry })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(crs.clone(), targets))
    }

    /// Targets intersecting a polygon expressed in the same CRS
    pub fn intersecting(&self, polygon: &Polygon) -> TargetSet {
        let targets = self
            .targets
            .iter()
            .filter(|t| t.geometry.intersects(polygon))
            .cloned()
            .collect();
        Self::new(self.crs.clone(), targets)
    }

    /// Union bounding box of all targets
    pub fn bounding_rect(&self) -> Option<Rect> {
        self.targets.iter().filter_map(|t| t.geometry.bounding_rect()).reduce(|a, b| {
            Rect::new(
                (a.min().x.min(b.min().x), a.min().y.min(b.min().y)),
                (a.max().x.max(b.max().x), a.max().y.max(b.max().y)),
            )
        })
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Read a GeoJSON target file and bring it to WGS 84
pub fn load_targets(store: &dyn ByteStore, path: &str) -> Result<TargetSet> {
    let bytes = store.read(path)?;
    let content = String::from_utf8(bytes).map_err(|e| EoflowError::Decode {
        path: path.to_string(),
        reason: e.to_string(),
    })?;

    let targets = TargetSet::from_geojson_str(&content, path)?;
    tracing::info!(path, count = targets.len(), crs = %targets.crs, "Loaded targets");
    targets.to_crs(&Crs::wgs84())
}

fn convert_feature(feature: geojson::Feature, idx: usize) -> Result<Option<Target>> {
    // Get feature ID (use index if not present)
    let id = feature
        .id
        .as_ref()
        .map(|id| match id {
            geojson::feature::Id::String(s) => s.clone(),
            geojson::feature::Id::Number(n) => n.to_string(),
        })
        .unwrap_or_else(|| idx.to_string());

    match feature.geometry {
        Some(geom) => {
            let geometry = to_geo(geom, &id)?;
            Ok(Some(Target { id, geometry }))
        }
        None => {
            tracing::warn!(feature = %id, "Skipping feature without geometry");
            Ok(None)
        }
    }
}

fn to_geo(geom: geojson::Geometry, feature_id: &str) -> Result<Geometry> {
    Geometry::<f64>::try_from(geom).map_err(|e| EoflowError::InvalidGeometry {
        feature_id: feature_id.to_string(),
        reason: e.to_string(),
    })
}

/// Extract EPSG code from CRS object
fn extract_epsg_from_crs(crs: &serde_json::Value) -> Option<u32> {
    // Parse "EPSG:4326" or "urn:ogc:def:crs:EPSG::4326"
    let name = crs.get("properties")?.get("name")?.as_str()?;
    if name.ends_with("CRS84") {
        return Some(4326);
    }
    name.split(':').last()?.parse().ok()
}

fn crs_from_epsg(epsg: u32) -> Crs {
    match epsg {
        4326 => Crs::wgs84(),
        32601..=32660 => Crs::utm((epsg - 32600) as u8, true),
        32701..=32760 => Crs::utm((epsg - 32700) as u8, false),
        _ => Crs::new(epsg, format!("EPSG:{}", epsg)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eoflow_store::MemoryStore;
    use geo::polygon;

    const UTM_TARGETS: &str = r#"{
        "type": "FeatureCollection",
        "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::32630"}},
        "features": [
            {
                "type": "Feature",
                "id": "field-1",
                "properties": {},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[600100, 5799700], [600300, 5799700], [600300, 5799900], [600100, 5799900], [600100, 5799700]]]
                }
            },
            {"type": "Feature", "properties": {}, "geometry": null}
        ]
    }"#;

    #[test]
    fn test_parse_feature_collection_with_crs() {
        let set = TargetSet::from_geojson_str(UTM_TARGETS, "targets.geojson").unwrap();
        assert_eq!(set.crs.epsg, 32630);
        assert_eq!(set.len(), 1);
        assert_eq!(set.targets[0].id, "field-1");

        let rect = set.bounding_rect().unwrap();
        assert_eq!(rect.min().x, 600100.0);
        assert_eq!(rect.max().y, 5799900.0);
    }

    #[test]
    fn test_default_crs_and_bare_geometry() {
        let set = TargetSet::from_geojson_str(
            r#"{"type": "Point", "coordinates": [-1.5, 51.5]}"#,
            "point.geojson",
        )
        .unwrap();
        assert_eq!(set.crs, Crs::wgs84());
        assert_eq!(set.targets[0].id, "0");
    }

    #[test]
    fn test_invalid_geojson() {
        let result = TargetSet::from_geojson_str("{\"type\": \"Nope\"}", "bad.geojson");
        assert!(matches!(result, Err(EoflowError::Decode { .. })));
    }

    #[test]
    fn test_load_reprojects_to_wgs84() {
        let store = MemoryStore::new();
        store.write("targets.geojson", UTM_TARGETS.as_bytes()).unwrap();

        let set = load_targets(&store, "targets.geojson").unwrap();
        assert_eq!(set.crs, Crs::wgs84());
        let rect = set.bounding_rect().unwrap();
        assert!(rect.min().x > -2.0 && rect.max().x < -1.0);
        assert!(rect.min().y > 52.0 && rect.max().y < 52.5);

        let back = set.to_crs(&Crs::utm(30, true)).unwrap();
        let rect = back.bounding_rect().unwrap();
        assert!((rect.min().x - 600100.0).abs() < 1e-3);
        assert!((rect.max().y - 5799900.0).abs() < 1e-3);
    }

    #[test]
    fn test_intersecting_filter() {
        let set = TargetSet::from_geojson_str(UTM_TARGETS, "targets.geojson").unwrap();
        let inside = polygon![
            (x: 600000.0, y: 5799000.0),
            (x: 601000.0, y: 5799000.0),
            (x: 601000.0, y: 5800000.0),
            (x: 600000.0, y: 5800000.0),
        ];
        let outside = polygon![
            (x: 700000.0, y: 5700000.0),
            (x: 701000.0, y: 5700000.0),
            (x: 701000.0, y: 5701000.0),
        ];
        assert_eq!(set.intersecting(&inside).len(), 1);
        assert!(set.intersecting(&outside).is_empty());
    }
}
