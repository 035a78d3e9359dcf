//! Burning target geometries into a chip raster.
//!
//! Areal targets burn the pixels whose centers they cover, with the right and bottom
//! edges half-open so adjacent polygons never share a pixel. Points burn the pixel that
//! contains them and lines burn one pixel per step along their dominant axis.

use eoflow_core::models::GeoTransform;
use geo::{BoundingRect, Contains, Coord, Geometry, Intersects, Line, Point, Rect};
use ndarray::Array2;

use crate::targets::Target;

/// Value written where a target covers a pixel
pub const BURN_VALUE: u8 = 255;

/// Rasterize targets onto a north-up pixel grid. Pixels no target touches are zero.
pub fn burn_targets(
    targets: &[&Target],
    transform: GeoTransform,
    height: usize,
    width: usize,
) -> Array2<u8> {
    let mut raster = Array2::<u8>::zeros((height, width));
    for target in targets {
        burn_geometry(&mut raster, &target.geometry, transform);
    }
    raster
}

fn burn_geometry(raster: &mut Array2<u8>, geometry: &Geometry, transform: GeoTransform) {
    match geometry {
        Geometry::Point(p) => burn_point(raster, p.0, transform),
        Geometry::MultiPoint(points) => {
            for p in points {
                burn_point(raster, p.0, transform);
            }
        }
        Geometry::Line(line) => burn_line(raster, *line, transform),
        Geometry::LineString(ls) => {
            for line in ls.lines() {
                burn_line(raster, line, transform);
            }
        }
        Geometry::MultiLineString(mls) => {
            for line in mls.iter().flat_map(|ls| ls.lines()) {
                burn_line(raster, line, transform);
            }
        }
        Geometry::Polygon(polygon) => burn_areal(raster, polygon, transform),
        Geometry::MultiPolygon(polygons) => burn_areal(raster, polygons, transform),
        Geometry::Rect(rect) => burn_areal(raster, &rect.to_polygon(), transform),
        Geometry::Triangle(triangle) => burn_areal(raster, &triangle.to_polygon(), transform),
        Geometry::GeometryCollection(collection) => {
            for g in collection {
                burn_geometry(raster, g, transform);
            }
        }
    }
}

/// Fractional `(col, row)` of a world coordinate
fn to_pixel(c: Coord, transform: GeoTransform) -> (f64, f64) {
    let [left, pixel_w, _, top, _, pixel_h] = transform.coefficients();
    ((c.x - left) / pixel_w, (c.y - top) / pixel_h)
}

fn burn_pixel(raster: &mut Array2<u8>, col: f64, row: f64) {
    let (height, width) = raster.dim();
    let (col, row) = (col.floor(), row.floor());
    if col >= 0.0 && row >= 0.0 && (col as usize) < width && (row as usize) < height {
        raster[[row as usize, col as usize]] = BURN_VALUE;
    }
}

fn burn_point(raster: &mut Array2<u8>, c: Coord, transform: GeoTransform) {
    let (col, row) = to_pixel(c, transform);
    burn_pixel(raster, col, row);
}

/// Step along the dominant axis, one pixel per column or row center crossed. Both end
/// pixels are always burned.
fn burn_line(raster: &mut Array2<u8>, line: Line, transform: GeoTransform) {
    let (c0, r0) = to_pixel(line.start, transform);
    let (c1, r1) = to_pixel(line.end, transform);
    burn_pixel(raster, c0, r0);
    burn_pixel(raster, c1, r1);

    let (dc, dr) = (c1 - c0, r1 - r0);
    if dc.abs() >= dr.abs() {
        if dc == 0.0 {
            return;
        }
        let (lo, hi) = (c0.min(c1), c0.max(c1));
        let mut col = (lo - 0.5).ceil().max(0.0);
        while col + 0.5 <= hi && col < raster.ncols() as f64 {
            let t = (col + 0.5 - c0) / dc;
            burn_pixel(raster, col, r0 + t * dr);
            col += 1.0;
        }
    } else {
        let (lo, hi) = (r0.min(r1), r0.max(r1));
        let mut row = (lo - 0.5).ceil().max(0.0);
        while row + 0.5 <= hi && row < raster.nrows() as f64 {
            let t = (row + 0.5 - r0) / dr;
            burn_pixel(raster, c0 + t * dc, row);
            row += 1.0;
        }
    }
}

/// Burn pixels whose centers fall in the shape. A center on the boundary counts only when
/// the shape continues to its right and below it.
fn burn_areal<G>(raster: &mut Array2<u8>, shape: &G, transform: GeoTransform)
where
    G: BoundingRect<f64, Output = Option<Rect<f64>>> + Contains<Point<f64>> + Intersects<Point<f64>>,
{
    let Some(rect) = shape.bounding_rect() else {
        return;
    };
    let (height, width) = raster.dim();
    let [left, pixel_w, _, top, _, pixel_h] = transform.coefficients();
    let nudge = pixel_w.abs() * 1e-6;

    // Only visit pixels whose centers can fall inside the envelope
    let col_start = ((rect.min().x - left) / pixel_w - 0.5).ceil().max(0.0) as usize;
    let col_end = (((rect.max().x - left) / pixel_w - 0.5).floor() + 1.0).max(0.0) as usize;
    let row_start = ((rect.max().y - top) / pixel_h - 0.5).ceil().max(0.0) as usize;
    let row_end = (((rect.min().y - top) / pixel_h - 0.5).floor() + 1.0).max(0.0) as usize;

    for row in row_start..row_end.min(height) {
        for col in col_start..col_end.min(width) {
            if raster[[row, col]] == BURN_VALUE {
                continue;
            }
            let (x, y) = transform.apply(col as f64 + 0.5, row as f64 + 0.5);
            let center = Point::new(x, y);
            if shape.intersects(&center) && shape.contains(&Point::new(x + nudge, y - nudge)) {
                raster[[row, col]] = BURN_VALUE;
            }
        }
    }
}

/// Pixel count per raster value
pub fn value_counts(raster: &Array2<u8>) -> std::collections::BTreeMap<u8, u64> {
    let mut counts = std::collections::BTreeMap::new();
    for value in raster.iter() {
        *counts.entry(*value).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, point, polygon};

    fn target(geometry: geo::Geometry) -> Target {
        Target { id: "t".to_string(), geometry }
    }

    #[test]
    fn test_square_burns_covered_centers() {
        let square = target(
            polygon![
                (x: 600100.0, y: 5799700.0),
                (x: 600300.0, y: 5799700.0),
                (x: 600300.0, y: 5799900.0),
                (x: 600100.0, y: 5799900.0),
            ]
            .into(),
        );
        let transform = GeoTransform::north_up(600000.0, 5800020.0, 10.0);

        let raster = burn_targets(&[&square], transform, 60, 60);
        let counts = value_counts(&raster);
        assert_eq!(counts[&255], 400);
        assert_eq!(counts[&0], 3200);

        // Rows 12..32 and columns 10..30 are covered
        assert_eq!(raster[[12, 10]], 255);
        assert_eq!(raster[[31, 29]], 255);
        assert_eq!(raster[[11, 10]], 0);
        assert_eq!(raster[[12, 30]], 0);
    }

    #[test]
    fn test_target_outside_grid() {
        let far = target(
            polygon![
                (x: 0.0, y: 0.0),
                (x: 10.0, y: 0.0),
                (x: 10.0, y: 10.0),
            ]
            .into(),
        );
        let transform = GeoTransform::north_up(600000.0, 5800020.0, 10.0);
        let raster = burn_targets(&[&far], transform, 8, 8);
        assert!(raster.iter().all(|v| *v == 0));
    }

    #[test]
    fn test_edges_through_centers_are_half_open() {
        // Edges run through pixel centers: left and top edges count, right and bottom do not
        let square = target(
            polygon![
                (x: 5.0, y: 65.0),
                (x: 35.0, y: 65.0),
                (x: 35.0, y: 95.0),
                (x: 5.0, y: 95.0),
            ]
            .into(),
        );
        let raster = burn_targets(&[&square], GeoTransform::north_up(0.0, 100.0, 10.0), 10, 10);

        assert_eq!(value_counts(&raster)[&255], 9);
        assert_eq!(raster[[0, 0]], 255);
        assert_eq!(raster[[2, 2]], 255);
        assert_eq!(raster[[3, 0]], 0);
        assert_eq!(raster[[0, 3]], 0);
    }

    #[test]
    fn test_point_burns_containing_pixel() {
        let p = target(point!(x: 33.0, y: 67.0).into());
        let raster = burn_targets(&[&p], GeoTransform::north_up(0.0, 100.0, 10.0), 10, 10);

        assert_eq!(value_counts(&raster)[&255], 1);
        assert_eq!(raster[[3, 3]], 255);
    }

    #[test]
    fn test_horizontal_line_burns_its_row() {
        let line = target(line_string![(x: 0.0, y: 51.0), (x: 100.0, y: 51.0)].into());
        let raster = burn_targets(&[&line], GeoTransform::north_up(0.0, 100.0, 10.0), 10, 10);

        assert_eq!(value_counts(&raster)[&255], 10);
        assert!(raster.row(4).iter().all(|v| *v == 255));
    }

    #[test]
    fn test_diagonal_line_burns_one_pixel_per_column() {
        let line = target(line_string![(x: 0.0, y: 100.0), (x: 100.0, y: 0.0)].into());
        let raster = burn_targets(&[&line], GeoTransform::north_up(0.0, 100.0, 10.0), 10, 10);

        assert_eq!(value_counts(&raster)[&255], 10);
        for k in 0..10 {
            assert_eq!(raster[[k, k]], 255);
        }
    }

    #[test]
    fn test_short_segment_burns_its_end_pixels() {
        let line = target(line_string![(x: 12.0, y: 88.0), (x: 14.0, y: 87.0)].into());
        let raster = burn_targets(&[&line], GeoTransform::north_up(0.0, 100.0, 10.0), 10, 10);

        assert_eq!(value_counts(&raster)[&255], 1);
        assert_eq!(raster[[1, 1]], 255);
    }

    #[test]
    fn test_no_targets() {
        let raster = burn_targets(&[], GeoTransform::north_up(0.0, 0.0, 1.0), 4, 3);
        assert_eq!(raster.dim(), (4, 3));
        assert_eq!(value_counts(&raster).len(), 1);
    }
}
