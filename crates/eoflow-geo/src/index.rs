use geo::{BoundingRect, Intersects, Rect};
use rstar::{RTree, RTreeObject, AABB};

use crate::targets::Target;

/// Envelope of one target, pointing back into the target list
#[derive(Debug, Clone, PartialEq)]
struct IndexedTarget {
    idx: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedTarget {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// R-tree over target envelopes for window queries
pub struct TargetIndex<'a> {
    targets: &'a [Target],
    tree: RTree<IndexedTarget>,
}

impl<'a> TargetIndex<'a> {
    /// Index a target list. Targets without extent are left out.
    pub fn new(targets: &'a [Target]) -> Self {
        let indexed = targets
            .iter()
            .enumerate()
            .filter_map(|(idx, target)| {
                target.geometry.bounding_rect().map(|rect| IndexedTarget {
                    idx,
                    envelope: AABB::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                })
            })
            .collect();

        Self { targets, tree: RTree::bulk_load(indexed) }
    }

    /// Targets whose geometry intersects a rectangle, in input order
    pub fn intersecting(&self, rect: &Rect) -> Vec<&'a Target> {
        let envelope =
            AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);

        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|t| t.idx)
            .filter(|&idx| self.targets[idx].geometry.intersects(rect))
            .collect();
        hits.sort_unstable();

        let targets = self.targets;
        hits.into_iter().map(|idx| &targets[idx]).collect()
    }

    /// Whether any target intersects a rectangle
    pub fn any_intersecting(&self, rect: &Rect) -> bool {
        !self.intersecting(rect).is_empty()
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{point, polygon, Geometry};

    fn targets() -> Vec<Target> {
        vec![
            Target {
                id: "a".to_string(),
                geometry: polygon![
                    (x: 0.0, y: 0.0),
                    (x: 10.0, y: 0.0),
                    (x: 10.0, y: 10.0),
                    (x: 0.0, y: 10.0),
                ]
                .into(),
            },
            Target {
                id: "b".to_string(),
                // Triangle whose envelope overlaps (12..20, 0..8) but the shape does not
                geometry: polygon![(x: 20.0, y: 0.0), (x: 20.0, y: 20.0), (x: 0.0, y: 20.0)]
                    .into(),
            },
            Target { id: "c".to_string(), geometry: Geometry::Point(point!(x: 50.0, y: 50.0)) },
        ]
    }

    #[test]
    fn test_intersecting_uses_exact_geometry() {
        let targets = targets();
        let index = TargetIndex::new(&targets);
        assert_eq!(index.len(), 3);

        let hits = index.intersecting(&Rect::new((12.0, 0.0), (16.0, 3.0)));
        assert!(hits.is_empty());

        let hits = index.intersecting(&Rect::new((5.0, 5.0), (19.0, 19.0)));
        let ids: Vec<_> = hits.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_point_target() {
        let targets = targets();
        let index = TargetIndex::new(&targets);
        assert!(index.any_intersecting(&Rect::new((49.0, 49.0), (51.0, 51.0))));
        assert!(!index.any_intersecting(&Rect::new((30.0, 30.0), (40.0, 40.0))));
    }
}
