//! Edge → reference segment mapping
//!
//! Every network edge is assigned the reference segment nearest to the
//! centre of its bounding envelope. The R-tree returns candidates in
//! distance order; candidates at exactly the same distance are broken by the
//! lexicographically smallest segment id so the map is reproducible.
//!
//! Known limitation: with heavily overlapping segment geometry the segment
//! nearest to the envelope centre is not always the one nearest to the edge
//! as a whole.

use super::geometry::{Point, Polyline};
use super::network::NetworkEdge;
use super::reference::ReferenceSegment;
use super::MappingError;
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use std::collections::HashMap;

struct SegmentEntry {
    id: String,
    geometry: Polyline,
    envelope: AABB<Point>,
}

impl RTreeObject for SegmentEntry {
    type Envelope = AABB<Point>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl PointDistance for SegmentEntry {
    fn distance_2(&self, point: &Point) -> f64 {
        self.geometry.distance_2(point)
    }
}

/// Total map from network edge id to reference segment id
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EdgeToSegmentMap {
    entries: HashMap<String, String>,
}

impl EdgeToSegmentMap {
    pub fn build(
        edges: &[NetworkEdge],
        segments: &[ReferenceSegment],
    ) -> Result<Self, MappingError> {
        if segments.is_empty() {
            return Err(MappingError::EmptyReference);
        }

        let tree = RTree::bulk_load(
            segments
                .iter()
                .map(|s| SegmentEntry {
                    id: s.id.clone(),
                    geometry: s.geometry.clone(),
                    envelope: s.geometry.envelope(),
                })
                .collect(),
        );

        let mut entries = HashMap::with_capacity(edges.len());
        for edge in edges {
            let center = edge.shape.envelope_center();
            let segment = nearest_segment(&tree, &center).ok_or(MappingError::EmptyReference)?;
            entries.insert(edge.id.clone(), segment.to_string());
        }

        log::info!(
            "✅ Mapped {} network edges onto {} reference segments",
            entries.len(),
            segments.len()
        );

        Ok(Self { entries })
    }

    pub fn segment_for(&self, edge_id: &str) -> Result<&str, MappingError> {
        self.entries
            .get(edge_id)
            .map(String::as_str)
            .ok_or_else(|| MappingError::UnmappedEdge(edge_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn nearest_segment<'a>(tree: &'a RTree<SegmentEntry>, point: &Point) -> Option<&'a str> {
    let mut candidates = tree.nearest_neighbor_iter_with_distance_2(point);
    let (first, best) = candidates.next()?;

    let mut chosen = first.id.as_str();
    for (entry, distance) in candidates {
        if distance > best {
            break;
        }
        if entry.id.as_str() < chosen {
            chosen = entry.id.as_str();
        }
    }
    Some(chosen)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(points: &[Point]) -> Polyline {
        Polyline::new(points.to_vec())
    }

    fn streets() -> Vec<ReferenceSegment> {
        vec![
            ReferenceSegment::new("north", line(&[[0.0, 100.0], [100.0, 100.0]])),
            ReferenceSegment::new("south", line(&[[0.0, 0.0], [100.0, 0.0]])),
            ReferenceSegment::new("east", line(&[[200.0, 0.0], [200.0, 100.0]])),
        ]
    }

    #[test]
    fn test_nearest_segment_selected() {
        let edges = vec![
            NetworkEdge::new("e_south", line(&[[10.0, 2.0], [90.0, 2.0]])),
            NetworkEdge::new("e_north", line(&[[10.0, 97.0], [90.0, 97.0]])),
            NetworkEdge::new("e_east", line(&[[195.0, 10.0], [195.0, 90.0]])),
        ];

        let map = EdgeToSegmentMap::build(&edges, &streets()).unwrap();

        assert_eq!(map.segment_for("e_south").unwrap(), "south");
        assert_eq!(map.segment_for("e_north").unwrap(), "north");
        assert_eq!(map.segment_for("e_east").unwrap(), "east");
    }

    #[test]
    fn test_every_edge_has_exactly_one_entry() {
        let edges: Vec<NetworkEdge> = (0..50)
            .map(|i| {
                let x = i as f64 * 4.0;
                NetworkEdge::new(format!("e{}", i), line(&[[x, 10.0], [x + 3.0, 60.0]]))
            })
            .collect();

        let map = EdgeToSegmentMap::build(&edges, &streets()).unwrap();

        assert_eq!(map.len(), edges.len());
        for edge in &edges {
            assert!(map.segment_for(&edge.id).is_ok());
        }
    }

    #[test]
    fn test_build_is_deterministic() {
        let edges = vec![
            NetworkEdge::new("a", line(&[[0.0, 50.0], [100.0, 50.0]])),
            NetworkEdge::new("b", line(&[[150.0, 50.0], [160.0, 50.0]])),
        ];

        let first = EdgeToSegmentMap::build(&edges, &streets()).unwrap();
        let second = EdgeToSegmentMap::build(&edges, &streets()).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_equidistant_tie_breaks_on_smallest_id() {
        // centre (50, 50) is 50 away from both "north" and "south"
        let edges = vec![NetworkEdge::new("mid", line(&[[0.0, 50.0], [100.0, 50.0]]))];

        let map = EdgeToSegmentMap::build(&edges, &streets()).unwrap();

        assert_eq!(map.segment_for("mid").unwrap(), "north");
    }

    #[test]
    fn test_empty_reference_fails() {
        let edges = vec![NetworkEdge::new("a", line(&[[0.0, 0.0], [1.0, 0.0]]))];
        assert!(matches!(
            EdgeToSegmentMap::build(&edges, &[]),
            Err(MappingError::EmptyReference)
        ));
    }

    #[test]
    fn test_unmapped_edge_lookup() {
        let map = EdgeToSegmentMap::build(&[], &streets()).unwrap();
        assert!(matches!(
            map.segment_for("ghost"),
            Err(MappingError::UnmappedEdge(id)) if id == "ghost"
        ));
    }
}
