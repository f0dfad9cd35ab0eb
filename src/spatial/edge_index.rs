//! Nearest-edge lookup for vehicles standing on internal junction lanes

use super::geometry::{Point, Polyline};
use super::network::NetworkEdge;
use super::MappingError;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

/// First search radius, in network units (metres)
pub const START_RADIUS: f64 = 10.0;
/// Growth factor applied to the radius after every empty search
pub const RADIUS_MULTIPLIER: f64 = 10.0;

struct EdgeEntry {
    id: String,
    shape: Polyline,
    envelope: AABB<Point>,
}

impl RTreeObject for EdgeEntry {
    type Envelope = AABB<Point>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl PointDistance for EdgeEntry {
    fn distance_2(&self, point: &Point) -> f64 {
        self.shape.distance_2(point)
    }
}

pub struct EdgeIndex {
    tree: RTree<EdgeEntry>,
}

impl EdgeIndex {
    pub fn new(edges: &[NetworkEdge]) -> Self {
        let entries = edges
            .iter()
            .map(|e| EdgeEntry {
                id: e.id.clone(),
                shape: e.shape.clone(),
                envelope: e.shape.envelope(),
            })
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Closest edge to `(x, y)` found by an expanding-radius search
    ///
    /// The radius starts at [`START_RADIUS`] and is multiplied by
    /// [`RADIUS_MULTIPLIER`] until at least one edge lies within it. Among the
    /// edges found, the closest wins; equal distances go to the smaller id.
    pub fn nearest_edge(&self, x: f64, y: f64) -> Result<&str, MappingError> {
        if self.is_empty() {
            return Err(MappingError::EmptyNetwork);
        }

        let point = [x, y];
        let mut radius = START_RADIUS;
        loop {
            let best = self
                .tree
                .locate_within_distance(point, radius * radius)
                .map(|entry| (entry.shape.distance_2(&point), entry.id.as_str()))
                .min_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1)));

            if let Some((_, id)) = best {
                return Ok(id);
            }
            log::debug!("No edge within {}m of ({:.2}, {:.2}), widening search", radius, x, y);
            radius *= RADIUS_MULTIPLIER;
        }
    }
}
