//! Lane / edge reference normalization

use super::TraceError;
use crate::spatial::{EdgeIndex, RoadNetwork};

/// Resolves lane and edge references reported by SUMO to base network edges
///
/// Regular lanes go through the network's lane table. Internal junction
/// lanes and edges (ids starting with `:`) are resolved spatially from the
/// vehicle position, never by taking their id apart.
pub struct EdgeResolver {
    network: RoadNetwork,
    index: EdgeIndex,
}

impl EdgeResolver {
    pub fn new(network: RoadNetwork) -> Self {
        let index = EdgeIndex::new(network.edges());
        Self { network, index }
    }

    pub fn network(&self) -> &RoadNetwork {
        &self.network
    }

    pub fn resolve_lane(
        &self,
        lane_id: &str,
        position: Option<(f64, f64)>,
    ) -> Result<String, TraceError> {
        if is_internal(lane_id) {
            return self.resolve_internal(lane_id, position);
        }
        let edge = self
            .network
            .edge_for_lane(lane_id)
            .unwrap_or_else(|| strip_lane_index(lane_id));
        Ok(edge.to_string())
    }

    pub fn resolve_edge(
        &self,
        edge_id: &str,
        position: Option<(f64, f64)>,
    ) -> Result<String, TraceError> {
        if is_internal(edge_id) {
            self.resolve_internal(edge_id, position)
        } else {
            Ok(edge_id.to_string())
        }
    }

    fn resolve_internal(
        &self,
        id: &str,
        position: Option<(f64, f64)>,
    ) -> Result<String, TraceError> {
        let (x, y) = position.ok_or_else(|| {
            TraceError::Malformed(format!("vehicle on junction '{}' has no position", id))
        })?;
        if !x.is_finite() || !y.is_finite() {
            return Err(TraceError::Malformed(format!(
                "vehicle on junction '{}' has a non-finite position ({}, {})",
                id, x, y
            )));
        }
        Ok(self.index.nearest_edge(x, y)?.to_string())
    }
}

pub fn is_internal(id: &str) -> bool {
    id.starts_with(':')
}

/// `"E1_0"` → `"E1"`; ids without a numeric lane suffix are returned as is
pub fn strip_lane_index(lane_id: &str) -> &str {
    match lane_id.rsplit_once('_') {
        Some((edge, index))
            if !edge.is_empty() && !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()) =>
        {
            edge
        }
        _ => lane_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::{NetworkEdge, Polyline};

    fn network() -> RoadNetwork {
        RoadNetwork::new(vec![
            NetworkEdge::new("main_st", Polyline::new(vec![[0.0, 0.0], [100.0, 0.0]]))
                .with_lanes(vec!["main_st_0".to_string(), "main_st_1".to_string()]),
            NetworkEdge::new("-45#2", Polyline::new(vec![[100.0, 0.0], [100.0, 100.0]]))
                .with_lanes(vec!["-45#2_0".to_string()]),
        ])
    }

    #[test]
    fn test_strip_lane_index() {
        assert_eq!(strip_lane_index("E1_0"), "E1");
        assert_eq!(strip_lane_index("a_b_12"), "a_b");
        assert_eq!(strip_lane_index("E1"), "E1");
        assert_eq!(strip_lane_index("E1_x"), "E1_x");
        assert_eq!(strip_lane_index("_3"), "_3");
    }

    #[test]
    fn test_lane_table_preferred() {
        let resolver = EdgeResolver::new(network());

        // edge id itself contains '_'
        assert_eq!(resolver.resolve_lane("main_st_1", None).unwrap(), "main_st");
        assert_eq!(resolver.resolve_lane("-45#2_0", None).unwrap(), "-45#2");
        assert_eq!(resolver.resolve_lane("other_0", None).unwrap(), "other");
    }

    #[test]
    fn test_junction_lane_resolved_spatially() {
        let resolver = EdgeResolver::new(network());

        let edge = resolver
            .resolve_lane(":cluster_12_34_0_0", Some((99.0, 60.0)))
            .unwrap();
        assert_eq!(edge, "-45#2");

        let edge = resolver.resolve_edge(":J1_3", Some((40.0, 2.0))).unwrap();
        assert_eq!(edge, "main_st");
    }

    #[test]
    fn test_junction_without_position_is_error() {
        let resolver = EdgeResolver::new(network());
        assert!(matches!(
            resolver.resolve_lane(":J1_0_0", None),
            Err(TraceError::Malformed(_))
        ));
    }

    #[test]
    fn test_junction_with_non_finite_position_is_error() {
        let resolver = EdgeResolver::new(network());

        for position in [(f64::NAN, 0.0), (10.0, f64::INFINITY)] {
            assert!(matches!(
                resolver.resolve_lane(":J1_0_0", Some(position)),
                Err(TraceError::Malformed(_))
            ));
        }
        assert!(matches!(
            resolver.resolve_edge(":J1_3", Some((f64::NAN, f64::NAN))),
            Err(TraceError::Malformed(_))
        ));
    }
}
