//! SUMO network (`.net.xml`) edge reader

use super::geometry::Polyline;
use super::LoadError;
use crate::xml;
use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// A directed road edge of the simulation network
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkEdge {
    pub id: String,
    pub shape: Polyline,
    pub lanes: Vec<String>,
}

impl NetworkEdge {
    pub fn new(id: impl Into<String>, shape: Polyline) -> Self {
        Self {
            id: id.into(),
            shape,
            lanes: Vec::new(),
        }
    }

    pub fn with_lanes(mut self, lanes: Vec<String>) -> Self {
        self.lanes = lanes;
        self
    }
}

/// Loaded network: edges in file order plus a lane → edge lookup
#[derive(Debug, Clone, Default)]
pub struct RoadNetwork {
    edges: Vec<NetworkEdge>,
    lane_to_edge: HashMap<String, usize>,
}

impl RoadNetwork {
    pub fn new(edges: Vec<NetworkEdge>) -> Self {
        let mut lane_to_edge = HashMap::new();
        for (i, edge) in edges.iter().enumerate() {
            for lane in &edge.lanes {
                lane_to_edge.insert(lane.clone(), i);
            }
        }
        Self { edges, lane_to_edge }
    }

    pub fn edges(&self) -> &[NetworkEdge] {
        &self.edges
    }

    pub fn edge_for_lane(&self, lane_id: &str) -> Option<&str> {
        self.lane_to_edge
            .get(lane_id)
            .map(|&i| self.edges[i].id.as_str())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let network = Self::from_reader(BufReader::new(file))?;
        log::info!(
            "🗺️  Loaded {} network edges from {}",
            network.edges.len(),
            path.display()
        );
        Ok(network)
    }

    /// Parse the `<edge>`/`<lane>` elements of a SUMO net file
    ///
    /// Internal junction edges (`function="internal"`) are skipped: vehicles on
    /// them are resolved spatially instead. An edge without its own `shape`
    /// takes the shape of its first lane.
    pub fn from_reader<R: BufRead>(source: R) -> Result<Self, LoadError> {
        let mut reader = XmlReader::from_reader(source);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        let mut edges = Vec::new();
        let mut current: Option<(String, Option<Polyline>, Vec<String>)> = None;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) if e.name().as_ref() == b"edge" => {
                    let attrs = xml::attributes(&e).map_err(LoadError::Xml)?;
                    if attrs.get("function").map(String::as_str) == Some("internal") {
                        current = None;
                    } else if let Some(id) = attrs.get("id") {
                        let shape = attrs.get("shape").and_then(|s| Polyline::parse_sumo_shape(s));
                        current = Some((id.clone(), shape, Vec::new()));
                    }
                }
                Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.name().as_ref() == b"lane" => {
                    if let Some((_, shape, lanes)) = current.as_mut() {
                        let attrs = xml::attributes(&e).map_err(LoadError::Xml)?;
                        if let Some(id) = attrs.get("id") {
                            lanes.push(id.clone());
                        }
                        if shape.is_none() {
                            *shape = attrs.get("shape").and_then(|s| Polyline::parse_sumo_shape(s));
                        }
                    }
                }
                Ok(Event::End(e)) if e.name().as_ref() == b"edge" => {
                    if let Some((id, shape, lanes)) = current.take() {
                        let shape = shape.ok_or_else(|| {
                            LoadError::InvalidGeometry(format!("edge '{}' has no shape", id))
                        })?;
                        edges.push(NetworkEdge::new(id, shape).with_lanes(lanes));
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(LoadError::Xml(e.to_string())),
                _ => {}
            }
            buf.clear();
        }

        Ok(Self::new(edges))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<net version="1.9">
    <location netOffset="0.00,0.00" convBoundary="0.00,0.00,200.00,0.00"/>
    <edge id=":J1_0" function="internal">
        <lane id=":J1_0_0" index="0" speed="13.89" length="0.10" shape="100.00,-1.60 100.00,-1.60"/>
    </edge>
    <edge id="E1" from="J0" to="J1" priority="-1">
        <lane id="E1_0" index="0" speed="13.89" length="100.00" shape="0.00,-1.60 100.00,-1.60"/>
        <lane id="E1_1" index="1" speed="13.89" length="100.00" shape="0.00,1.60 100.00,1.60"/>
    </edge>
    <edge id="-E2#1" from="J2" to="J1" priority="-1" shape="200.00,0.00 100.00,0.00">
        <lane id="-E2#1_0" index="0" speed="13.89" length="100.00" shape="200.00,1.60 100.00,1.60"/>
    </edge>
</net>"#;

    #[test]
    fn test_load_edges_and_lanes() {
        let network = RoadNetwork::from_reader(NET.as_bytes()).unwrap();

        assert_eq!(network.edges().len(), 2);
        assert_eq!(network.edges()[0].id, "E1");
        assert_eq!(network.edges()[0].lanes, vec!["E1_0", "E1_1"]);
        // edge shape wins over lane shape
        assert_eq!(network.edges()[1].shape.points(), &[[200.0, 0.0], [100.0, 0.0]]);
    }

    #[test]
    fn test_internal_edges_skipped() {
        let network = RoadNetwork::from_reader(NET.as_bytes()).unwrap();

        assert!(network.edges().iter().all(|e| e.id != ":J1_0"));
        assert_eq!(network.edge_for_lane(":J1_0_0"), None);
    }

    #[test]
    fn test_lane_lookup() {
        let network = RoadNetwork::from_reader(NET.as_bytes()).unwrap();

        assert_eq!(network.edge_for_lane("E1_1"), Some("E1"));
        assert_eq!(network.edge_for_lane("-E2#1_0"), Some("-E2#1"));
        assert_eq!(network.edge_for_lane("E9_0"), None);
    }
}
