//! Spatial reference mapping between the simulation network and the street dataset

pub mod edge_index;
pub mod geometry;
pub mod mapper;
pub mod network;
pub mod reference;

pub use edge_index::EdgeIndex;
pub use geometry::{Point, Polyline};
pub use mapper::EdgeToSegmentMap;
pub use network::{NetworkEdge, RoadNetwork};
pub use reference::{load_reference_segments, ReferenceSegment};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("reference dataset contains no segments")]
    EmptyReference,
    #[error("network contains no edges to resolve junction positions against")]
    EmptyNetwork,
    #[error("edge '{0}' has no reference segment mapping")]
    UnmappedEdge(String),
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML error: {0}")]
    Xml(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
}
