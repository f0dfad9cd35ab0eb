//! Reference street segments (GeoJSON `LineString` / `MultiLineString` features)

use super::geometry::{Point, Polyline};
use super::LoadError;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// One street unit of the output reference network
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSegment {
    pub id: String,
    pub geometry: Polyline,
}

impl ReferenceSegment {
    pub fn new(id: impl Into<String>, geometry: Polyline) -> Self {
        Self {
            id: id.into(),
            geometry,
        }
    }
}

/// Property names tried, in order, for the segment identifier
const ID_PROPERTIES: [&str; 3] = ["osm_id", "osmid", "id"];

pub fn load_reference_segments(path: impl AsRef<Path>) -> Result<Vec<ReferenceSegment>, LoadError> {
    let path = path.as_ref();
    let json = fs::read_to_string(path)?;
    let segments = parse_reference_geojson(&json)?;
    log::info!(
        "🛣️  Loaded {} reference segments from {}",
        segments.len(),
        path.display()
    );
    Ok(segments)
}

/// Parse a GeoJSON FeatureCollection into reference segments
///
/// A `MultiLineString` feature yields one segment per part, all sharing the
/// feature id. Coordinates must already be in the network's planar frame.
pub fn parse_reference_geojson(json: &str) -> Result<Vec<ReferenceSegment>, LoadError> {
    let root: Value = serde_json::from_str(json)?;
    let features = root
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| LoadError::InvalidGeometry("expected a FeatureCollection".to_string()))?;

    let mut segments = Vec::new();
    for (i, feature) in features.iter().enumerate() {
        let id = feature_id(feature)
            .ok_or_else(|| LoadError::InvalidGeometry(format!("feature {} has no id", i)))?;

        let geometry = feature
            .get("geometry")
            .ok_or_else(|| {
                LoadError::InvalidGeometry(format!("feature '{}' has no geometry", id))
            })?;
        let kind = geometry.get("type").and_then(Value::as_str).unwrap_or_default();
        let coords = geometry.get("coordinates");

        match (kind, coords) {
            ("LineString", Some(coords)) => {
                let line = parse_line(coords, &id)?;
                segments.push(ReferenceSegment::new(id, line));
            }
            ("MultiLineString", Some(Value::Array(parts))) => {
                for part in parts {
                    segments.push(ReferenceSegment::new(id.clone(), parse_line(part, &id)?));
                }
            }
            _ => {
                log::debug!("Skipping reference feature '{}' with geometry type '{}'", id, kind);
            }
        }
    }

    Ok(segments)
}

fn feature_id(feature: &Value) -> Option<String> {
    let properties = feature.get("properties");
    let value = ID_PROPERTIES
        .iter()
        .find_map(|key| properties.and_then(|p| p.get(*key)).filter(|v| !v.is_null()))
        .or_else(|| feature.get("id").filter(|v| !v.is_null()))?;

    Some(match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

fn parse_line(coords: &Value, id: &str) -> Result<Polyline, LoadError> {
    let invalid = || {
        LoadError::InvalidGeometry(format!("feature '{}' has malformed coordinates", id))
    };

    let mut points: Vec<Point> = Vec::new();
    for position in coords.as_array().ok_or_else(invalid)? {
        let pair = position.as_array().ok_or_else(invalid)?;
        let x = pair.first().and_then(Value::as_f64).ok_or_else(invalid)?;
        let y = pair.get(1).and_then(Value::as_f64).ok_or_else(invalid)?;
        points.push([x, y]);
    }
    if points.is_empty() {
        return Err(invalid());
    }
    Ok(Polyline::new(points))
}
