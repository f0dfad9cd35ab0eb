//! Planar polyline geometry shared by network edges and reference segments

use rstar::AABB;
use serde::{Deserialize, Serialize};

pub type Point = [f64; 2];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    points: Vec<Point>,
}

impl Polyline {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Axis-aligned bounding envelope; a degenerate box at the origin when empty
    pub fn envelope(&self) -> AABB<Point> {
        if self.points.is_empty() {
            return AABB::from_point([0.0, 0.0]);
        }
        AABB::from_points(self.points.iter())
    }

    /// Centre of the bounding envelope
    pub fn envelope_center(&self) -> Point {
        let env = self.envelope();
        let (lower, upper) = (env.lower(), env.upper());
        [(lower[0] + upper[0]) / 2.0, (lower[1] + upper[1]) / 2.0]
    }

    /// Squared distance from `point` to the closest point on the polyline
    pub fn distance_2(&self, point: &Point) -> f64 {
        match self.points.len() {
            0 => f64::INFINITY,
            1 => squared_distance(&self.points[0], point),
            _ => self
                .points
                .windows(2)
                .map(|pair| segment_distance_2(&pair[0], &pair[1], point))
                .fold(f64::INFINITY, f64::min),
        }
    }

    /// Parse a SUMO shape attribute: `"x1,y1 x2,y2 ..."`
    pub fn parse_sumo_shape(shape: &str) -> Option<Self> {
        let mut points = Vec::new();
        for pair in shape.split_whitespace() {
            let mut coords = pair.split(',');
            let x = coords.next()?.parse().ok()?;
            let y = coords.next()?.parse().ok()?;
            // 3D shapes carry a trailing z that is ignored
            points.push([x, y]);
        }
        if points.is_empty() {
            None
        } else {
            Some(Self::new(points))
        }
    }
}

fn squared_distance(a: &Point, b: &Point) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}

fn segment_distance_2(a: &Point, b: &Point, p: &Point) -> f64 {
    let (vx, vy) = (b[0] - a[0], b[1] - a[1]);
    let len_2 = vx * vx + vy * vy;
    if len_2 == 0.0 {
        return squared_distance(a, p);
    }
    let t = (((p[0] - a[0]) * vx + (p[1] - a[1]) * vy) / len_2).clamp(0.0, 1.0);
    let closest = [a[0] + t * vx, a[1] + t * vy];
    squared_distance(&closest, p)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_to_polyline() {
        let line = Polyline::new(vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0]]);

        assert_eq!(line.distance_2(&[5.0, 3.0]), 9.0);
        assert_eq!(line.distance_2(&[13.0, 5.0]), 9.0);
        // beyond the first vertex the distance is to the endpoint
        assert_eq!(line.distance_2(&[-3.0, -4.0]), 25.0);
    }

    #[test]
    fn test_envelope_center() {
        let line = Polyline::new(vec![[0.0, 0.0], [10.0, 4.0]]);
        assert_eq!(line.envelope_center(), [5.0, 2.0]);
    }

    #[test]
    fn test_parse_sumo_shape() {
        let line = Polyline::parse_sumo_shape("0.00,-1.60 100.00,-1.60").unwrap();
        assert_eq!(line.points(), &[[0.0, -1.6], [100.0, -1.6]]);

        let with_z = Polyline::parse_sumo_shape("1,2,0 3,4,0").unwrap();
        assert_eq!(with_z.points(), &[[1.0, 2.0], [3.0, 4.0]]);

        assert!(Polyline::parse_sumo_shape("").is_none());
        assert!(Polyline::parse_sumo_shape("1,x").is_none());
    }
}
