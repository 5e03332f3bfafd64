use geo::{EuclideanLength, LineInterpolatePoint};
use geo_types::{Coord, LineString, Point};

/// A polyline in planar (lon, lat) coordinates.
#[derive(Debug, Clone)]
pub struct ShapeLine {
    line: LineString<f64>,
    length: f64,
}

impl ShapeLine {
    /// Repeated consecutive points are collapsed. `None` when there are no points.
    pub fn new(coords: impl IntoIterator<Item = Coord<f64>>) -> Option<Self> {
        let mut coords: Vec<Coord<f64>> = coords.into_iter().collect();
        coords.dedup();
        if coords.is_empty() {
            return None;
        }
        let line = LineString::new(coords);
        let length = line.euclidean_length();
        Some(Self { line, length })
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    fn first_point(&self) -> Point<f64> {
        Point::from(self.line.0[0])
    }

    /// Point at `fraction` of the total length, clamped to the ends.
    pub fn interpolate(&self, fraction: f64) -> Point<f64> {
        if self.line.0.len() < 2 || self.length <= 0.0 || fraction.is_nan() {
            return self.first_point();
        }
        self.line
            .line_interpolate_point(fraction.clamp(0.0, 1.0))
            .unwrap_or_else(|| self.first_point())
    }
}
