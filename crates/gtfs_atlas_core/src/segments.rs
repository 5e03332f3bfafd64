use chrono::TimeDelta;
use geo_types::{Coord, Point};
use geojson::{Feature, FeatureCollection, Geometry, Value};
use gtfs_model::{GtfsTime, Stop, StopTime};
use serde::{Serialize, Serializer};

use crate::error::{InterpolationError, LookupError};
use crate::feed::GtfsFeed;
use crate::geometry::ShapeLine;

/// One stop of a trip, joined with its stop and the time to reach the next stop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripSegmentRow<'a> {
    #[serde(flatten)]
    pub stop_time: &'a StopTime,
    pub stop: Option<&'a Stop>,
    /// Serialized as whole seconds.
    #[serde(serialize_with = "serialize_seconds")]
    pub segment_duration: Option<TimeDelta>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionedSegment {
    pub start_time: Option<GtfsTime>,
    pub end_time: Option<GtfsTime>,
    pub start_point: Point<f64>,
    pub end_point: Point<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoSegment {
    pub start_time: Option<GtfsTime>,
    pub end_time: Option<GtfsTime>,
    /// Start of the segment; the geometry exported for the record.
    pub geometry: Point<f64>,
    pub end_point: Point<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentGeoTable {
    pub records: Vec<GeoSegment>,
}

impl SegmentGeoTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn to_feature_collection(&self) -> FeatureCollection {
        FeatureCollection::from(self)
    }
}

impl From<&SegmentGeoTable> for FeatureCollection {
    fn from(table: &SegmentGeoTable) -> Self {
        let features = table
            .records
            .iter()
            .map(|record| {
                let mut feature = Feature {
                    bbox: None,
                    geometry: Some(point_geometry(record.geometry)),
                    id: None,
                    properties: None,
                    foreign_members: None,
                };
                feature.set_property("start_time", record.start_time.map(|t| t.to_string()));
                feature.set_property("end_time", record.end_time.map(|t| t.to_string()));
                feature.set_property(
                    "end_point",
                    vec![record.end_point.x(), record.end_point.y()],
                );
                feature
            })
            .collect();
        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }
}

fn point_geometry(point: Point<f64>) -> Geometry {
    Geometry::new(Value::Point(vec![point.x(), point.y()]))
}

pub struct TripSegmenter<'a> {
    feed: &'a GtfsFeed,
}

impl<'a> TripSegmenter<'a> {
    pub fn new(feed: &'a GtfsFeed) -> Self {
        Self { feed }
    }

    /// Stop times of `trip_id` in stop_sequence order. An unknown trip has no rows.
    pub fn segment_durations(&self, trip_id: &str) -> Vec<TripSegmentRow<'a>> {
        let stop_times = self.feed.trip_stop_times(trip_id);
        stop_times
            .iter()
            .enumerate()
            .map(|(position, &stop_time)| {
                let segment_duration = stop_times.get(position + 1).and_then(|next| {
                    Some(next.arrival_time?.since(stop_time.departure_time?))
                });
                TripSegmentRow {
                    stop_time,
                    stop: self.feed.stop(&stop_time.stop_id),
                    segment_duration,
                }
            })
            .collect()
    }

    /// Places the N rows of one trip at even fractions of the trip's shape,
    /// giving N-1 segments from fraction i/N to (i+1)/N.
    pub fn interpolate_positions(
        &self,
        rows: &[TripSegmentRow<'_>],
    ) -> Result<Vec<PositionedSegment>, InterpolationError> {
        let first = rows.first().ok_or(InterpolationError::EmptyTrip)?;
        let trip_id = first.stop_time.trip_id.as_str();
        let trip = self
            .feed
            .trip(trip_id)
            .ok_or_else(|| LookupError::UnknownTrip {
                trip_id: trip_id.to_string(),
            })?;
        let shape_id = trip
            .shape_id
            .as_deref()
            .filter(|shape_id| !shape_id.is_empty())
            .ok_or_else(|| LookupError::MissingShapeId {
                trip_id: trip_id.to_string(),
            })?;

        let points = self.feed.shape_points(shape_id);
        let line = ShapeLine::new(points.iter().filter_map(|point| {
            Some(Coord {
                x: point.shape_pt_lon?,
                y: point.shape_pt_lat?,
            })
        }))
        .ok_or_else(|| InterpolationError::EmptyShape {
            shape_id: shape_id.to_string(),
        })?;

        let count = rows.len() as f64;
        Ok(rows
            .windows(2)
            .enumerate()
            .map(|(i, pair)| PositionedSegment {
                start_time: pair[0].stop_time.departure_time,
                end_time: pair[1].stop_time.arrival_time,
                start_point: line.interpolate(i as f64 / count),
                end_point: line.interpolate((i + 1) as f64 / count),
            })
            .collect())
    }

    pub fn interpolate_trip(
        &self,
        trip_id: &str,
    ) -> Result<Vec<PositionedSegment>, InterpolationError> {
        let rows = self.segment_durations(trip_id);
        if rows.is_empty() && self.feed.trip(trip_id).is_none() {
            return Err(LookupError::UnknownTrip {
                trip_id: trip_id.to_string(),
            }
            .into());
        }
        self.interpolate_positions(&rows)
    }
}

pub fn to_geo_table(segments: &[PositionedSegment]) -> SegmentGeoTable {
    SegmentGeoTable {
        records: segments
            .iter()
            .map(|segment| GeoSegment {
                start_time: segment.start_time,
                end_time: segment.end_time,
                geometry: segment.start_point,
                end_point: segment.end_point,
            })
            .collect(),
    }
}

fn serialize_seconds<S: Serializer>(
    duration: &Option<TimeDelta>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match duration {
        Some(duration) => serializer.serialize_some(&duration.num_seconds()),
        None => serializer.serialize_none(),
    }
}
