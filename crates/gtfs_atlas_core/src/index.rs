use compact_str::CompactString;
use gtfs_model::{Route, Shape, Stop, StopTime, Trip};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::feed::{GtfsFeed, GtfsTables};
use crate::CsvTable;

/// Stop times of one trip, as row indices into `GtfsTables::stop_times`.
#[derive(Debug, Clone, Default)]
pub struct TripStopTimes {
    /// Sorted by stop_sequence; rows with equal sequence keep table order and
    /// rows without a usable sequence come last.
    pub ordered: Vec<usize>,
    /// First row for each stop_sequence.
    pub by_sequence: FxHashMap<u32, usize>,
}

/// Key lookups over a loaded feed. Repeated keys resolve to their first row.
#[derive(Debug, Clone, Default)]
pub struct FeedIndex {
    trips: FxHashMap<CompactString, usize>,
    routes: FxHashMap<CompactString, usize>,
    stops: FxHashMap<CompactString, usize>,
    stop_times_by_stop: FxHashMap<CompactString, Vec<usize>>,
    stop_times_by_trip: FxHashMap<CompactString, TripStopTimes>,
    shape_points: FxHashMap<CompactString, Vec<usize>>,
}

impl FeedIndex {
    pub fn build(feed: &GtfsTables) -> Self {
        let mut index = FeedIndex {
            trips: first_rows(&feed.trips, "trip_id", |trip| &trip.trip_id),
            routes: first_rows(&feed.routes, "route_id", |route| &route.route_id),
            stops: first_rows(&feed.stops, "stop_id", |stop| &stop.stop_id),
            ..FeedIndex::default()
        };

        for (row, stop_time) in feed.stop_times.iter().enumerate() {
            index
                .stop_times_by_stop
                .entry(CompactString::from(stop_time.stop_id.as_str()))
                .or_default()
                .push(row);
            let trip = index
                .stop_times_by_trip
                .entry(CompactString::from(stop_time.trip_id.as_str()))
                .or_default();
            trip.ordered.push(row);
            if let Some(sequence) = stop_time.stop_sequence {
                trip.by_sequence.entry(sequence).or_insert(row);
            }
        }
        for trip in index.stop_times_by_trip.values_mut() {
            trip.ordered.sort_by_key(|&row| {
                let sequence = feed.stop_times.rows[row].stop_sequence;
                (sequence.is_none(), sequence)
            });
        }

        if let Some(shapes) = &feed.shapes {
            for (row, point) in shapes.iter().enumerate() {
                index
                    .shape_points
                    .entry(CompactString::from(point.shape_id.as_str()))
                    .or_default()
                    .push(row);
            }
        }

        index
    }

    pub fn trip_row(&self, trip_id: &str) -> Option<usize> {
        self.trips.get(trip_id).copied()
    }

    pub fn route_row(&self, route_id: &str) -> Option<usize> {
        self.routes.get(route_id).copied()
    }

    pub fn stop_row(&self, stop_id: &str) -> Option<usize> {
        self.stops.get(stop_id).copied()
    }

    /// stop_times rows at a stop, in table order.
    pub fn stop_times_at_stop(&self, stop_id: &str) -> &[usize] {
        self.stop_times_by_stop
            .get(stop_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn trip_stop_times(&self, trip_id: &str) -> Option<&TripStopTimes> {
        self.stop_times_by_trip.get(trip_id)
    }

    pub fn stop_time_at_sequence(&self, trip_id: &str, stop_sequence: u32) -> Option<usize> {
        self.trip_stop_times(trip_id)?
            .by_sequence
            .get(&stop_sequence)
            .copied()
    }

    /// Shape point rows in file order.
    pub fn shape_points(&self, shape_id: &str) -> &[usize] {
        self.shape_points
            .get(shape_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

fn first_rows<T>(
    table: &CsvTable<T>,
    key_name: &str,
    key: impl Fn(&T) -> &String,
) -> FxHashMap<CompactString, usize> {
    let mut map: FxHashMap<CompactString, usize> = FxHashMap::default();
    for (row, record) in table.iter().enumerate() {
        let value = key(record);
        match map.get(value.as_str()) {
            Some(&first) => debug!(
                "{} {} repeats on line {}, keeping line {}",
                key_name,
                value,
                table.row_number(row),
                table.row_number(first)
            ),
            None => {
                map.insert(CompactString::from(value.as_str()), row);
            }
        }
    }
    map
}

impl GtfsFeed {
    pub fn trip(&self, trip_id: &str) -> Option<&Trip> {
        self.index()
            .trip_row(trip_id)
            .map(|row| &self.trips().rows[row])
    }

    pub fn route(&self, route_id: &str) -> Option<&Route> {
        self.index()
            .route_row(route_id)
            .map(|row| &self.routes().rows[row])
    }

    pub fn stop(&self, stop_id: &str) -> Option<&Stop> {
        self.index()
            .stop_row(stop_id)
            .map(|row| &self.stops().rows[row])
    }

    /// Stop times of a trip in stop_sequence order.
    pub fn trip_stop_times(&self, trip_id: &str) -> Vec<&StopTime> {
        self.index()
            .trip_stop_times(trip_id)
            .map(|trip| {
                trip.ordered
                    .iter()
                    .map(|&row| &self.stop_times().rows[row])
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn shape_points(&self, shape_id: &str) -> Vec<&Shape> {
        let Some(shapes) = self.shapes() else {
            return Vec::new();
        };
        self.index()
            .shape_points(shape_id)
            .iter()
            .map(|&row| &shapes.rows[row])
            .collect()
    }
}
