#![no_main]
use arbitrary::Arbitrary;
use gtfs_atlas_core::{CsvTable, GtfsFeed, GtfsTables, LookupPolicy, StopIndex, TripSegmenter};
use gtfs_model::{GtfsTime, Route, Shape, Stop, StopTime, Trip};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct FuzzData {
    stop_times: Vec<StopTimeData>,
    trips: Vec<(u8, u8, Option<u8>)>,
    routes: Vec<u8>,
    shape_points: Vec<(u8, Option<f32>, Option<f32>)>,
    query_stop: u8,
}

#[derive(Debug, Arbitrary)]
struct StopTimeData {
    trip: u8,
    stop: u8,
    stop_sequence: Option<u32>,
    arrival: Option<u16>,
    departure: Option<u16>,
}

fn table<T>(rows: Vec<T>) -> CsvTable<T> {
    CsvTable {
        rows,
        ..CsvTable::default()
    }
}

// Small id spaces so that references collide often.
fn id(prefix: &str, value: u8) -> String {
    format!("{prefix}{}", value % 8)
}

fuzz_target!(|data: FuzzData| {
    let stops = table(
        (0..8)
            .map(|i| Stop {
                stop_id: id("S", i),
                stop_lat: Some(f64::from(i)),
                stop_lon: Some(0.0),
                ..Default::default()
            })
            .collect(),
    );
    let routes = table(
        data.routes
            .iter()
            .map(|&route| Route {
                route_id: id("R", route),
                ..Default::default()
            })
            .collect(),
    );
    let trips = table(
        data.trips
            .iter()
            .map(|&(trip, route, shape)| Trip {
                trip_id: id("T", trip),
                route_id: id("R", route),
                shape_id: shape.map(|shape| id("SH", shape)),
                ..Default::default()
            })
            .collect(),
    );
    let stop_times = table(
        data.stop_times
            .iter()
            .map(|row| StopTime {
                trip_id: id("T", row.trip),
                stop_id: id("S", row.stop),
                stop_sequence: row.stop_sequence,
                arrival_time: row.arrival.map(|t| GtfsTime::from_seconds(i32::from(t))),
                departure_time: row.departure.map(|t| GtfsTime::from_seconds(i32::from(t))),
                ..Default::default()
            })
            .collect(),
    );
    let shapes = table(
        data.shape_points
            .iter()
            .map(|&(shape, lat, lon)| Shape {
                shape_id: id("SH", shape),
                shape_pt_lat: lat.map(f64::from),
                shape_pt_lon: lon.map(f64::from),
                ..Default::default()
            })
            .collect(),
    );
    let feed = GtfsFeed::new(GtfsTables {
        stops,
        routes,
        trips,
        stop_times,
        shapes: Some(shapes),
        ..GtfsTables::default()
    });

    let stops = StopIndex::new(&feed);
    let stop_id = id("S", data.query_stop);
    let strict = stops.routes_through(&stop_id);
    let partial = stops.routes_through_partial(&stop_id);
    if let Ok(routes) = strict {
        assert_eq!(routes.len(), partial.len());
    }
    let _ = stops.plot_table(LookupPolicy::SkipUnresolved);

    let segmenter = TripSegmenter::new(&feed);
    for trip in 0..8 {
        let trip_id = id("T", trip);
        let rows = segmenter.segment_durations(&trip_id);
        if let Ok(segments) = segmenter.interpolate_positions(&rows) {
            assert_eq!(segments.len(), rows.len().saturating_sub(1));
        }
    }
});
