use geojson::{Feature, FeatureCollection, Geometry, Value};
use rustc_hash::FxHashSet;
use serde::Serialize;
use tracing::warn;

use gtfs_model::StopTime;

use crate::error::LookupError;
use crate::feed::GtfsFeed;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopPosition {
    pub stop_id: String,
    pub stop_name: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// A route serving a stop, with the stops either side of it on one of the route's trips.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteThroughStop {
    pub route_id: String,
    pub route_name: Option<String>,
    pub previous_stop_id: String,
    pub next_stop_id: String,
}

impl RouteThroughStop {
    /// Short name of the route, or its id when the feed leaves the name blank.
    pub fn display_name(&self) -> &str {
        self.route_name.as_deref().unwrap_or(&self.route_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LookupPolicy {
    #[default]
    Strict,
    SkipUnresolved,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotRow {
    #[serde(flatten)]
    pub position: StopPosition,
    pub lines: Vec<String>,
}

pub struct StopIndex<'a> {
    feed: &'a GtfsFeed,
}

impl<'a> StopIndex<'a> {
    pub fn new(feed: &'a GtfsFeed) -> Self {
        Self { feed }
    }

    pub fn positions(&self) -> Vec<StopPosition> {
        self.feed
            .stops()
            .iter()
            .map(|stop| StopPosition {
                stop_id: stop.stop_id.clone(),
                stop_name: stop.stop_name.clone(),
                lat: stop.stop_lat,
                lon: stop.stop_lon,
            })
            .collect()
    }

    /// Routes through `stop_id` in order of first discovery. Any unresolved
    /// reference fails the whole call. An unknown stop yields no routes.
    pub fn routes_through(&self, stop_id: &str) -> Result<Vec<RouteThroughStop>, LookupError> {
        self.scan(stop_id).collect()
    }

    /// Like [`StopIndex::routes_through`], but each route reports its own outcome.
    pub fn routes_through_partial(
        &self,
        stop_id: &str,
    ) -> Vec<Result<RouteThroughStop, LookupError>> {
        self.scan(stop_id).collect()
    }

    pub fn plot_table(&self, policy: LookupPolicy) -> Result<Vec<PlotRow>, LookupError> {
        let mut rows = Vec::with_capacity(self.feed.stops().len());
        for position in self.positions() {
            let mut lines = Vec::new();
            for entry in self.scan(&position.stop_id) {
                match (entry, policy) {
                    (Ok(route), _) => lines.push(route.display_name().to_string()),
                    (Err(err), LookupPolicy::Strict) => return Err(err),
                    (Err(err), LookupPolicy::SkipUnresolved) => {
                        warn!(stop_id = %position.stop_id, "skipping route: {err}");
                    }
                }
            }
            rows.push(PlotRow { position, lines });
        }
        Ok(rows)
    }

    fn scan<'s>(
        &'s self,
        stop_id: &str,
    ) -> impl Iterator<Item = Result<RouteThroughStop, LookupError>> + 's {
        let feed = self.feed;
        let mut seen_routes: FxHashSet<&'a str> = FxHashSet::default();
        let mut failed_trips: FxHashSet<&'a str> = FxHashSet::default();
        feed.index()
            .stop_times_at_stop(stop_id)
            .iter()
            .filter_map(move |&row| {
                let stop_time = &feed.stop_times().rows[row];
                let trip_id = stop_time.trip_id.as_str();
                let Some(trip) = feed.trip(trip_id) else {
                    return failed_trips.insert(trip_id).then(|| {
                        Err(LookupError::UnknownTrip {
                            trip_id: trip_id.to_string(),
                        })
                    });
                };
                if !seen_routes.insert(trip.route_id.as_str()) {
                    return None;
                }
                Some(self.describe(stop_time, &trip.route_id))
            })
    }

    /// Neighbours come from the first row of this trip at the stop, so a trip
    /// that loops back through the stop still describes its route once.
    fn describe(
        &self,
        stop_time: &StopTime,
        route_id: &str,
    ) -> Result<RouteThroughStop, LookupError> {
        let trip_id = stop_time.trip_id.as_str();
        let route = self
            .feed
            .route(route_id)
            .ok_or_else(|| LookupError::UnknownRoute {
                route_id: route_id.to_string(),
            })?;
        let stop_sequence = stop_time
            .stop_sequence
            .ok_or_else(|| LookupError::MissingStopSequence {
                trip_id: trip_id.to_string(),
                stop_id: stop_time.stop_id.clone(),
            })?;
        let previous = self.neighbor(trip_id, i64::from(stop_sequence) - 1)?;
        let next = self.neighbor(trip_id, i64::from(stop_sequence) + 1)?;
        Ok(RouteThroughStop {
            route_id: route.route_id.clone(),
            route_name: route.route_short_name.clone(),
            previous_stop_id: previous,
            next_stop_id: next,
        })
    }

    fn neighbor(&self, trip_id: &str, stop_sequence: i64) -> Result<String, LookupError> {
        u32::try_from(stop_sequence)
            .ok()
            .and_then(|sequence| self.feed.index().stop_time_at_sequence(trip_id, sequence))
            .map(|row| self.feed.stop_times().rows[row].stop_id.clone())
            .ok_or_else(|| LookupError::MissingNeighbor {
                trip_id: trip_id.to_string(),
                stop_sequence,
            })
    }
}

/// Point features for every plotted stop that has coordinates.
pub fn plot_table_geojson(rows: &[PlotRow]) -> FeatureCollection {
    let features = rows
        .iter()
        .filter_map(|row| {
            let (lat, lon) = (row.position.lat?, row.position.lon?);
            let mut feature = Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::Point(vec![lon, lat]))),
                id: None,
                properties: None,
                foreign_members: None,
            };
            feature.set_property("stop_id", row.position.stop_id.clone());
            feature.set_property("stop_name", row.position.stop_name.clone());
            feature.set_property("lines", row.lines.clone());
            Some(feature)
        })
        .collect();
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CsvTable, GtfsTables};
    use gtfs_model::{Route, Stop, Trip};

    fn table<T>(rows: Vec<T>) -> CsvTable<T> {
        CsvTable {
            rows,
            ..CsvTable::default()
        }
    }

    fn stop(stop_id: &str, lat: f64, lon: f64) -> Stop {
        Stop {
            stop_id: stop_id.into(),
            stop_name: Some(format!("Stop {stop_id}")),
            stop_lat: Some(lat),
            stop_lon: Some(lon),
            ..Default::default()
        }
    }

    fn route(route_id: &str, short_name: Option<&str>) -> Route {
        Route {
            route_id: route_id.into(),
            route_short_name: short_name.map(str::to_string),
            ..Default::default()
        }
    }

    fn trip(trip_id: &str, route_id: &str) -> Trip {
        Trip {
            trip_id: trip_id.into(),
            route_id: route_id.into(),
            service_id: "WK".into(),
            ..Default::default()
        }
    }

    fn stop_time(trip_id: &str, stop_id: &str, stop_sequence: u32) -> StopTime {
        StopTime {
            trip_id: trip_id.into(),
            stop_id: stop_id.into(),
            stop_sequence: Some(stop_sequence),
            ..Default::default()
        }
    }

    /// Route A runs X-Y-Z twice, route B runs Z-Y-X, route C is missing from routes.txt.
    fn tables() -> GtfsTables {
        GtfsTables {
            stops: table(vec![
                stop("X", 1.0, 1.0),
                stop("Y", 2.0, 2.0),
                stop("Z", 3.0, 3.0),
                Stop {
                    stop_id: "W".into(),
                    ..Default::default()
                },
            ]),
            routes: table(vec![route("A", Some("1")), route("B", None)]),
            trips: table(vec![trip("T1", "A"), trip("T2", "A"), trip("T3", "B")]),
            stop_times: table(vec![
                stop_time("T1", "X", 1),
                stop_time("T1", "Y", 2),
                stop_time("T1", "Z", 3),
                stop_time("T2", "X", 1),
                stop_time("T2", "Y", 2),
                stop_time("T2", "Z", 3),
                stop_time("T3", "Z", 1),
                stop_time("T3", "Y", 2),
                stop_time("T3", "X", 3),
            ]),
            ..GtfsTables::default()
        }
    }

    fn feed() -> GtfsFeed {
        GtfsFeed::new(tables())
    }

    /// Route L runs P-Q-R-Q-S on a single trip.
    fn loop_feed() -> GtfsFeed {
        GtfsFeed::new(GtfsTables {
            stops: table(["P", "Q", "R", "S"].map(|id| stop(id, 0.0, 0.0)).to_vec()),
            routes: table(vec![route("L", Some("Loop"))]),
            trips: table(vec![trip("T5", "L")]),
            stop_times: table(vec![
                stop_time("T5", "P", 1),
                stop_time("T5", "Q", 2),
                stop_time("T5", "R", 3),
                stop_time("T5", "Q", 4),
                stop_time("T5", "S", 5),
            ]),
            ..GtfsTables::default()
        })
    }

    #[test]
    fn lists_positions_in_table_order() {
        let feed = feed();
        let positions = StopIndex::new(&feed).positions();

        assert_eq!(positions.len(), 4);
        assert_eq!(positions[1].stop_id, "Y");
        assert_eq!(positions[1].lat, Some(2.0));
        assert_eq!(positions[3].lon, None);
    }

    #[test]
    fn finds_each_route_once_with_neighbors() {
        let feed = feed();
        let routes = StopIndex::new(&feed).routes_through("Y").unwrap();

        assert_eq!(
            routes,
            vec![
                RouteThroughStop {
                    route_id: "A".into(),
                    route_name: Some("1".into()),
                    previous_stop_id: "X".into(),
                    next_stop_id: "Z".into(),
                },
                RouteThroughStop {
                    route_id: "B".into(),
                    route_name: None,
                    previous_stop_id: "Z".into(),
                    next_stop_id: "X".into(),
                },
            ]
        );
    }

    #[test]
    fn unknown_stop_has_no_routes() {
        let feed = feed();
        assert!(StopIndex::new(&feed).routes_through("nowhere").unwrap().is_empty());
    }

    #[test]
    fn terminal_stop_fails_strict_lookup() {
        let feed = feed();
        let err = StopIndex::new(&feed).routes_through("X").unwrap_err();

        assert_eq!(
            err,
            LookupError::MissingNeighbor {
                trip_id: "T1".into(),
                stop_sequence: 0,
            }
        );
    }

    #[test]
    fn partial_lookup_reports_each_route() {
        let mut tables = tables();
        tables.trips.rows.push(trip("T4", "C"));
        tables.stop_times.rows.extend([
            stop_time("T4", "Y", 5),
            stop_time("T4", "X", 4),
            stop_time("T4", "Z", 6),
            stop_time("T9", "Y", 2),
        ]);
        let feed = GtfsFeed::new(tables);

        let results = StopIndex::new(&feed).routes_through_partial("Y");

        assert_eq!(results.len(), 4);
        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        assert_eq!(
            results[2],
            Err(LookupError::UnknownRoute {
                route_id: "C".into()
            })
        );
        assert_eq!(
            results[3],
            Err(LookupError::UnknownTrip {
                trip_id: "T9".into()
            })
        );
    }

    #[test]
    fn single_route_stop_has_one_record() {
        let feed = loop_feed();
        let routes = StopIndex::new(&feed).routes_through("R").unwrap();

        assert_eq!(
            routes,
            vec![RouteThroughStop {
                route_id: "L".into(),
                route_name: Some("Loop".into()),
                previous_stop_id: "Q".into(),
                next_stop_id: "Q".into(),
            }]
        );
    }

    #[test]
    fn looped_trip_uses_first_visit_to_the_stop() {
        let feed = loop_feed();
        let routes = StopIndex::new(&feed).routes_through("Q").unwrap();

        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].route_id, "L");
        assert_eq!(routes[0].previous_stop_id, "P");
        assert_eq!(routes[0].next_stop_id, "R");
    }

    #[test]
    fn stop_time_without_sequence_is_reported() {
        let mut tables = tables();
        tables.stop_times.rows[1].stop_sequence = None;
        let feed = GtfsFeed::new(tables);

        let results = StopIndex::new(&feed).routes_through_partial("Y");
        assert_eq!(
            results[0],
            Err(LookupError::MissingStopSequence {
                trip_id: "T1".into(),
                stop_id: "Y".into(),
            })
        );
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn plot_table_respects_lookup_policy() {
        let feed = feed();
        let index = StopIndex::new(&feed);

        assert!(index.plot_table(LookupPolicy::Strict).is_err());

        let rows = index.plot_table(LookupPolicy::SkipUnresolved).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].lines, Vec::<String>::new());
        assert_eq!(rows[1].lines, vec!["1", "B"]);
        assert!(rows[3].lines.is_empty());
    }

    #[test]
    fn plot_rows_serialize_flat() {
        let feed = feed();
        let rows = StopIndex::new(&feed)
            .plot_table(LookupPolicy::SkipUnresolved)
            .unwrap();
        let json = serde_json::to_value(&rows[1]).unwrap();

        assert_eq!(json["stop_id"], "Y");
        assert_eq!(json["lat"], 2.0);
        assert_eq!(json["lines"][1], "B");
    }

    #[test]
    fn geojson_skips_stops_without_coordinates() {
        let feed = feed();
        let rows = StopIndex::new(&feed)
            .plot_table(LookupPolicy::SkipUnresolved)
            .unwrap();
        let collection = plot_table_geojson(&rows);

        assert_eq!(collection.features.len(), 3);
        let middle = &collection.features[1];
        assert_eq!(
            middle.geometry.as_ref().map(|geometry| &geometry.value),
            Some(&Value::Point(vec![2.0, 2.0]))
        );
        assert_eq!(
            middle.property("lines"),
            Some(&serde_json::json!(["1", "B"]))
        );
    }
}
