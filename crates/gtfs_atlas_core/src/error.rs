use thiserror::Error;

/// A key that a query needed could not be resolved in the loaded tables.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("trip {trip_id} is not in trips.txt")]
    UnknownTrip { trip_id: String },
    #[error("route {route_id} is not in routes.txt")]
    UnknownRoute { route_id: String },
    #[error("trip {trip_id} has no usable stop_sequence at stop {stop_id}")]
    MissingStopSequence { trip_id: String, stop_id: String },
    #[error("trip {trip_id} has no stop time with stop_sequence {stop_sequence}")]
    MissingNeighbor { trip_id: String, stop_sequence: i64 },
    #[error("trip {trip_id} has no shape_id")]
    MissingShapeId { trip_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InterpolationError {
    #[error("no stop times to interpolate")]
    EmptyTrip,
    #[error("shape {shape_id} has no points")]
    EmptyShape { shape_id: String },
    #[error(transparent)]
    Lookup(#[from] LookupError),
}
