pub mod csv_reader;
pub mod error;
pub mod feed;
pub mod geometry;
pub mod index;
pub mod input;
pub mod notice;
pub mod progress;
pub mod segments;
pub mod stops;
pub mod summary;
pub mod table_status;

pub use csv_reader::{
    read_csv_from_bytes, ColumnKind, ColumnStats, CsvParseError, CsvTable,
};
pub use error::{InterpolationError, LookupError};
pub use feed::{FeedLoader, GtfsFeed, GtfsTables, LayoutMode, LoadOptions, OPTIONAL_FILES, REQUIRED_FILES};
pub use geometry::ShapeLine;
pub use index::{FeedIndex, TripStopTimes};
pub use input::{GtfsInput, GtfsInputReader, LoadError};
pub use notice::{LoadNotice, NoticeContainer, NoticeSeverity};
pub use progress::{NoOpProgressHandler, ProgressHandler};
pub use segments::{
    to_geo_table, GeoSegment, PositionedSegment, SegmentGeoTable, TripSegmentRow, TripSegmenter,
};
pub use stops::{
    plot_table_geojson, LookupPolicy, PlotRow, RouteThroughStop, StopIndex, StopPosition,
};
pub use summary::{FeedSummary, TableSummary};
pub use table_status::TableStatus;

pub use gtfs_model;
