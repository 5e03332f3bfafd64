use std::path::Path;

use gtfs_model::{
    Agency, CalendarDate, GtfsRecord, Route, Shape, Stop, StopTime, Trip, AGENCY_FILE,
    CALENDAR_DATES_FILE, ROUTES_FILE, SHAPES_FILE, STOPS_FILE, STOP_TIMES_FILE, TRIPS_FILE,
};
use tracing::{debug, info, warn};

use crate::index::FeedIndex;
use crate::input::{GtfsInput, GtfsInputReader, LoadError};
use crate::notice::{folder_label, LoadNotice, NoticeContainer};
use crate::progress::{NoOpProgressHandler, ProgressHandler};
use crate::CsvTable;

/// Files that must all sit at the input root for it to be read as a single feed.
pub const REQUIRED_FILES: &[&str] = &[
    AGENCY_FILE,
    STOP_TIMES_FILE,
    CALENDAR_DATES_FILE,
    TRIPS_FILE,
    STOPS_FILE,
    ROUTES_FILE,
];

pub const OPTIONAL_FILES: &[&str] = &[SHAPES_FILE];

/// How the loader decides where the tables live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayoutMode {
    /// Flat when every required file is at the root, otherwise one feed per subfolder.
    #[default]
    Auto,
    Flat,
    Subfolders,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub layout: LayoutMode,
    pub load_shapes: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            layout: LayoutMode::Auto,
            load_shapes: true,
        }
    }
}

impl LoadOptions {
    pub fn with_layout(mut self, layout: LayoutMode) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_shapes(mut self, load_shapes: bool) -> Self {
        self.load_shapes = load_shapes;
        self
    }
}

/// Raw merged tables, before indexing.
#[derive(Debug, Clone, Default)]
pub struct GtfsTables {
    pub agency: CsvTable<Agency>,
    pub stops: CsvTable<Stop>,
    pub routes: CsvTable<Route>,
    pub trips: CsvTable<Trip>,
    pub stop_times: CsvTable<StopTime>,
    pub calendar_dates: CsvTable<CalendarDate>,
    pub shapes: Option<CsvTable<Shape>>,
    /// Folders that contributed at least one table, in load order. `.` is the input root.
    pub sources: Vec<String>,
}

/// A loaded feed and its key index. The tables cannot change after the index
/// is built; derive a new feed from [`GtfsFeed::tables`] to edit them.
#[derive(Debug, Clone, Default)]
pub struct GtfsFeed {
    tables: GtfsTables,
    index: FeedIndex,
}

impl GtfsFeed {
    pub fn new(tables: GtfsTables) -> Self {
        let index = FeedIndex::build(&tables);
        Self { tables, index }
    }

    /// Loads a feed with the default options, discarding notices.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        FeedLoader::default().load(path)
    }

    pub fn tables(&self) -> &GtfsTables {
        &self.tables
    }

    pub fn into_tables(self) -> GtfsTables {
        self.tables
    }

    pub fn index(&self) -> &FeedIndex {
        &self.index
    }

    pub fn agency(&self) -> &CsvTable<Agency> {
        &self.tables.agency
    }

    pub fn stops(&self) -> &CsvTable<Stop> {
        &self.tables.stops
    }

    pub fn routes(&self) -> &CsvTable<Route> {
        &self.tables.routes
    }

    pub fn trips(&self) -> &CsvTable<Trip> {
        &self.tables.trips
    }

    pub fn stop_times(&self) -> &CsvTable<StopTime> {
        &self.tables.stop_times
    }

    pub fn calendar_dates(&self) -> &CsvTable<CalendarDate> {
        &self.tables.calendar_dates
    }

    pub fn shapes(&self) -> Option<&CsvTable<Shape>> {
        self.tables.shapes.as_ref()
    }

    pub fn sources(&self) -> &[String] {
        &self.tables.sources
    }
}

pub struct FeedLoader {
    options: LoadOptions,
    progress: Box<dyn ProgressHandler>,
}

impl Default for FeedLoader {
    fn default() -> Self {
        Self::with_options(LoadOptions::default())
    }
}

impl FeedLoader {
    pub fn with_options(options: LoadOptions) -> Self {
        Self {
            options,
            progress: Box::new(NoOpProgressHandler),
        }
    }

    pub fn with_progress(mut self, progress: impl ProgressHandler + 'static) -> Self {
        self.progress = Box::new(progress);
        self
    }

    pub fn load(&self, path: impl AsRef<Path>) -> Result<GtfsFeed, LoadError> {
        let mut notices = NoticeContainer::new();
        self.load_with_notices(path, &mut notices)
    }

    pub fn load_with_notices(
        &self,
        path: impl AsRef<Path>,
        notices: &mut NoticeContainer,
    ) -> Result<GtfsFeed, LoadError> {
        let input = GtfsInput::from_path(path)?;
        self.load_input(&input, notices)
    }

    pub fn load_input(
        &self,
        input: &GtfsInput,
        notices: &mut NoticeContainer,
    ) -> Result<GtfsFeed, LoadError> {
        let reader = input.reader()?;
        self.load_from_reader(&reader, notices)
    }

    pub fn load_from_reader(
        &self,
        reader: &GtfsInputReader,
        notices: &mut NoticeContainer,
    ) -> Result<GtfsFeed, LoadError> {
        let layout = self.resolve_layout(reader);
        let folders = match layout {
            LayoutMode::Subfolders => reader.folders()?,
            _ => vec![String::new()],
        };
        info!(
            "loading {} as {:?} layout from {} folder(s)",
            reader.source().display(),
            layout,
            folders.len()
        );
        if folders.is_empty() {
            warn!("{} has no subfolders to load", reader.source().display());
            notices.push(LoadNotice::empty_folder(""));
        }

        let files_per_folder = REQUIRED_FILES.len() + usize::from(self.options.load_shapes);
        self.progress
            .set_total_files(folders.len() * files_per_folder);

        let mut feed = GtfsTables::default();
        let mut shapes = CsvTable::default();
        let mut shapes_found = false;
        for folder in &folders {
            let mut contributed = false;
            contributed |= self.load_table(reader, folder, &mut feed.agency, notices)?;
            contributed |= self.load_table(reader, folder, &mut feed.stop_times, notices)?;
            contributed |= self.load_table(reader, folder, &mut feed.calendar_dates, notices)?;
            contributed |= self.load_table(reader, folder, &mut feed.trips, notices)?;
            contributed |= self.load_table(reader, folder, &mut feed.stops, notices)?;
            contributed |= self.load_table(reader, folder, &mut feed.routes, notices)?;
            if self.options.load_shapes {
                let found = self.load_table(reader, folder, &mut shapes, notices)?;
                shapes_found |= found;
                contributed |= found;
            }

            if contributed {
                feed.sources.push(folder_label(folder).to_string());
            } else if layout == LayoutMode::Subfolders {
                notices.push(LoadNotice::empty_folder(folder));
            }
        }
        if shapes_found {
            feed.shapes = Some(shapes);
        }

        info!(
            stops = feed.stops.len(),
            routes = feed.routes.len(),
            trips = feed.trips.len(),
            stop_times = feed.stop_times.len(),
            "feed loaded from {} source(s)",
            feed.sources.len()
        );
        Ok(GtfsFeed::new(feed))
    }

    fn resolve_layout(&self, reader: &GtfsInputReader) -> LayoutMode {
        match self.options.layout {
            LayoutMode::Auto => {
                if REQUIRED_FILES.iter().all(|file| reader.has_file("", file)) {
                    LayoutMode::Flat
                } else {
                    LayoutMode::Subfolders
                }
            }
            forced => forced,
        }
    }

    /// Appends `folder`'s copy of `T`'s file to `table`. Returns whether the file existed.
    fn load_table<T: GtfsRecord>(
        &self,
        reader: &GtfsInputReader,
        folder: &str,
        table: &mut CsvTable<T>,
        notices: &mut NoticeContainer,
    ) -> Result<bool, LoadError> {
        let label = format!("{}/{}", folder_label(folder), T::FILE_NAME);
        self.progress.on_start_file_load(&label);
        let loaded = reader.read_optional_csv::<T>(folder);
        self.progress.on_finish_file_load(&label);

        match loaded? {
            Some(rows) => {
                debug!(rows = rows.len(), "parsed {label}");
                table.append(rows);
                Ok(true)
            }
            None => {
                if OPTIONAL_FILES.contains(&T::FILE_NAME) {
                    notices.push(LoadNotice::missing_optional_file(folder, T::FILE_NAME));
                } else {
                    debug!("{label} is absent");
                    notices.push(LoadNotice::missing_file(folder, T::FILE_NAME));
                }
                Ok(false)
            }
        }
    }
}
