use std::fmt;

use gtfs_model::GtfsRecord;
use serde::Serialize;

use crate::csv_reader::{ColumnStats, CsvTable};
use crate::feed::GtfsFeed;
use crate::table_status::TableStatus;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSummary {
    pub file: &'static str,
    pub status: TableStatus,
    pub rows: usize,
    pub columns: Vec<ColumnStats>,
}

impl TableSummary {
    fn of<T: GtfsRecord>(table: Option<&CsvTable<T>>) -> Self {
        match table {
            Some(table) if !table.headers.is_empty() => Self {
                file: T::FILE_NAME,
                status: TableStatus::Loaded,
                rows: table.len(),
                columns: table.columns.clone(),
            },
            _ => Self {
                file: T::FILE_NAME,
                status: TableStatus::MissingFile,
                rows: 0,
                columns: Vec::new(),
            },
        }
    }
}

/// Row and column overview of every table in a feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedSummary {
    pub sources: Vec<String>,
    pub tables: Vec<TableSummary>,
}

impl FeedSummary {
    pub fn table(&self, file: &str) -> Option<&TableSummary> {
        self.tables.iter().find(|table| table.file == file)
    }
}

impl GtfsFeed {
    pub fn summary(&self) -> FeedSummary {
        FeedSummary {
            sources: self.sources().to_vec(),
            tables: vec![
                TableSummary::of(Some(self.agency())),
                TableSummary::of(Some(self.stop_times())),
                TableSummary::of(Some(self.calendar_dates())),
                TableSummary::of(Some(self.trips())),
                TableSummary::of(Some(self.stops())),
                TableSummary::of(Some(self.routes())),
                TableSummary::of(self.shapes()),
            ],
        }
    }
}

impl fmt::Display for FeedSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "sources: {}", self.sources.join(", "))?;
        for table in &self.tables {
            writeln!(f)?;
            if !table.status.is_loaded() {
                writeln!(f, "{}: not loaded", table.file)?;
                continue;
            }
            writeln!(
                f,
                "{}: {} rows, {} columns",
                table.file,
                table.rows,
                table.columns.len()
            )?;
            let width = table
                .columns
                .iter()
                .map(|column| column.name.len())
                .max()
                .unwrap_or(0);
            for column in &table.columns {
                writeln!(
                    f,
                    "  {:<width$}  {:<7}  {} non-empty",
                    column.name, column.kind, column.non_empty
                )?;
            }
        }
        Ok(())
    }
}
