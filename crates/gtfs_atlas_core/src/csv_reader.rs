use std::fmt;

use csv::{ReaderBuilder, StringRecord, Trim};
use serde::Serialize;

use gtfs_model::GtfsRecord;

/// Inferred type of a column, widened as more values are observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Empty,
    Integer,
    Float,
    Text,
}

impl ColumnKind {
    pub fn of_value(value: &str) -> Self {
        if value.is_empty() {
            ColumnKind::Empty
        } else if value.parse::<i64>().is_ok() {
            ColumnKind::Integer
        } else if value.parse::<f64>().is_ok() {
            ColumnKind::Float
        } else {
            ColumnKind::Text
        }
    }

    pub fn widen(self, other: ColumnKind) -> Self {
        match (self, other) {
            (ColumnKind::Empty, kind) | (kind, ColumnKind::Empty) => kind,
            (a, b) if a == b => a,
            (ColumnKind::Integer, ColumnKind::Float) | (ColumnKind::Float, ColumnKind::Integer) => {
                ColumnKind::Float
            }
            _ => ColumnKind::Text,
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ColumnKind::Empty => "empty",
            ColumnKind::Integer => "integer",
            ColumnKind::Float => "float",
            ColumnKind::Text => "text",
        };
        f.pad(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnStats {
    pub name: String,
    pub kind: ColumnKind,
    pub non_empty: usize,
}

impl ColumnStats {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Empty,
            non_empty: 0,
        }
    }

    fn observe(&mut self, value: &str) {
        if !value.is_empty() {
            self.non_empty += 1;
        }
        self.kind = self.kind.widen(ColumnKind::of_value(value));
    }

    fn merge(&mut self, other: &ColumnStats) {
        self.non_empty += other.non_empty;
        self.kind = self.kind.widen(other.kind);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{file}: {message}")]
pub struct CsvParseError {
    pub file: String,
    pub line_index: Option<u64>,
    pub message: String,
}

impl CsvParseError {
    fn from_csv(file: &str, error: &csv::Error) -> Self {
        let line_index = error.position().map(|position| position.line());
        let message = match error.kind() {
            csv::ErrorKind::UnequalLengths {
                expected_len, len, ..
            } => format!("row has {len} fields, header has {expected_len}"),
            _ => error.to_string(),
        };
        Self {
            file: file.to_string(),
            line_index,
            message,
        }
    }
}

/// Rows of one GTFS file, or of the same file concatenated across folders.
#[derive(Debug, Clone)]
pub struct CsvTable<T> {
    pub headers: Vec<String>,
    pub rows: Vec<T>,
    /// 1-based CSV line of each row within the file it came from.
    pub row_numbers: Vec<u64>,
    pub columns: Vec<ColumnStats>,
    /// Columns present in the file but not modelled by `T`.
    pub extra_columns: Vec<String>,
    pub extra_values: Vec<Vec<String>>,
}

impl<T> Default for CsvTable<T> {
    fn default() -> Self {
        Self {
            headers: Vec::new(),
            rows: Vec::new(),
            row_numbers: Vec::new(),
            columns: Vec::new(),
            extra_columns: Vec::new(),
            extra_values: Vec::new(),
        }
    }
}

impl<T> CsvTable<T> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.rows.iter()
    }

    pub fn row_number(&self, index: usize) -> u64 {
        self.row_numbers
            .get(index)
            .copied()
            .unwrap_or(index as u64 + 2)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnStats> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Value of a pass-through column for the given row. Empty values read as `None`.
    pub fn extra_value(&self, index: usize, column: &str) -> Option<&str> {
        let position = self.extra_columns.iter().position(|name| name == column)?;
        self.extra_values
            .get(index)?
            .get(position)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Appends every row of `other`. Rows are never deduplicated.
    pub fn append(&mut self, other: CsvTable<T>) {
        for header in other.headers {
            if !self.headers.contains(&header) {
                self.headers.push(header);
            }
        }

        for column in &other.columns {
            match self.columns.iter_mut().find(|own| own.name == column.name) {
                Some(own) => own.merge(column),
                None => self.columns.push(column.clone()),
            }
        }

        let extra_mapping: Vec<usize> = other
            .extra_columns
            .iter()
            .map(|name| match self.extra_columns.iter().position(|own| own == name) {
                Some(position) => position,
                None => {
                    self.extra_columns.push(name.clone());
                    self.extra_columns.len() - 1
                }
            })
            .collect();
        // Older rows may be shorter than `extra_columns`; `extra_value` treats that as empty.
        self.extra_values
            .resize_with(self.rows.len(), Vec::new);
        for values in other.extra_values {
            let mut aligned = vec![String::new(); self.extra_columns.len()];
            for (value, &position) in values.into_iter().zip(&extra_mapping) {
                aligned[position] = value;
            }
            self.extra_values.push(aligned);
        }

        self.rows.extend(other.rows);
        self.row_numbers.extend(other.row_numbers);
    }
}

pub fn read_csv_from_bytes<T: GtfsRecord>(
    data: &[u8],
    file: &str,
) -> Result<CsvTable<T>, CsvParseError> {
    let data = strip_utf8_bom(data);
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .trim(Trim::All)
        .from_reader(data);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|err| CsvParseError::from_csv(file, &err))?
        .iter()
        .map(|value| value.trim().to_ascii_lowercase())
        .collect();
    let header_record = StringRecord::from(headers.clone());
    let extra_indices: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(_, name)| !T::FIELDS.contains(&name.as_str()))
        .map(|(index, _)| index)
        .collect();

    let mut table = CsvTable {
        headers: headers.clone(),
        columns: headers.iter().map(ColumnStats::new).collect(),
        extra_columns: extra_indices
            .iter()
            .map(|&index| headers[index].clone())
            .collect(),
        ..CsvTable::default()
    };

    let mut record = StringRecord::new();
    loop {
        match reader.read_record(&mut record) {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => return Err(CsvParseError::from_csv(file, &err)),
        }
        let line = record
            .position()
            .map(|position| position.line())
            .unwrap_or(table.rows.len() as u64 + 2);

        for (column, value) in table.columns.iter_mut().zip(record.iter()) {
            column.observe(value);
        }
        let row: T = record
            .deserialize(Some(&header_record))
            .map_err(|err| CsvParseError {
                file: file.to_string(),
                line_index: Some(line),
                message: err.to_string(),
            })?;

        table.rows.push(row);
        table.row_numbers.push(line);
        if !extra_indices.is_empty() {
            table.extra_values.push(
                extra_indices
                    .iter()
                    .map(|&index| record.get(index).unwrap_or_default().to_string())
                    .collect(),
            );
        }
    }

    Ok(table)
}

fn strip_utf8_bom(data: &[u8]) -> &[u8] {
    if data.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &data[3..]
    } else {
        data
    }
}
