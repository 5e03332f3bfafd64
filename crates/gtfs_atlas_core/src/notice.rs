use std::fmt;

use serde::{Deserialize, Serialize};

pub const NOTICE_CODE_MISSING_FILE: &str = "missing_file";
pub const NOTICE_CODE_MISSING_OPTIONAL_FILE: &str = "missing_optional_file";
pub const NOTICE_CODE_EMPTY_FOLDER: &str = "empty_folder";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeSeverity {
    Warning,
    Info,
}

/// A non-fatal observation made while loading a feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadNotice {
    pub code: String,
    pub severity: NoticeSeverity,
    pub message: String,
    pub folder: Option<String>,
    pub file: Option<String>,
}

impl LoadNotice {
    pub fn new(
        code: impl Into<String>,
        severity: NoticeSeverity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            severity,
            message: message.into(),
            folder: None,
            file: None,
        }
    }

    pub fn missing_file(folder: &str, file: impl Into<String>) -> Self {
        let mut notice = LoadNotice::new(
            NOTICE_CODE_MISSING_FILE,
            NoticeSeverity::Warning,
            "required GTFS file is absent; the table gets no rows from this folder",
        );
        notice.folder = Some(folder_label(folder).to_string());
        notice.file = Some(file.into());
        notice
    }

    pub fn missing_optional_file(folder: &str, file: impl Into<String>) -> Self {
        let mut notice = LoadNotice::new(
            NOTICE_CODE_MISSING_OPTIONAL_FILE,
            NoticeSeverity::Info,
            "optional GTFS file is absent",
        );
        notice.folder = Some(folder_label(folder).to_string());
        notice.file = Some(file.into());
        notice
    }

    pub fn empty_folder(folder: &str) -> Self {
        let mut notice = LoadNotice::new(
            NOTICE_CODE_EMPTY_FOLDER,
            NoticeSeverity::Info,
            "folder contains no GTFS tables",
        );
        notice.folder = Some(folder_label(folder).to_string());
        notice
    }
}

impl fmt::Display for LoadNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            NoticeSeverity::Warning => "warning",
            NoticeSeverity::Info => "info",
        };
        write!(f, "[{severity}] {}", self.code)?;
        match (&self.folder, &self.file) {
            (Some(folder), Some(file)) => write!(f, " {folder}/{file}")?,
            (Some(folder), None) => write!(f, " {folder}")?,
            (None, Some(file)) => write!(f, " {file}")?,
            (None, None) => {}
        }
        write!(f, ": {}", self.message)
    }
}

/// Name used for a folder in notices and summaries; the input root is `.`.
pub fn folder_label(folder: &str) -> &str {
    if folder.is_empty() {
        "."
    } else {
        folder
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NoticeContainer {
    notices: Vec<LoadNotice>,
}

impl NoticeContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, notice: LoadNotice) {
        self.notices.push(notice);
    }

    pub fn iter(&self) -> impl Iterator<Item = &LoadNotice> {
        self.notices.iter()
    }

    pub fn len(&self) -> usize {
        self.notices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty()
    }

    pub fn count_code(&self, code: &str) -> usize {
        self.notices.iter().filter(|notice| notice.code == code).count()
    }
}
