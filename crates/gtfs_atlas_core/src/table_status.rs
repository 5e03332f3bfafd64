use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    Loaded,
    MissingFile,
}

impl TableStatus {
    pub fn is_loaded(self) -> bool {
        matches!(self, TableStatus::Loaded)
    }
}
