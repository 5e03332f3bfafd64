use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use gtfs_model::GtfsRecord;
use thiserror::Error;
use tracing::debug;
use zip::ZipArchive;

use crate::csv_reader::{read_csv_from_bytes, CsvParseError, CsvTable};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("input path does not exist: {0}")]
    MissingPath(PathBuf),
    #[error("input path is neither a directory nor a .zip archive: {0}")]
    InvalidPath(PathBuf),
    #[error("input is not a readable zip archive: {0}")]
    InvalidZip(PathBuf),
    #[error("failed to read {file}: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to open zip archive {file}: {source}")]
    ZipArchive {
        file: String,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("failed to read zip entry {file}: {source}")]
    ZipFile {
        file: String,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("malformed table {0}")]
    Csv(#[from] CsvParseError),
}

/// Location of a feed on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GtfsInput {
    Directory(PathBuf),
    Zip(PathBuf),
}

impl GtfsInput {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LoadError::MissingPath(path.to_path_buf()));
        }
        if path.is_dir() {
            return Ok(Self::Directory(path.to_path_buf()));
        }
        let is_zip = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
        if is_zip {
            Ok(Self::Zip(path.to_path_buf()))
        } else {
            Err(LoadError::InvalidPath(path.to_path_buf()))
        }
    }

    pub fn reader(&self) -> Result<GtfsInputReader, LoadError> {
        match self {
            Self::Directory(path) => Ok(GtfsInputReader::Directory(path.clone())),
            Self::Zip(path) => GtfsInputReader::open_zip(path),
        }
    }
}

/// Read access to the files of a feed. `folder` is `""` for the input root,
/// otherwise the name of an immediate subfolder.
#[derive(Debug)]
pub enum GtfsInputReader {
    Directory(PathBuf),
    Zip {
        path: PathBuf,
        entries: BTreeMap<String, Vec<u8>>,
        folders: BTreeSet<String>,
    },
}

impl GtfsInputReader {
    fn open_zip(path: &Path) -> Result<Self, LoadError> {
        let archive_label = path.display().to_string();
        let file = File::open(path).map_err(|source| LoadError::Io {
            file: archive_label.clone(),
            source,
        })?;
        let mut archive = ZipArchive::new(file).map_err(|source| match source {
            zip::result::ZipError::InvalidArchive(_) => LoadError::InvalidZip(path.to_path_buf()),
            source => LoadError::ZipArchive {
                file: archive_label.clone(),
                source,
            },
        })?;

        let mut entries = BTreeMap::new();
        let mut folders = BTreeSet::new();
        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|source| LoadError::ZipFile {
                    file: archive_label.clone(),
                    source,
                })?;
            let name = entry.name().trim_end_matches('/').to_string();
            let mut parts = name.split('/');
            let (first, second, rest) = (parts.next(), parts.next(), parts.next());
            match (first, second, rest) {
                (Some(folder), None, None) if entry.is_dir() => {
                    folders.insert(folder.to_string());
                    continue;
                }
                (Some(_), None, None) => {}
                (Some(folder), Some(_), None) => {
                    folders.insert(folder.to_string());
                }
                // Deeper nesting is not part of a feed layout.
                _ => continue,
            }
            if entry.is_dir() {
                continue;
            }
            let mut bytes = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut bytes)
                .map_err(|source| LoadError::Io {
                    file: format!("{archive_label}/{name}"),
                    source,
                })?;
            entries.insert(name, bytes);
        }
        debug!(entries = entries.len(), "read zip archive {}", archive_label);

        Ok(Self::Zip {
            path: path.to_path_buf(),
            entries,
            folders,
        })
    }

    /// Immediate subfolders of the input root, in lexical order.
    pub fn folders(&self) -> Result<Vec<String>, LoadError> {
        match self {
            Self::Directory(root) => {
                let io_error = |source| LoadError::Io {
                    file: root.display().to_string(),
                    source,
                };
                let mut folders = Vec::new();
                for entry in fs::read_dir(root).map_err(io_error)? {
                    let entry = entry.map_err(io_error)?;
                    if entry.path().is_dir() {
                        folders.push(entry.file_name().to_string_lossy().into_owned());
                    }
                }
                folders.sort();
                Ok(folders)
            }
            Self::Zip { folders, .. } => Ok(folders.iter().cloned().collect()),
        }
    }

    pub fn has_file(&self, folder: &str, file: &str) -> bool {
        match self {
            Self::Directory(root) => root.join(folder).join(file).is_file(),
            Self::Zip { entries, .. } => entries.contains_key(&entry_name(folder, file)),
        }
    }

    pub fn read_file(&self, folder: &str, file: &str) -> Result<Option<Vec<u8>>, LoadError> {
        match self {
            Self::Directory(root) => {
                let path = root.join(folder).join(file);
                if !path.is_file() {
                    return Ok(None);
                }
                fs::read(&path).map(Some).map_err(|source| LoadError::Io {
                    file: path.display().to_string(),
                    source,
                })
            }
            Self::Zip { entries, .. } => Ok(entries.get(&entry_name(folder, file)).cloned()),
        }
    }

    /// Parses `T::FILE_NAME` from `folder`, or returns `None` if the file is absent.
    pub fn read_optional_csv<T: GtfsRecord>(
        &self,
        folder: &str,
    ) -> Result<Option<CsvTable<T>>, LoadError> {
        let Some(bytes) = self.read_file(folder, T::FILE_NAME)? else {
            return Ok(None);
        };
        let label = entry_name(folder, T::FILE_NAME);
        let table = read_csv_from_bytes(&bytes, &label)?;
        Ok(Some(table))
    }

    pub fn source(&self) -> &Path {
        match self {
            Self::Directory(path) | Self::Zip { path, .. } => path,
        }
    }
}

fn entry_name(folder: &str, file: &str) -> String {
    if folder.is_empty() {
        file.to_string()
    } else {
        format!("{folder}/{file}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{temp_dir, write_file};

    #[test]
    fn rejects_missing_and_unsupported_paths() {
        let dir = temp_dir("gtfs_input");
        fs::create_dir_all(&dir).expect("create dir");
        write_file(&dir, "feed.csv", "");

        assert!(matches!(
            GtfsInput::from_path(dir.join("absent")),
            Err(LoadError::MissingPath(_))
        ));
        assert!(matches!(
            GtfsInput::from_path(dir.join("feed.csv")),
            Err(LoadError::InvalidPath(_))
        ));
        assert_eq!(
            GtfsInput::from_path(&dir).unwrap(),
            GtfsInput::Directory(dir.clone())
        );

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn lists_subfolders_in_lexical_order() {
        let dir = temp_dir("gtfs_folders");
        for name in ["south", "north", "east"] {
            fs::create_dir_all(dir.join(name)).expect("create dir");
        }
        write_file(&dir, "notes.txt", "ignored");

        let reader = GtfsInput::from_path(&dir).unwrap().reader().unwrap();
        assert_eq!(reader.folders().unwrap(), vec!["east", "north", "south"]);
        assert!(reader.has_file("", "notes.txt"));
        assert!(!reader.has_file("north", "notes.txt"));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn reads_flat_and_nested_zip_entries() {
        use std::io::Write;
        use zip::write::{FileOptions, ZipWriter};

        let dir = temp_dir("gtfs_zip");
        fs::create_dir_all(&dir).expect("create dir");
        let zip_path = dir.join("feed.zip");
        let mut writer = ZipWriter::new(File::create(&zip_path).expect("create zip"));
        writer
            .start_file("stops.txt", FileOptions::default())
            .expect("start");
        writer.write_all(b"stop_id\nS1\n").expect("write");
        writer
            .start_file("north/stops.txt", FileOptions::default())
            .expect("start");
        writer.write_all(b"stop_id\nN1\nN2\n").expect("write");
        writer.add_directory("south/", FileOptions::default()).expect("dir");
        writer.finish().expect("finish");

        let reader = GtfsInput::from_path(&zip_path).unwrap().reader().unwrap();
        assert_eq!(reader.folders().unwrap(), vec!["north", "south"]);
        let root: CsvTable<gtfs_model::Stop> = reader.read_optional_csv("").unwrap().unwrap();
        let north: CsvTable<gtfs_model::Stop> =
            reader.read_optional_csv("north").unwrap().unwrap();
        assert_eq!(root.len(), 1);
        assert_eq!(north.len(), 2);
        assert!(reader
            .read_optional_csv::<gtfs_model::Stop>("south")
            .unwrap()
            .is_none());

        fs::remove_dir_all(&dir).ok();
    }
}
