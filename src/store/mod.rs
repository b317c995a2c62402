mod models;

pub use models::*;

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Record holding the forum credentials.
pub const LOGIN_RECORD: &str = "login";
/// Record holding the notification configuration.
pub const CONFIG_RECORD: &str = "config";
/// Record holding the last persisted snapshot.
pub const DATA_RECORD: &str = "data";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record '{0}' does not exist")]
    Missing(String),
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("record {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// JSON records on disk, one file per logical name.
///
/// Every write replaces the whole record. There is no locking here;
/// callers serialize their writers.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `name`.
    #[must_use]
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Read and parse the record stored under `name`.
    ///
    /// Returns `Ok(None)` when no record has been written yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn read<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, StoreError> {
        let path = self.path_for(name);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| StoreError::Json { path, source })
    }

    /// Serialize `value` and replace the record stored under `name`.
    ///
    /// The new contents are written to a temporary file in the same directory
    /// and renamed over the old record, so readers never see a partial write.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any filesystem step fails.
    pub fn write<T: Serialize>(&self, name: &str, value: &T) -> Result<(), StoreError> {
        let path = self.path_for(name);
        let json = to_pretty_json(value).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;

        let io_err = |source: std::io::Error| StoreError::Io {
            path: path.clone(),
            source,
        };

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        tmp.write_all(&json).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&path).map_err(|e| io_err(e.error))?;

        debug!(path = %path.display(), bytes = json.len(), "Record written");
        Ok(())
    }

    /// The persisted snapshot, or the never-fetched sentinel if there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if the record exists but cannot be read.
    pub fn load_snapshot(&self) -> Result<Snapshot, StoreError> {
        Ok(self
            .read::<Snapshot>(DATA_RECORD)?
            .unwrap_or_else(Snapshot::never_fetched))
    }

    /// Persist `snapshot` as the current `data` record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    pub fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        self.write(DATA_RECORD, snapshot)
    }

    /// The notification configuration; empty when the record is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the record exists but cannot be read.
    pub fn load_config(&self) -> Result<NotificationConfig, StoreError> {
        Ok(self
            .read::<NotificationConfig>(CONFIG_RECORD)?
            .unwrap_or_default())
    }

    /// The forum credentials.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Missing`] when no `login` record exists.
    pub fn load_login(&self) -> Result<LoginRecord, StoreError> {
        self.read::<LoginRecord>(LOGIN_RECORD)?
            .ok_or_else(|| StoreError::Missing(LOGIN_RECORD.to_string()))
    }
}

/// Pretty JSON with a four-space indent, matching the hand-edited records.
fn to_pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn setup_store() -> (SnapshotStore, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = SnapshotStore::open(temp_dir.path().join("cache")).unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_read_missing_returns_none() {
        let (store, _dir) = setup_store();
        let value: Option<NotificationConfig> = store.read("config").unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_missing_snapshot_is_sentinel() {
        let (store, _dir) = setup_store();
        let snapshot = store.load_snapshot().unwrap();
        assert_eq!(snapshot, Snapshot::never_fetched());
    }

    #[test]
    fn test_missing_config_is_empty() {
        let (store, _dir) = setup_store();
        assert_eq!(store.load_config().unwrap(), NotificationConfig::default());
    }

    #[test]
    fn test_missing_login_is_error() {
        let (store, _dir) = setup_store();
        assert!(matches!(store.load_login(), Err(StoreError::Missing(_))));
    }

    #[test]
    fn test_write_overwrites() {
        let (store, _dir) = setup_store();
        let first = Snapshot::begin("https://a.example/", Utc.timestamp_millis_opt(1).unwrap());
        let second = Snapshot::begin("https://b.example/", Utc.timestamp_millis_opt(2).unwrap());

        store.save_snapshot(&first).unwrap();
        store.save_snapshot(&second).unwrap();

        assert_eq!(store.load_snapshot().unwrap(), second);
    }

    #[test]
    fn test_write_uses_four_space_indent() {
        let (store, _dir) = setup_store();
        let config = NotificationConfig {
            managers: vec!["1".to_string()],
            channels: vec![],
        };
        store.write(CONFIG_RECORD, &config).unwrap();

        let raw = std::fs::read_to_string(store.path_for(CONFIG_RECORD)).unwrap();
        assert!(raw.contains("\n    \"managers\""));
    }

    #[test]
    fn test_corrupt_record_is_error() {
        let (store, _dir) = setup_store();
        std::fs::write(store.path_for(DATA_RECORD), "{ not json").unwrap();
        assert!(matches!(store.load_snapshot(), Err(StoreError::Json { .. })));
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let (store, _dir) = setup_store();
        store
            .save_snapshot(&Snapshot::begin("u", Utc.timestamp_millis_opt(5).unwrap()))
            .unwrap();

        let entries: Vec<_> = std::fs::read_dir(store.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries, vec!["data.json".to_string()]);
    }
}
