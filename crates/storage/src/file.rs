use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use snafu::ResultExt;

use super::KeyValueStore;
use super::error::{
    CreateStoreDirectorySnafu, RenameStoreSnafu, SerializeSnapshotSnafu, StorageResult,
    WriteStoreSnafu,
};

/// Local-storage analogue backed by a single JSON object on disk.
///
/// The whole file is read once on open and rewritten on every `set`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Opens the store at `path`.
    ///
    /// A missing, unreadable, or malformed file opens as an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = Self::load_from_disk(&path);
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_disk(path: &Path) -> BTreeMap<String, String> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("store file not found at {:?}, starting empty", path);
                return BTreeMap::new();
            }
            Err(error) => {
                tracing::warn!("failed to read store file {:?}: {}. starting empty", path, error);
                return BTreeMap::new();
            }
        };

        match serde_json::from_str::<BTreeMap<String, String>>(&contents) {
            Ok(entries) => entries,
            Err(error) => {
                tracing::warn!(
                    "failed to parse store file {:?}: {}. starting empty",
                    path,
                    error
                );
                BTreeMap::new()
            }
        }
    }

    fn persist(&self) -> StorageResult<()> {
        let display_path = self.path.display().to_string();

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).context(CreateStoreDirectorySnafu {
                stage: "create-store-directory",
                path: parent.display().to_string(),
            })?;
        }

        let content = serde_json::to_string_pretty(&self.entries).context(SerializeSnapshotSnafu {
            stage: "serialize-store-snapshot",
            path: display_path.clone(),
        })?;

        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).context(WriteStoreSnafu {
            stage: "write-temporary-store-file",
            path: temp_path.display().to_string(),
        })?;

        std::fs::rename(&temp_path, &self.path).context(RenameStoreSnafu {
            stage: "rename-temporary-store-file",
            from: temp_path.display().to_string(),
            to: display_path,
        })?;

        tracing::debug!("saved {} store entries to {:?}", self.entries.len(), self.path);
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> StorageResult<()> {
        self.entries.insert(key.to_string(), value);
        self.persist()
    }

    fn set_many(&mut self, entries: Vec<(&str, String)>) -> StorageResult<()> {
        for (key, value) in entries {
            self.entries.insert(key.to_string(), value);
        }
        self.persist()
    }
}
