//! Local persistence.
//!
//! `KeyValue` is the storage seam: a flat string-to-string map, the same
//! shape as a browser's local storage. `FileStore` keeps one file per key
//! under a directory; `MemoryStore` keeps entries in process. The session
//! record lives under a single configured key and is owned by
//! [`SessionStore`].

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::core::errors::ClientError;
use crate::models::SessionRecord;

pub trait KeyValue: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, ClientError>;
    fn set(&self, key: &str, value: &str) -> Result<(), ClientError>;
    /// Removing a missing key is not an error.
    fn delete(&self, key: &str) -> Result<(), ClientError>;
}

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Keys are percent-encoded into file names, so distinct keys never
    /// share a file and none can leave the directory.
    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", urlencoding::encode(key)))
    }
}

impl KeyValue for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ClientError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), ClientError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, ClientError> {
        self.entries
            .lock()
            .map_err(|_| ClientError::StorageUnavailable("memory store poisoned".to_string()))
    }
}

impl KeyValue for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ClientError> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), ClientError> {
        self.entries()?.remove(key);
        Ok(())
    }
}

/// The single persisted session entry.
///
/// Reads are open to anyone holding a clone; writes are crate-private so
/// that the session manager stays the only writer.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn KeyValue>,
    key: String,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn KeyValue>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    /// Reads the record, distinguishing a storage failure from an absent or
    /// unparseable entry (both of which are `Ok(None)`).
    pub fn try_read(&self) -> Result<Option<SessionRecord>, ClientError> {
        let Some(raw) = self.backend.get(&self.key)? else {
            return Ok(None);
        };
        match serde_json::from_str::<SessionRecord>(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                warn!(key = %self.key, error = %err, "discarding unreadable session record");
                Ok(None)
            }
        }
    }

    pub fn read(&self) -> Option<SessionRecord> {
        match self.try_read() {
            Ok(record) => record,
            Err(err) => {
                warn!(key = %self.key, error = %err, "session storage read failed");
                None
            }
        }
    }

    pub(crate) fn write(&self, record: &SessionRecord) -> Result<(), ClientError> {
        let raw = serde_json::to_string(record)
            .map_err(|err| ClientError::StorageUnavailable(err.to_string()))?;
        self.backend.set(&self.key, &raw)
    }

    pub(crate) fn clear(&self) -> Result<(), ClientError> {
        self.backend.delete(&self.key)
    }
}
