//! JSON file backend for the best-record store.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use arena_rush_core::BestRecord;
use arena_rush_session::{BestRecordStore, RecordStoreError};
use tracing::{info, warn};

/// Persists best records as pretty-printed JSON at a fixed path.
#[derive(Clone, Debug)]
pub(crate) struct FileRecordStore {
    path: PathBuf,
}

impl FileRecordStore {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl BestRecordStore for FileRecordStore {
    fn load(&self) -> BestRecord {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no best records yet");
                return BestRecord::default();
            }
            Err(err) => {
                warn!(path = %self.path.display(), %err, "failed to read best records");
                return BestRecord::default();
            }
        };
        match serde_json::from_str(&contents) {
            Ok(record) => record,
            Err(err) => {
                warn!(path = %self.path.display(), %err, "ignoring corrupt best records");
                BestRecord::default()
            }
        }
    }

    fn save(&mut self, record: &BestRecord) -> Result<(), RecordStoreError> {
        let json = serde_json::to_string_pretty(record)
            .map_err(|err| RecordStoreError::Encode(err.to_string()))?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, json)?;
        info!(
            path = %self.path.display(),
            best_wave = record.best_wave,
            best_seconds = record.best_survived_seconds,
            "best records saved"
        );
        Ok(())
    }
}
