use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, info, warn};

use super::atomic::write_atomic;
use super::error::{LoadIssue, StoreError};
use super::export::{default_export_path, render_csv};
use crate::models::Reading;

/// Result of [`RecordStore::create_empty`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    Overwritten,
    AlreadyExists,
}

/// Reads and writes the reading list stored at one data file.
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
    export_dir: PathBuf,
}

impl RecordStore {
    /// Bind a store to `path`. Exports without an explicit destination land in
    /// `export_dir`.
    pub fn new(path: impl Into<PathBuf>, export_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            export_dir: export_dir.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the readings, falling back to an empty list for a missing,
    /// unreadable or damaged file. A bad file must never keep the application
    /// from starting.
    pub fn load(&self) -> Vec<Reading> {
        match self.load_checked() {
            Ok(readings) => readings,
            Err(LoadIssue::Missing(path)) => {
                debug!(path = %path.display(), "no data file yet");
                Vec::new()
            }
            Err(issue) => {
                warn!(error = %issue, "treating data file as empty");
                Vec::new()
            }
        }
    }

    /// Load the readings and name the reason when there are none to load.
    pub fn load_checked(&self) -> Result<Vec<Reading>, LoadIssue> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(LoadIssue::Missing(self.path.clone()))
            }
            Err(source) => {
                return Err(LoadIssue::Unreadable {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let readings: Vec<Reading> =
            serde_json::from_str(&text).map_err(|source| LoadIssue::Corrupted {
                path: self.path.clone(),
                source,
            })?;
        debug!(path = %self.path.display(), count = readings.len(), "loaded readings");
        Ok(readings)
    }

    /// Write the full list, replacing the previous file atomically.
    pub fn save(&self, readings: &[Reading]) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(readings)?;
        write_atomic(&self.path, json.as_bytes())?;
        debug!(path = %self.path.display(), count = readings.len(), "saved readings");
        Ok(())
    }

    /// Write the readings as CSV to `destination`, or to a fresh timestamped
    /// file in the export directory. Returns the path written.
    pub fn export(
        &self,
        readings: &[Reading],
        destination: Option<&Path>,
    ) -> Result<PathBuf, StoreError> {
        let target = match destination {
            Some(path) => path.to_path_buf(),
            None => default_export_path(&self.export_dir, Local::now()),
        };
        write_atomic(&target, render_csv(readings).as_bytes())?;
        info!(path = %target.display(), count = readings.len(), "exported readings");
        Ok(target)
    }

    /// Start a fresh, empty data file at the bound path.
    pub fn create_empty(&self, overwrite: bool) -> Result<CreateOutcome, StoreError> {
        let existed = self.exists();
        if existed && !overwrite {
            return Ok(CreateOutcome::AlreadyExists);
        }
        self.save(&[])?;
        if existed {
            info!(path = %self.path.display(), "overwrote data file with an empty list");
            Ok(CreateOutcome::Overwritten)
        } else {
            info!(path = %self.path.display(), "created empty data file");
            Ok(CreateOutcome::Created)
        }
    }

    /// Copy a damaged data file aside before an empty list can replace it.
    pub fn backup_corrupt(&self) -> Result<PathBuf, StoreError> {
        let damaged = fs::read(&self.path).map_err(StoreError::at(&self.path))?;
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let prefix = format!("{file_name}.corrupt-");

        if let Some(existing) = self.matching_backup(&prefix, &damaged) {
            debug!(backup = %existing.display(), "damaged data file already backed up");
            return Ok(existing);
        }

        let stamp = format!("{prefix}{}", Local::now().format("%Y%m%d_%H%M%S"));
        let mut backup = self.path.with_file_name(&stamp);
        let mut counter = 2;
        while backup.exists() {
            backup = self.path.with_file_name(format!("{stamp}_{counter}"));
            counter += 1;
        }
        fs::write(&backup, &damaged).map_err(StoreError::at(&backup))?;
        warn!(
            path = %self.path.display(),
            backup = %backup.display(),
            "kept a copy of the unreadable data file"
        );
        Ok(backup)
    }

    /// An earlier backup next to the data file holding exactly `damaged`.
    fn matching_backup(&self, prefix: &str, damaged: &[u8]) -> Option<PathBuf> {
        let dir = self.path.parent()?;
        fs::read_dir(dir)
            .ok()?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|candidate| {
                candidate
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(prefix))
            })
            .find(|candidate| {
                fs::read(candidate)
                    .map(|bytes| bytes == damaged)
                    .unwrap_or(false)
            })
    }
}
