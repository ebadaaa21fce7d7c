//! The readings currently on screen plus the store they came from.
//!
//! Every mutation follows the same pattern: change the list in memory, write
//! the whole list, and undo the in-memory change when the write fails. That
//! keeps what the user sees identical to what is on disk.

use std::mem;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::models::Reading;
use crate::store::{
    resolve_location, AppConfig, AppPaths, ConfigStore, LoadIssue, PathHint, RecordStore,
    StoreError,
};

/// Outcome of pointing the session at a different data file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relocation {
    /// The session now reads and writes this file.
    Switched(PathBuf),
    /// Nothing changed: the file does not exist and creating it was not allowed.
    Missing(PathBuf),
    /// Nothing changed: the file exists and overwriting it was not allowed.
    Exists(PathBuf),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("No data to export.")]
    NothingToExport,
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct Session {
    paths: AppPaths,
    config: ConfigStore,
    store: RecordStore,
    readings: Vec<Reading>,
    load_issue: Option<LoadIssue>,
    corrupt_backup: Option<PathBuf>,
}

impl Session {
    /// Pick the data file (explicit hint, then the remembered path, then the
    /// platform default) and open it.
    pub fn start(paths: AppPaths, explicit: Option<&str>) -> Result<Self, StoreError> {
        let remembered = ConfigStore::from_paths(&paths)
            .load()
            .data_path
            .map(|path| path.to_string_lossy().into_owned());
        let hint = explicit
            .filter(|hint| !hint.trim().is_empty())
            .or(remembered.as_deref());
        let location = resolve_location(hint, &paths)?;
        Ok(Self::open(paths, location))
    }

    /// Bind to an already resolved location and load whatever is there.
    pub fn open(paths: AppPaths, location: PathBuf) -> Self {
        let config = ConfigStore::from_paths(&paths);
        let store = RecordStore::new(location, paths.home_dir());
        let mut session = Self {
            paths,
            config,
            store,
            readings: Vec::new(),
            load_issue: None,
            corrupt_backup: None,
        };
        session.reload();
        session
    }

    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    pub fn location(&self) -> &Path {
        self.store.path()
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    /// Why the last load came back empty, if it did.
    pub fn load_issue(&self) -> Option<&LoadIssue> {
        self.load_issue.as_ref()
    }

    /// Copy of a damaged data file taken during the last load.
    pub fn corrupt_backup(&self) -> Option<&Path> {
        self.corrupt_backup.as_deref()
    }

    pub fn append(&mut self, reading: Reading) -> Result<(), StoreError> {
        self.readings.push(reading);
        if let Err(err) = self.store.save(&self.readings) {
            self.readings.pop();
            return Err(err);
        }
        info!(count = self.readings.len(), "appended reading");
        Ok(())
    }

    pub fn clear_all(&mut self) -> Result<(), StoreError> {
        let previous = mem::take(&mut self.readings);
        if let Err(err) = self.store.save(&self.readings) {
            self.readings = previous;
            return Err(err);
        }
        info!(removed = previous.len(), "deleted all readings");
        Ok(())
    }

    pub fn export(&self, destination: Option<&Path>) -> Result<PathBuf, ExportError> {
        if self.readings.is_empty() {
            return Err(ExportError::NothingToExport);
        }
        Ok(self.store.export(&self.readings, destination)?)
    }

    /// Switch to the data file named by `hint`. A missing file is only created
    /// when `create_if_missing` is set; otherwise the caller gets
    /// [`Relocation::Missing`] and can ask first.
    pub fn relocate(
        &mut self,
        hint: &str,
        create_if_missing: bool,
    ) -> Result<Relocation, StoreError> {
        let target = PathHint::classify(Some(hint), &self.paths).absolute_target(&self.paths);
        if !target.exists() && !create_if_missing {
            return Ok(Relocation::Missing(target));
        }

        let location = resolve_location(Some(hint), &self.paths)?;
        let store = RecordStore::new(&location, self.paths.home_dir());
        store.create_empty(false)?;
        self.bind(store)?;
        Ok(Relocation::Switched(location))
    }

    /// Start a brand-new empty data file at `hint` and switch to it. An existing
    /// file is only replaced when `overwrite` is set.
    pub fn create_new_file(
        &mut self,
        hint: &str,
        overwrite: bool,
    ) -> Result<Relocation, StoreError> {
        let target = PathHint::classify(Some(hint), &self.paths).absolute_target(&self.paths);
        if target.exists() && !overwrite {
            return Ok(Relocation::Exists(target));
        }

        let location = resolve_location(Some(hint), &self.paths)?;
        let store = RecordStore::new(&location, self.paths.home_dir());
        store.create_empty(true)?;
        self.bind(store)?;
        Ok(Relocation::Switched(location))
    }

    fn bind(&mut self, store: RecordStore) -> Result<(), StoreError> {
        info!(from = %self.store.path().display(), to = %store.path().display(), "switching data file");
        self.store = store;
        self.reload();
        self.config.save(&AppConfig {
            data_path: Some(self.store.path().to_path_buf()),
        })
    }

    fn reload(&mut self) {
        self.corrupt_backup = None;
        match self.store.load_checked() {
            Ok(readings) => {
                info!(path = %self.store.path().display(), count = readings.len(), "loaded readings");
                self.readings = readings;
                self.load_issue = None;
            }
            Err(issue) => {
                self.readings = Vec::new();
                match &issue {
                    LoadIssue::Missing(_) => info!(%issue, "starting with no readings"),
                    LoadIssue::Corrupted { .. } => {
                        warn!(%issue, "starting with no readings");
                        match self.store.backup_corrupt() {
                            Ok(backup) => self.corrupt_backup = Some(backup),
                            Err(err) => warn!(error = %err, "could not back up damaged data file"),
                        }
                    }
                    LoadIssue::Unreadable { .. } => warn!(%issue, "starting with no readings"),
                }
                self.load_issue = Some(issue);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn paths_in(root: &Path) -> AppPaths {
        AppPaths::new(
            root.join("home"),
            root.join("data"),
            root.join("config").join("config.json"),
        )
    }

    fn session_in(dir: &TempDir) -> Session {
        Session::start(paths_in(dir.path()), None).unwrap()
    }

    fn reading(date: &str) -> Reading {
        Reading::new(date, 1.5, 2.0, 3.25)
    }

    #[test]
    fn start_uses_default_location_when_nothing_is_configured() {
        let dir = TempDir::new().unwrap();

        let session = session_in(&dir);

        assert!(session.location().ends_with("data/zaehlerstaende.json"));
        assert!(session.readings().is_empty());
        assert!(matches!(session.load_issue(), Some(LoadIssue::Missing(_))));
    }

    #[test]
    fn explicit_hint_beats_remembered_path() {
        let dir = TempDir::new().unwrap();
        let paths = paths_in(dir.path());
        let remembered = dir.path().join("remembered.json");
        ConfigStore::from_paths(&paths)
            .save(&AppConfig {
                data_path: Some(remembered.clone()),
            })
            .unwrap();

        let from_config = Session::start(paths.clone(), None).unwrap();
        assert_eq!(from_config.location().file_name(), remembered.file_name());

        let explicit = dir.path().join("explicit.json");
        let overridden = Session::start(paths, explicit.to_str()).unwrap();
        assert_eq!(overridden.location().file_name(), explicit.file_name());
    }

    #[test]
    fn append_persists_in_insertion_order() {
        let dir = TempDir::new().unwrap();
        let mut session = session_in(&dir);

        session.append(reading("01.02.2024")).unwrap();
        session.append(reading("01.01.2024")).unwrap();

        let reopened = session_in(&dir);
        assert_eq!(
            reopened.readings(),
            &[reading("01.02.2024"), reading("01.01.2024")]
        );
    }

    #[test]
    fn failed_append_rolls_back() {
        let dir = TempDir::new().unwrap();
        let paths = paths_in(dir.path());
        let blocked = dir.path().join("blocked.json");
        fs::create_dir(&blocked).unwrap();
        let mut session = Session::open(paths, blocked);

        let err = session.append(reading("01.01.2024")).unwrap_err();

        assert!(matches!(err, StoreError::Filesystem { .. }));
        assert!(session.readings().is_empty());
    }

    #[test]
    fn clear_all_empties_file_and_memory() {
        let dir = TempDir::new().unwrap();
        let mut session = session_in(&dir);
        session.append(reading("01.01.2024")).unwrap();

        session.clear_all().unwrap();

        assert!(session.readings().is_empty());
        assert_eq!(fs::read_to_string(session.location()).unwrap(), "[]");
    }

    #[test]
    fn export_refuses_empty_collection() {
        let dir = TempDir::new().unwrap();
        let session = session_in(&dir);

        assert!(matches!(
            session.export(None),
            Err(ExportError::NothingToExport)
        ));
    }

    #[test]
    fn export_defaults_to_home_directory() {
        let dir = TempDir::new().unwrap();
        let mut session = session_in(&dir);
        fs::create_dir_all(dir.path().join("home")).unwrap();
        session.append(reading("01.01.2024")).unwrap();

        let written = session.export(None).unwrap();

        assert_eq!(written.parent(), Some(dir.path().join("home").as_path()));
    }

    #[test]
    fn relocate_to_missing_file_asks_first() {
        let dir = TempDir::new().unwrap();
        let mut session = session_in(&dir);
        let before = session.location().to_path_buf();
        let target = dir.path().join("elsewhere").join("meters.json");

        let outcome = session.relocate(target.to_str().unwrap(), false).unwrap();

        assert_eq!(outcome, Relocation::Missing(target.clone()));
        assert_eq!(session.location(), before);
        assert!(!dir.path().join("elsewhere").exists());
    }

    #[test]
    fn relocate_with_consent_creates_file_and_remembers_it() {
        let dir = TempDir::new().unwrap();
        let mut session = session_in(&dir);
        session.append(reading("01.01.2024")).unwrap();
        let target = dir.path().join("elsewhere").join("meters.json");

        let outcome = session.relocate(target.to_str().unwrap(), true).unwrap();

        let Relocation::Switched(location) = outcome else {
            panic!("expected a switch, got {outcome:?}");
        };
        assert_eq!(session.location(), location);
        assert!(session.readings().is_empty());
        assert_eq!(fs::read_to_string(&location).unwrap(), "[]");
        let config = ConfigStore::from_paths(session.paths()).load();
        assert_eq!(config.data_path, Some(location));
    }

    #[test]
    fn relocate_to_existing_file_loads_its_readings() {
        let dir = TempDir::new().unwrap();
        let other = dir.path().join("other.json");
        RecordStore::new(&other, dir.path())
            .save(&[reading("24.12.2023")])
            .unwrap();
        let mut session = session_in(&dir);

        session.relocate(other.to_str().unwrap(), false).unwrap();

        assert_eq!(session.readings(), &[reading("24.12.2023")]);
    }

    #[test]
    fn create_new_file_needs_consent_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let existing = dir.path().join("existing.json");
        RecordStore::new(&existing, dir.path())
            .save(&[reading("01.01.2024")])
            .unwrap();
        let mut session = session_in(&dir);

        let outcome = session
            .create_new_file(existing.to_str().unwrap(), false)
            .unwrap();
        assert_eq!(outcome, Relocation::Exists(existing.clone()));
        assert_eq!(
            RecordStore::new(&existing, dir.path()).load(),
            vec![reading("01.01.2024")]
        );

        let outcome = session
            .create_new_file(existing.to_str().unwrap(), true)
            .unwrap();
        assert!(matches!(outcome, Relocation::Switched(_)));
        assert!(session.readings().is_empty());
        assert_eq!(fs::read_to_string(&existing).unwrap(), "[]");
    }

    #[test]
    fn corrupted_file_is_backed_up_and_reported() {
        let dir = TempDir::new().unwrap();
        let paths = paths_in(dir.path());
        let location = resolve_location(None, &paths).unwrap();
        fs::write(&location, "oops").unwrap();

        let session = Session::open(paths, location);

        assert!(session.readings().is_empty());
        assert!(session.load_issue().unwrap().is_corrupted());
        let backup = session.corrupt_backup().unwrap();
        assert_eq!(fs::read_to_string(backup).unwrap(), "oops");
    }

    #[test]
    fn restarting_on_a_damaged_file_keeps_a_single_backup() {
        let dir = TempDir::new().unwrap();
        let paths = paths_in(dir.path());
        let location = resolve_location(None, &paths).unwrap();
        fs::write(&location, "oops").unwrap();

        let first = Session::open(paths.clone(), location.clone());
        let second = Session::open(paths, location.clone());

        assert_eq!(first.corrupt_backup(), second.corrupt_backup());
        let backups = fs::read_dir(location.parent().unwrap())
            .unwrap()
            .filter(|entry| {
                entry
                    .as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .contains(".corrupt-")
            })
            .count();
        assert_eq!(backups, 1);
    }
}
