//! Resolution of the data-file location.
//!
//! A location hint arrives from the command line, the environment, the
//! remembered configuration, or the settings dialog. It may name a directory,
//! a concrete `.json` file, or nothing at all. [`PathHint`] makes that
//! decision once; [`resolve_location`] turns it into an absolute path whose
//! parent directory exists.

use std::env;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use tracing::debug;

use super::error::StoreError;

/// Folder name used beneath the platform data and config roots.
const APP_DIR_NAME: &str = "zaehlerstaende";
/// Data file name used when the hint only names a directory.
pub const DEFAULT_FILE_NAME: &str = "zaehlerstaende.json";
const CONFIG_FILE_NAME: &str = "config.json";
const LOG_FILE_NAME: &str = "zaehlerstaende.log";
/// Extension that marks a hint as a concrete data file.
const DATA_EXTENSION: &str = "json";

/// Every platform directory the application touches, gathered once at startup
/// and handed to the stores explicitly.
#[derive(Debug, Clone)]
pub struct AppPaths {
    home_dir: PathBuf,
    data_dir: PathBuf,
    config_file: PathBuf,
    default_file_name: String,
}

impl AppPaths {
    /// Look up the per-user directories for the current platform. On Linux this
    /// is `~/.local/share/zaehlerstaende` and `~/.config/zaehlerstaende`,
    /// honoring the XDG overrides.
    pub fn from_platform() -> Result<Self, StoreError> {
        let base_dirs = BaseDirs::new().ok_or(StoreError::NoHomeDirectory)?;
        Ok(Self::new(
            base_dirs.home_dir(),
            base_dirs.data_dir().join(APP_DIR_NAME),
            base_dirs
                .config_dir()
                .join(APP_DIR_NAME)
                .join(CONFIG_FILE_NAME),
        ))
    }

    pub fn new(
        home_dir: impl Into<PathBuf>,
        data_dir: impl Into<PathBuf>,
        config_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            home_dir: home_dir.into(),
            data_dir: data_dir.into(),
            config_file: config_file.into(),
            default_file_name: DEFAULT_FILE_NAME.to_string(),
        }
    }

    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    pub fn default_file_name(&self) -> &str {
        &self.default_file_name
    }

    /// Where readings live when nobody asked for anything else.
    pub fn default_location(&self) -> PathBuf {
        self.data_dir.join(&self.default_file_name)
    }

    pub fn log_file(&self) -> PathBuf {
        self.data_dir.join(LOG_FILE_NAME)
    }

    /// Open the log file for appending, creating the data directory first.
    pub fn open_log_file(&self) -> Result<File, StoreError> {
        let log_file = self.log_file();
        fs::create_dir_all(&self.data_dir).map_err(StoreError::at(&self.data_dir))?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .map_err(StoreError::at(&log_file))
    }

    /// Expand a leading `~` to the home directory.
    pub fn expand_home(&self, raw: &str) -> PathBuf {
        if raw == "~" {
            return self.home_dir.clone();
        }
        match raw
            .strip_prefix("~/")
            .or_else(|| raw.strip_prefix("~\\"))
        {
            Some(rest) => self.home_dir.join(rest),
            None => PathBuf::from(raw),
        }
    }
}

/// What a location hint turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathHint {
    Absent,
    Directory(PathBuf),
    File(PathBuf),
}

impl PathHint {
    /// Classify a raw hint. An existing directory always wins, even one whose
    /// name ends in `.json`; only then does the extension decide.
    pub fn classify(hint: Option<&str>, paths: &AppPaths) -> Self {
        let Some(raw) = hint.map(str::trim).filter(|raw| !raw.is_empty()) else {
            return PathHint::Absent;
        };

        let path = paths.expand_home(raw);
        if path.is_dir() {
            PathHint::Directory(path)
        } else if has_data_extension(&path) {
            PathHint::File(path)
        } else {
            PathHint::Directory(path)
        }
    }

    /// The data file this hint points at, not yet made absolute.
    pub fn target(&self, paths: &AppPaths) -> PathBuf {
        match self {
            PathHint::Absent => paths.default_location(),
            PathHint::Directory(dir) => dir.join(paths.default_file_name()),
            PathHint::File(file) => file.clone(),
        }
    }

    /// The target joined onto the working directory when relative. Nothing is
    /// created on disk.
    pub fn absolute_target(&self, paths: &AppPaths) -> PathBuf {
        let target = self.target(paths);
        if target.is_absolute() {
            return target;
        }
        match env::current_dir() {
            Ok(cwd) => cwd.join(target),
            Err(_) => target,
        }
    }
}

/// Turn a hint into the absolute path of the data file, creating every missing
/// ancestor directory on the way. The file itself is not created.
pub fn resolve_location(hint: Option<&str>, paths: &AppPaths) -> Result<PathBuf, StoreError> {
    let decision = PathHint::classify(hint, paths);
    let target = decision.target(paths);
    let resolved = ensure_parent(&target)?;
    debug!(?decision, path = %resolved.display(), "resolved data location");
    Ok(resolved)
}

fn has_data_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(DATA_EXTENSION))
        .unwrap_or(false)
}

/// Create the parent of `target` and return `target` with that parent in
/// canonical form. An existing file is canonicalized whole, so a symlinked
/// data file resolves to the file it points at.
fn ensure_parent(target: &Path) -> Result<PathBuf, StoreError> {
    if target.is_file() {
        return fs::canonicalize(target).map_err(StoreError::at(target));
    }

    let parent = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(StoreError::at(parent))?;
    let parent = fs::canonicalize(parent).map_err(StoreError::at(parent))?;

    Ok(match target.file_name() {
        Some(name) => parent.join(name),
        None => parent.join(DEFAULT_FILE_NAME),
    })
}
