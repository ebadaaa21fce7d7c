//! The small JSON file that remembers which data file was used last.
//!
//! The file holds a single object. The `datenpfad` key is the one earlier
//! releases wrote, so an existing configuration keeps pointing at the same
//! data after an upgrade:
//!
//! ```json
//! {
//!   "datenpfad": "/home/me/Dokumente/zaehlerstaende.json"
//! }
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::atomic::write_atomic;
use super::error::StoreError;
use super::location::AppPaths;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Last data file the user settled on.
    #[serde(rename = "datenpfad", default, skip_serializing_if = "Option::is_none")]
    pub data_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_paths(paths: &AppPaths) -> Self {
        Self::new(paths.config_file())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the configuration. An absent, unreadable or malformed file yields
    /// the defaults; whether a remembered path still exists is the caller's
    /// problem.
    pub fn load(&self) -> AppConfig {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return AppConfig::default(),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "could not read config");
                return AppConfig::default();
            }
        };

        serde_json::from_str(&text).unwrap_or_else(|err| {
            warn!(path = %self.path.display(), error = %err, "ignoring malformed config");
            AppConfig::default()
        })
    }

    pub fn save(&self, config: &AppConfig) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(config)?;
        write_atomic(&self.path, json.as_bytes())?;
        info!(path = %self.path.display(), data_path = ?config.data_path, "saved config");
        Ok(())
    }
}
