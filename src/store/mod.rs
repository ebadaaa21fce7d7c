//! Persistence module split across logical submodules: where the data file
//! lives, how readings are read and written, the CSV export format, and the
//! small configuration file that remembers the last data file.

mod atomic;
mod config;
mod error;
mod export;
mod location;
mod records;

pub use config::{AppConfig, ConfigStore};
pub use error::{LoadIssue, StoreError};
pub use export::{decimal_comma, default_export_path, render_csv, CSV_HEADER};
pub use location::{resolve_location, AppPaths, PathHint, DEFAULT_FILE_NAME};
pub use records::{CreateOutcome, RecordStore};
