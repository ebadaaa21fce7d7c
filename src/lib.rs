//! Core library for the meter-reading manager.
//!
//! `store` knows where the data file lives and how readings, exports and the
//! configuration are written. `session` keeps the on-screen list in step with
//! the file, and `ui` is the terminal front-end driving it.
pub mod models;
pub mod session;
pub mod store;
pub mod ui;

pub use models::Reading;
pub use session::{ExportError, Relocation, Session};
pub use store::{resolve_location, AppPaths, ConfigStore, RecordStore, StoreError};
pub use ui::{run_app, App};
