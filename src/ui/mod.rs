//! Ratatui front-end: one list of readings plus a handful of modal dialogs.

mod app;
mod forms;
mod helpers;
mod terminal;

pub use app::App;
pub use terminal::run_app;
