//! Binary entry point: work out where the data lives, open it, and hand the
//! session to the terminal UI.
use std::env;
use std::fs::File;
use std::sync::Mutex;

use anyhow::{Context, Result};
use meter_reading_manager::{run_app, App, AppPaths, Session};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Overrides the data file location when no argument is given.
const DATA_ENV_VAR: &str = "ZAEHLERSTAENDE_DATA";

const USAGE: &str = "usage: meter-reading-manager [DATA_FILE_OR_DIRECTORY]

Records electricity, gas and water meter readings in a JSON file.
The location can also be set with ZAEHLERSTAENDE_DATA.";

fn main() -> Result<()> {
    let argument = env::args().nth(1);
    if matches!(argument.as_deref(), Some("-h" | "--help")) {
        println!("{USAGE}");
        return Ok(());
    }

    let paths = AppPaths::from_platform().context("failed to locate the home directory")?;
    // Runs without a log when the data root is not writable.
    match paths.open_log_file() {
        Ok(file) => init_logging(file),
        Err(err) => eprintln!("warning: file logging disabled: {err}"),
    }

    let hint = argument.or_else(|| env::var(DATA_ENV_VAR).ok());
    let session = Session::start(paths, hint.as_deref())
        .context("failed to prepare the data file location")?;
    info!(path = %session.location().display(), "session started");

    let mut app = App::new(session);
    run_app(&mut app)
}

/// Route `tracing` output to the log file. The terminal belongs to the UI, so
/// nothing may be written to stdout or stderr while it runs.
fn init_logging(file: File) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
}
