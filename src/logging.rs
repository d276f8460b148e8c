use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::level_filters::LevelFilter;
use tracing::subscriber::DefaultGuard;
use tracing::Subscriber;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, Registry};

use crate::error::Failure;

pub const LOG_FILE_NAME: &str = "cdb-snap-crab.log";

#[derive(Debug, Clone)]
pub struct LogSettings {
    pub directory: PathBuf,
    pub verbose: bool,
}

impl LogSettings {
    pub fn level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::DEBUG
        } else {
            LevelFilter::WARN
        }
    }

    pub fn file_path(&self) -> PathBuf {
        self.directory.join(LOG_FILE_NAME)
    }
}

/// Opens `<directory>/cdb-snap-crab.log` for appending, creating the
/// directory if needed.
pub fn open_log_file(directory: &Path) -> Result<File, Failure> {
    let failure = |e: std::io::Error| Failure::LogDirectory {
        path: directory.to_path_buf(),
        message: e.to_string(),
    };
    fs::create_dir_all(directory).map_err(failure)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(directory.join(LOG_FILE_NAME))
        .map_err(failure)
}

/// Console (stderr) plus log file, both at the level `settings` selects.
pub fn build_subscriber(settings: &LogSettings) -> Result<impl Subscriber + Send + Sync, Failure> {
    let file = open_log_file(&settings.directory)?;

    let console = fmt::layer().with_writer(std::io::stderr).with_target(false);
    let logfile = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false);

    Ok(Registry::default()
        .with(settings.level())
        .with(console)
        .with(logfile))
}

/// Installs the subscriber for the current thread until the guard drops.
pub fn install(settings: &LogSettings) -> Result<DefaultGuard, Failure> {
    let subscriber = build_subscriber(settings)?;
    Ok(tracing::subscriber::set_default(subscriber))
}
