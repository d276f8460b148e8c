use std::path::PathBuf;

use thiserror::Error;

/// Exit code for command-line usage errors (`EX_USAGE`), kept clear of the
/// codes `Failure` uses.
pub const USAGE_EXIT_CODE: u8 = 64;

/// Every way a run can stop. Each variant maps to the process exit code
/// cron wrappers already check for.
#[derive(Debug, Error)]
pub enum Failure {
    #[error("log directory {path:?} is not writable: {message}")]
    LogDirectory { path: PathBuf, message: String },
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("credentials file {0:?} not found")]
    CredentialsNotFound(PathBuf),
    #[error("credentials file {path:?} is invalid: {message}")]
    CredentialsInvalid { path: PathBuf, message: String },
    #[error("no instances found matching '{0}'")]
    InstanceNotFound(String),
    #[error("backup creation failed: {0}")]
    BackupCreation(String),
    #[error("deleting backup '{name}' failed: {message}")]
    BackupDeletion { name: String, message: String },
    #[error("instance '{instance}' did not reach {status}: {message}")]
    StatusTimeout {
        instance: String,
        status: String,
        message: String,
    },
    #[error("listing backups failed: {0}")]
    BackupListing(String),
}

impl Failure {
    pub fn exit_code(&self) -> i32 {
        match self {
            Failure::LogDirectory { .. } => 1,
            Failure::Authentication(_) => 2,
            Failure::CredentialsNotFound(_) | Failure::CredentialsInvalid { .. } => 3,
            Failure::InstanceNotFound(_) => 4,
            Failure::BackupCreation(_) => 5,
            Failure::BackupDeletion { .. } => 6,
            Failure::StatusTimeout { .. } => 7,
            Failure::BackupListing(_) => 8,
        }
    }
}

/// Renders an `anyhow` chain on one line for log and mail text.
pub(crate) fn describe(err: &anyhow::Error) -> String {
    format!("{err:#}")
}
