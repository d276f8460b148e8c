use std::path::PathBuf;

use clap::Parser;

use crate::credentials::DEFAULT_CREDENTIALS_FILE;
use crate::types::Region;

pub const EMAIL_DISABLED: &str = "0";

#[derive(Debug, Clone, Parser)]
#[command(
    name = "cdb-snap-crab",
    version,
    about = "Backup your Rackspace cloud database instance and rotate old backups"
)]
pub struct Args {
    /// The UUID of your cloud database instance
    #[arg(short, long, value_name = "INSTANCE")]
    pub instance: String,

    /// The identifying name of your backup set
    #[arg(short, long, value_name = "BACKUP", value_parser = non_empty)]
    pub backup: String,

    /// The number of backups to keep, 0 keeps all
    #[arg(short, long, value_name = "NUMBER", default_value_t = 7)]
    pub number: usize,

    /// A short description of the backup
    #[arg(short, long, value_name = "DESCRIPTION")]
    pub description: Option<String>,

    /// The location of your credentials file
    #[arg(short, long, value_name = "CREDENTIALS_FILE", default_value = DEFAULT_CREDENTIALS_FILE)]
    pub credfile: PathBuf,

    /// Directory to write cdb-snap-crab.log into
    #[arg(short, long, value_name = "LOG_DIRECTORY", default_value = "/var/log")]
    pub logdir: PathBuf,

    /// Region of the instance (defaults to the credentials file, then LON)
    #[arg(short, long, value_enum, ignore_case = true)]
    pub region: Option<Region>,

    /// Address to notify when the run finishes, 0 disables
    #[arg(short, long, value_name = "EMAIL", default_value = EMAIL_DISABLED)]
    pub email: String,

    /// Mail transfer agent used to send notifications
    #[arg(long, value_name = "PATH", default_value = "/usr/sbin/sendmail")]
    pub sendmail: PathBuf,

    /// Only treat `<backup>-YYMMDDHHmm` names as part of the set
    #[arg(long)]
    pub strict_names: bool,

    /// Report what would be created and deleted without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Turn on debug verbosity
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn notify_address(&self) -> Option<&str> {
        let address = self.email.trim();
        (address != EMAIL_DISABLED && !address.is_empty()).then_some(address)
    }

    /// Flag wins over the credentials file, which wins over LON.
    pub fn resolve_region(&self, from_credentials: Option<Region>) -> Region {
        self.region.or(from_credentials).unwrap_or_default()
    }
}

fn non_empty(value: &str) -> Result<String, String> {
    if value.trim().is_empty() {
        Err("backup name must not be empty".to_string())
    } else {
        Ok(value.to_string())
    }
}
