use std::env;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use ini::{Ini, Properties};

use crate::error::Failure;
use crate::types::Region;

pub const DEFAULT_CREDENTIALS_FILE: &str = "~/.rackspace_cloud_credentials";
const SECTION: &str = "rackspace_cloud";

/// The pyrax credentials file:
///
/// ```ini
/// [rackspace_cloud]
/// username = myusername
/// api_key = 01234567890abcdef
/// region = LON
/// ```
///
/// Values may also be quoted.
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub username: String,
    pub api_key: String,
    pub region: Option<Region>,
}

/// Expands a leading `~` to `$HOME`.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest),
        None => path.to_path_buf(),
    }
}

pub fn load_credentials(path: &Path) -> Result<Credentials, Failure> {
    let path = expand_home(path);
    if !path.is_file() {
        return Err(Failure::CredentialsNotFound(path));
    }

    let invalid = |message: String| Failure::CredentialsInvalid {
        path: path.clone(),
        message,
    };

    let contents = std::fs::read_to_string(&path).map_err(|e| invalid(e.to_string()))?;
    let ini = Ini::load_from_str(&contents).map_err(|e| invalid(e.to_string()))?;
    let section = ini
        .section(Some(SECTION))
        .ok_or_else(|| invalid(format!("missing [{SECTION}] section")))?;

    let username = required(section, "username").map_err(&invalid)?;
    let api_key = required(section, "api_key").map_err(&invalid)?;
    let region = match section.get("region").map(str::trim) {
        None | Some("") => None,
        Some(code) => Some(
            Region::from_str(code, true).map_err(|_| invalid(format!("unknown region '{code}'")))?,
        ),
    };

    Ok(Credentials {
        username,
        api_key,
        region,
    })
}

fn required(section: &Properties, key: &str) -> Result<String, String> {
    match section.get(key).map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(format!("{key} must be set and not empty")),
    }
}
