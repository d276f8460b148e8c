use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub id: String,
    pub name: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Backup {
    pub id: String,
    pub name: String,
    pub created: Option<DateTime<Utc>>,
    pub status: String,
}

impl Backup {
    /// Creation time as shown in log lines, `unknown` when the provider sent none.
    pub fn created_display(&self) -> String {
        match self.created {
            Some(created) => created.format("%Y-%m-%dT%H:%M:%S").to_string(),
            None => "unknown".to_string(),
        }
    }
}

/// Rackspace data centers hosting Cloud Databases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "UPPER")]
pub enum Region {
    Ord,
    Dfw,
    #[default]
    Lon,
    Syd,
    Iad,
    Hkg,
}

impl Region {
    pub fn code(&self) -> &'static str {
        match self {
            Region::Ord => "ORD",
            Region::Dfw => "DFW",
            Region::Lon => "LON",
            Region::Syd => "SYD",
            Region::Iad => "IAD",
            Region::Hkg => "HKG",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Serialize)]
pub struct AuthRequest {
    pub auth: AuthCredentials,
}

#[derive(Debug, Serialize)]
pub struct AuthCredentials {
    #[serde(rename = "RAX-KSKEY:apiKeyCredentials")]
    pub api_key_credentials: ApiKeyCredentials,
}

#[derive(Debug, Serialize)]
pub struct ApiKeyCredentials {
    pub username: String,
    #[serde(rename = "apiKey")]
    pub api_key: String,
}

#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    pub access: AccessInfo,
}

#[derive(Debug, Deserialize)]
pub struct AccessInfo {
    pub token: TokenInfo,
    #[serde(rename = "serviceCatalog", default)]
    pub service_catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
pub struct TokenInfo {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub endpoints: Vec<CatalogEndpoint>,
}

#[derive(Debug, Deserialize)]
pub struct CatalogEndpoint {
    pub region: Option<String>,
    #[serde(rename = "publicURL")]
    pub public_url: String,
}

#[derive(Debug, Deserialize)]
pub struct InstanceEnvelope {
    pub instance: InstancePayload,
}

#[derive(Debug, Deserialize)]
pub struct InstancePayload {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
}

impl From<InstancePayload> for Instance {
    fn from(payload: InstancePayload) -> Self {
        Instance {
            id: payload.id,
            name: payload.name,
            status: payload.status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateBackupRequest {
    pub backup: CreateBackupBody,
}

#[derive(Debug, Serialize)]
pub struct CreateBackupBody {
    pub instance: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct BackupEnvelope {
    pub backup: BackupPayload,
}

#[derive(Debug, Deserialize)]
pub struct BackupListEnvelope {
    #[serde(default)]
    pub backups: Vec<BackupPayload>,
}

#[derive(Debug, Deserialize)]
pub struct BackupPayload {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub created: Option<String>,
    #[serde(default)]
    pub status: String,
}

impl From<BackupPayload> for Backup {
    fn from(payload: BackupPayload) -> Self {
        Backup {
            id: payload.id,
            name: payload.name,
            created: payload.created.as_deref().and_then(parse_provider_timestamp),
            status: payload.status,
        }
    }
}

/// Cloud Databases reports `created` either as RFC 3339 or as a bare
/// `YYYY-MM-DDTHH:MM:SS`, which is UTC.
pub fn parse_provider_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}
