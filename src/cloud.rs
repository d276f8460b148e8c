use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::debug;

use crate::credentials::Credentials;
use crate::types::{
    ApiKeyCredentials, AuthCredentials, AuthRequest, AuthResponse, Backup, BackupEnvelope,
    BackupListEnvelope, CatalogEntry, CreateBackupBody, CreateBackupRequest, Instance,
    InstanceEnvelope, Region,
};

pub const IDENTITY_URL: &str = "https://identity.api.rackspacecloud.com/v2.0/tokens";
const DATABASE_SERVICE_TYPE: &str = "rax:database";

#[mockall::automock]
#[async_trait]
pub trait CloudDatabasesTrait: Send + Sync {
    /// `Ok(None)` when the provider has no instance with this id.
    async fn find_instance(&self, instance_id: &str) -> Result<Option<Instance>>;
    async fn create_backup(
        &self,
        instance_id: &str,
        name: &str,
        description: &str,
    ) -> Result<Backup>;
    async fn list_backups(&self, instance_id: &str) -> Result<Vec<Backup>>;
    async fn delete_backup(&self, backup: &Backup) -> Result<()>;
    async fn instance_status(&self, instance_id: &str) -> Result<String>;
}

pub struct CloudDatabasesClient {
    client: Client,
    token: String,
    base_url: String,
}

impl CloudDatabasesClient {
    /// Exchanges the API key for a token and resolves the regional
    /// Cloud Databases endpoint from the service catalog.
    pub async fn authenticate(
        identity_url: &str,
        credentials: &Credentials,
        region: Region,
    ) -> Result<Self> {
        let client = Client::new();
        let request = AuthRequest {
            auth: AuthCredentials {
                api_key_credentials: ApiKeyCredentials {
                    username: credentials.username.clone(),
                    api_key: credentials.api_key.clone(),
                },
            },
        };

        let response = client
            .post(identity_url)
            .json(&request)
            .send()
            .await
            .context("contacting identity service")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "identity service rejected credentials for '{}': {}",
                credentials.username,
                response.status()
            ));
        }

        let auth: AuthResponse = response.json().await?;
        let base_url = database_endpoint(&auth.access.service_catalog, region)?;
        debug!(%region, %base_url, "resolved cloud databases endpoint");

        Ok(Self {
            client,
            token: auth.access.token.id,
            base_url,
        })
    }

    /// Client for an already known endpoint and token.
    pub fn with_endpoint(base_url: &str, token: &str) -> Self {
        Self {
            client: Client::new(),
            token: token.to_string(),
            base_url: base_url.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request
            .header("X-Auth-Token", &self.token)
            .header("Accept", "application/json")
            .send()
            .await?;
        Ok(response)
    }
}

/// Picks the `rax:database` endpoint for `region` out of the catalog.
pub fn database_endpoint(catalog: &[CatalogEntry], region: Region) -> Result<String> {
    let service = catalog
        .iter()
        .find(|entry| entry.service_type == DATABASE_SERVICE_TYPE)
        .ok_or_else(|| anyhow!("service catalog has no cloud databases entry"))?;

    service
        .endpoints
        .iter()
        .find(|endpoint| {
            endpoint
                .region
                .as_deref()
                .is_some_and(|r| r.eq_ignore_ascii_case(region.code()))
        })
        .map(|endpoint| endpoint.public_url.clone())
        .ok_or_else(|| anyhow!("{} has no endpoint in region {}", service.name, region))
}

async fn error_text(response: Response) -> String {
    let status = response.status();
    match response.text().await {
        Ok(body) if !body.trim().is_empty() => format!("{status}: {}", body.trim()),
        _ => status.to_string(),
    }
}

#[async_trait]
impl CloudDatabasesTrait for CloudDatabasesClient {
    async fn find_instance(&self, instance_id: &str) -> Result<Option<Instance>> {
        let url = self.url(&format!("instances/{instance_id}"));
        let response = self.send(self.client.get(&url)).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(anyhow!("Failed to look up instance: {}", error_text(response).await));
        }

        let envelope: InstanceEnvelope = response.json().await?;
        Ok(Some(envelope.instance.into()))
    }

    async fn create_backup(
        &self,
        instance_id: &str,
        name: &str,
        description: &str,
    ) -> Result<Backup> {
        let request_body = CreateBackupRequest {
            backup: CreateBackupBody {
                instance: instance_id.to_string(),
                name: name.to_string(),
                description: description.to_string(),
            },
        };

        let response = self
            .send(self.client.post(self.url("backups")).json(&request_body))
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Create backup operation failed: {}",
                error_text(response).await
            ));
        }

        let envelope: BackupEnvelope = response.json().await?;
        Ok(envelope.backup.into())
    }

    async fn list_backups(&self, instance_id: &str) -> Result<Vec<Backup>> {
        let url = self.url(&format!("instances/{instance_id}/backups"));
        let response = self.send(self.client.get(&url)).await?;

        if !response.status().is_success() {
            return Err(anyhow!("Failed to list backups: {}", error_text(response).await));
        }

        let envelope: BackupListEnvelope = response.json().await?;
        Ok(envelope.backups.into_iter().map(Backup::from).collect())
    }

    async fn delete_backup(&self, backup: &Backup) -> Result<()> {
        let url = self.url(&format!("backups/{}", backup.id));
        let response = self.send(self.client.delete(&url)).await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Delete backup operation failed: {}",
                error_text(response).await
            ));
        }
        Ok(())
    }

    async fn instance_status(&self, instance_id: &str) -> Result<String> {
        self.find_instance(instance_id)
            .await?
            .map(|instance| instance.status)
            .ok_or_else(|| anyhow!("instance '{instance_id}' disappeared"))
    }
}
