use chrono::{DateTime, Local, Utc};
use tracing::{info, warn};

use crate::cli::Args;
use crate::cloud::CloudDatabasesTrait;
use crate::error::{describe, Failure};
use crate::retention::{
    backup_name, default_description, deletion_candidates, rotate, select_backup_set, WaitPolicy,
};
use crate::types::Backup;

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub instance_id: String,
    pub backup_prefix: String,
    pub retention: usize,
    pub description: Option<String>,
    pub strict_names: bool,
    pub dry_run: bool,
    pub wait: WaitPolicy,
}

impl RunConfig {
    pub fn from_args(args: &Args) -> Self {
        Self {
            instance_id: args.instance.clone(),
            backup_prefix: args.backup.clone(),
            retention: args.number,
            description: args.description.clone(),
            strict_names: args.strict_names,
            dry_run: args.dry_run,
            wait: WaitPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub backup_name: String,
    /// `None` on a dry run.
    pub created: Option<Backup>,
    /// The backup set after creation, newest first.
    pub matches: Vec<Backup>,
    /// Deleted backups in deletion order, or the ones a dry run would delete.
    pub deleted: Vec<Backup>,
    pub dry_run: bool,
}

pub struct App {
    pub cloud_client: Box<dyn CloudDatabasesTrait>,
    pub config: RunConfig,
}

impl App {
    pub fn new(cloud_client: Box<dyn CloudDatabasesTrait>, config: RunConfig) -> Self {
        Self {
            cloud_client,
            config,
        }
    }

    /// Create a backup, then rotate the set. Stops at the first failure.
    pub async fn run(&self, now: DateTime<Local>) -> Result<RunSummary, Failure> {
        let config = &self.config;
        let client = self.cloud_client.as_ref();

        let instance = match client.find_instance(&config.instance_id).await {
            Ok(Some(instance)) => instance,
            Ok(None) => return Err(Failure::InstanceNotFound(config.instance_id.clone())),
            Err(e) => {
                return Err(Failure::InstanceNotFound(format!(
                    "{} ({})",
                    config.instance_id,
                    describe(&e)
                )))
            }
        };
        info!(instance = %instance.id, name = %instance.name, status = %instance.status, "found instance");

        let name = backup_name(&config.backup_prefix, now);
        let description = config
            .description
            .clone()
            .unwrap_or_else(|| default_description(now));

        let created = if config.dry_run {
            warn!("Dry run: would create backup '{name}' of '{}'", instance.id);
            None
        } else {
            info!("Creating backup of '{}'", instance.id);
            let backup = client
                .create_backup(&instance.id, &name, &description)
                .await
                .map_err(|e| Failure::BackupCreation(describe(&e)))?;
            info!("Successful backup of '{}' named '{}'", instance.id, backup.name);
            Some(backup)
        };

        let mut listed = client
            .list_backups(&instance.id)
            .await
            .map_err(|e| Failure::BackupListing(describe(&e)))?;
        if config.dry_run {
            listed.insert(0, planned_backup(&name, now.with_timezone(&Utc)));
        }

        let matches = select_backup_set(&listed, &config.backup_prefix, config.strict_names);
        info!("Current backups below");
        for backup in &matches {
            info!("Name: '{}' Created '{}'", backup.name, backup.created_display());
        }

        let excess = deletion_candidates(&matches, config.retention);
        if !excess.is_empty() {
            warn!(
                "There are '{}' backups. Need to delete '{}'.",
                matches.len(),
                excess.len()
            );
        }

        let deleted = if config.dry_run {
            for backup in excess {
                warn!(
                    "Dry run: would delete Name: '{}' Created '{}'",
                    backup.name,
                    backup.created_display()
                );
            }
            excess.to_vec()
        } else {
            rotate(
                client,
                &instance.id,
                &matches,
                config.retention,
                config.wait,
            )
            .await?
        };

        Ok(RunSummary {
            backup_name: name,
            created,
            matches,
            deleted,
            dry_run: config.dry_run,
        })
    }
}

/// Stand-in for the backup a dry run skips, so the retention preview
/// counts it the way a real run would.
fn planned_backup(name: &str, created: DateTime<Utc>) -> Backup {
    Backup {
        id: String::new(),
        name: name.to_string(),
        created: Some(created),
        status: "PLANNED".to_string(),
    }
}
