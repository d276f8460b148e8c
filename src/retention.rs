use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::cloud::CloudDatabasesTrait;
use crate::error::{describe, Failure};
use crate::types::Backup;

pub const ACTIVE: &str = "ACTIVE";
const SUFFIX_LEN: usize = 10;

/// How long to wait for an instance to settle after each deletion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaitPolicy {
    pub interval: Duration,
    pub attempts: u32,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            attempts: 30,
        }
    }
}

/// `<prefix>-YYMMDDHHmm`, minute resolution.
pub fn backup_name(prefix: &str, now: DateTime<Local>) -> String {
    format!("{prefix}-{}", now.format("%y%m%d%H%M"))
}

pub fn default_description(now: DateTime<Local>) -> String {
    format!("Created on {}", now.format("%Y-%b-%d-%H:%M"))
}

fn has_timestamp_suffix(name: &str, prefix: &str) -> bool {
    name.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('-'))
        .is_some_and(|suffix| {
            suffix.len() == SUFFIX_LEN && suffix.bytes().all(|b| b.is_ascii_digit())
        })
}

/// Filters `backups` down to the set named by `prefix`, newest first.
///
/// Ordering uses the provider's creation timestamp. The sort is stable, so
/// backups created at the same instant keep the order the provider listed
/// them in, and backups without a timestamp go last. With `strict` set, a
/// name must also be exactly `<prefix>-` followed by ten digits.
pub fn select_backup_set(backups: &[Backup], prefix: &str, strict: bool) -> Vec<Backup> {
    let mut matches: Vec<Backup> = backups
        .iter()
        .filter(|backup| backup.name.starts_with(prefix))
        .filter(|backup| !strict || has_timestamp_suffix(&backup.name, prefix))
        .cloned()
        .collect();
    matches.sort_by(|a, b| b.created.cmp(&a.created));
    matches
}

/// The tail of `matches` past the `keep` newest. `keep == 0` retains everything.
pub fn deletion_candidates(matches: &[Backup], keep: usize) -> &[Backup] {
    if keep == 0 || matches.len() <= keep {
        return &[];
    }
    &matches[keep..]
}

/// Polls the instance until it reports `status`, giving up after
/// `policy.attempts` reads.
pub async fn wait_for_status(
    client: &dyn CloudDatabasesTrait,
    instance_id: &str,
    status: &str,
    policy: WaitPolicy,
) -> Result<(), Failure> {
    let timeout = |message: String| Failure::StatusTimeout {
        instance: instance_id.to_string(),
        status: status.to_string(),
        message,
    };

    let mut last_seen = String::new();
    for attempt in 1..=policy.attempts {
        last_seen = client
            .instance_status(instance_id)
            .await
            .map_err(|e| timeout(describe(&e)))?;
        debug!(attempt, status = %last_seen, "polled instance status");
        if last_seen == status {
            return Ok(());
        }
        if attempt < policy.attempts {
            sleep(policy.interval).await;
        }
    }

    Err(timeout(format!(
        "still {last_seen} after {} attempts",
        policy.attempts
    )))
}

/// Deletes everything past the `keep` newest in `matches`, in list order,
/// waiting for the instance to return to ACTIVE after each deletion. The
/// first failure stops the rotation.
pub async fn rotate(
    client: &dyn CloudDatabasesTrait,
    instance_id: &str,
    matches: &[Backup],
    keep: usize,
    policy: WaitPolicy,
) -> Result<Vec<Backup>, Failure> {
    let candidates = deletion_candidates(matches, keep);
    let mut deleted = Vec::with_capacity(candidates.len());

    for backup in candidates {
        warn!(
            "Deleting Name: '{}' Created '{}'",
            backup.name,
            backup.created_display()
        );
        client
            .delete_backup(backup)
            .await
            .map_err(|e| Failure::BackupDeletion {
                name: backup.name.clone(),
                message: describe(&e),
            })?;
        deleted.push(backup.clone());

        wait_for_status(client, instance_id, ACTIVE, policy).await?;
    }

    Ok(deleted)
}
