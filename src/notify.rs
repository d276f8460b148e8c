use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{anyhow, Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::process::Command as AsyncCommand;

use crate::app::RunSummary;
use crate::error::Failure;

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn success(to: &str, instance_id: &str, summary: &RunSummary) -> Self {
        let mut body = format!("Backup of instance '{instance_id}' completed.\n\n");
        match &summary.created {
            Some(backup) => body.push_str(&format!("Created: {}\n", backup.name)),
            None => body.push_str(&format!("Dry run, would create: {}\n", summary.backup_name)),
        }

        body.push_str(&format!("\nBackups in set ({}):\n", summary.matches.len()));
        for backup in &summary.matches {
            body.push_str(&format!("  {}  {}\n", backup.name, backup.created_display()));
        }

        let verb = if summary.dry_run { "Would delete" } else { "Deleted" };
        if summary.deleted.is_empty() {
            body.push_str(&format!("\n{verb}: none\n"));
        } else {
            body.push_str(&format!("\n{verb} ({}):\n", summary.deleted.len()));
            for backup in &summary.deleted {
                body.push_str(&format!("  {}  {}\n", backup.name, backup.created_display()));
            }
        }

        Self {
            to: to.to_string(),
            subject: format!("cdb-snap-crab: backup of {instance_id} succeeded"),
            body,
        }
    }

    pub fn failure(to: &str, instance_id: &str, failure: &Failure) -> Self {
        Self {
            to: to.to_string(),
            subject: format!(
                "cdb-snap-crab: backup of {instance_id} failed (exit {})",
                failure.exit_code()
            ),
            body: format!(
                "Backup of instance '{instance_id}' stopped with exit code {}.\n\n{failure}\n\n\
                 The backup set may hold more backups than the retention count until the next \
                 successful run.\n",
                failure.exit_code()
            ),
        }
    }

    /// RFC 822 text as `sendmail -t` expects it.
    pub fn to_message(&self) -> String {
        format!(
            "To: {}\nSubject: {}\nContent-Type: text/plain; charset=utf-8\n\n{}",
            self.to, self.subject, self.body
        )
    }
}

pub struct Mailer {
    sendmail: PathBuf,
}

impl Mailer {
    pub fn new(sendmail: &Path) -> Self {
        Self {
            sendmail: sendmail.to_path_buf(),
        }
    }

    pub async fn send(&self, notification: &Notification) -> Result<()> {
        let mut child = AsyncCommand::new(&self.sendmail)
            .arg("-t")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("starting {}", self.sendmail.display()))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("sendmail stdin unavailable"))?;
        stdin.write_all(notification.to_message().as_bytes()).await?;
        drop(stdin);

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(anyhow!(
                "{} exited with {}: {}",
                self.sendmail.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(())
    }
}
