use std::time::Duration;

use anyhow::anyhow;
use cdb_snap_crab::app::{App, RunConfig};
use cdb_snap_crab::cloud::MockCloudDatabasesTrait;
use cdb_snap_crab::error::Failure;
use cdb_snap_crab::retention::WaitPolicy;
use cdb_snap_crab::types::{Backup, Instance};
use chrono::{DateTime, Local, TimeZone, Utc};
use mockall::Sequence;

const INSTANCE_ID: &str = "d6bd4f86-4d0b-4c3a-9a1e-2f3c1f4a0b11";

fn instance(status: &str) -> Instance {
    Instance {
        id: INSTANCE_ID.to_string(),
        name: "prod-db".to_string(),
        status: status.to_string(),
    }
}

fn nightly(day: u32) -> Backup {
    Backup {
        id: format!("backup-{day}"),
        name: format!("nightly-23010{day}0000"),
        created: Some(Utc.with_ymd_and_hms(2023, 1, day, 0, 0, 30).unwrap()),
        status: "COMPLETED".to_string(),
    }
}

fn run_time() -> DateTime<Local> {
    Local.with_ymd_and_hms(2023, 1, 4, 0, 0, 0).unwrap()
}

fn config(retention: usize) -> RunConfig {
    RunConfig {
        instance_id: INSTANCE_ID.to_string(),
        backup_prefix: "nightly".to_string(),
        retention,
        description: None,
        strict_names: false,
        dry_run: false,
        wait: WaitPolicy {
            interval: Duration::ZERO,
            attempts: 3,
        },
    }
}

/// Instance lookup, creation of day 4 and a listing holding days 1-4 plus
/// an unrelated set.
fn mock_through_listing() -> MockCloudDatabasesTrait {
    let mut mock = MockCloudDatabasesTrait::new();
    mock.expect_find_instance()
        .withf(|id| id == INSTANCE_ID)
        .times(1)
        .returning(|_| Ok(Some(instance("ACTIVE"))));
    mock.expect_create_backup()
        .withf(|id, name, description| {
            id == INSTANCE_ID
                && name == "nightly-2301040000"
                && description == "Created on 2023-Jan-04-00:00"
        })
        .times(1)
        .returning(|_, _, _| Ok(nightly(4)));
    mock.expect_list_backups().times(1).returning(|_| {
        let mut weekly = nightly(2);
        weekly.name = "weekly-2301020000".to_string();
        Ok(vec![nightly(1), weekly, nightly(3), nightly(2), nightly(4)])
    });
    mock
}

#[tokio::test]
async fn test_rotation_deletes_oldest_beyond_retention() {
    let mut mock = mock_through_listing();
    mock.expect_delete_backup()
        .withf(|b| b.name == "nightly-2301010000")
        .times(1)
        .returning(|_| Ok(()));
    mock.expect_instance_status()
        .times(1)
        .returning(|_| Ok("ACTIVE".to_string()));

    let app = App::new(Box::new(mock), config(3));
    let summary = app.run(run_time()).await.unwrap();

    let names: Vec<&str> = summary.matches.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(
        names,
        [
            "nightly-2301040000",
            "nightly-2301030000",
            "nightly-2301020000",
            "nightly-2301010000"
        ]
    );
    assert_eq!(summary.created, Some(nightly(4)));
    assert_eq!(summary.deleted, vec![nightly(1)]);
}

#[tokio::test]
async fn test_rotation_deletes_in_list_order_waiting_after_each() {
    let mut seq = Sequence::new();
    let mut mock = mock_through_listing();
    mock.expect_delete_backup()
        .withf(|b| b.name == "nightly-2301020000")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    mock.expect_instance_status()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok("ACTIVE".to_string()));
    mock.expect_delete_backup()
        .withf(|b| b.name == "nightly-2301010000")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    mock.expect_instance_status()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok("ACTIVE".to_string()));

    let app = App::new(Box::new(mock), config(2));
    let summary = app.run(run_time()).await.unwrap();

    assert_eq!(summary.deleted, vec![nightly(2), nightly(1)]);
}

#[tokio::test]
async fn test_zero_retention_keeps_everything() {
    let mut mock = MockCloudDatabasesTrait::new();
    mock.expect_find_instance()
        .returning(|_| Ok(Some(instance("ACTIVE"))));
    mock.expect_create_backup()
        .returning(|_, _, _| Ok(nightly(5)));
    mock.expect_list_backups()
        .returning(|_| Ok((1..=5).map(nightly).collect()));
    mock.expect_delete_backup().times(0);
    mock.expect_instance_status().times(0);

    let app = App::new(Box::new(mock), config(0));
    let summary = app.run(run_time()).await.unwrap();

    assert_eq!(summary.matches.len(), 5);
    assert!(summary.deleted.is_empty());
}

#[tokio::test]
async fn test_set_within_retention_deletes_nothing() {
    let mut mock = mock_through_listing();
    mock.expect_delete_backup().times(0);

    let app = App::new(Box::new(mock), config(7));
    let summary = app.run(run_time()).await.unwrap();

    assert_eq!(summary.matches.len(), 4);
    assert!(summary.deleted.is_empty());
}

#[tokio::test]
async fn test_deletion_failure_stops_rotation() {
    let mut mock = mock_through_listing();
    mock.expect_delete_backup()
        .withf(|b| b.name == "nightly-2301030000")
        .times(1)
        .returning(|_| Err(anyhow!("500 Internal Server Error")));
    mock.expect_instance_status().times(0);

    let app = App::new(Box::new(mock), config(1));
    let failure = app.run(run_time()).await.unwrap_err();

    assert_eq!(failure.exit_code(), 6);
    match failure {
        Failure::BackupDeletion { name, message } => {
            assert_eq!(name, "nightly-2301030000");
            assert!(message.contains("500"));
        }
        other => panic!("unexpected failure: {other:?}"),
    }
}

#[tokio::test]
async fn test_instance_stuck_after_delete_is_a_timeout() {
    let mut mock = mock_through_listing();
    mock.expect_delete_backup()
        .times(1)
        .returning(|_| Ok(()));
    mock.expect_instance_status()
        .times(3)
        .returning(|_| Ok("BACKUP".to_string()));

    let app = App::new(Box::new(mock), config(2));
    let failure = app.run(run_time()).await.unwrap_err();

    assert_eq!(failure.exit_code(), 7);
    assert!(failure.to_string().contains("still BACKUP after 3 attempts"));
}

#[tokio::test]
async fn test_status_poll_error_aborts() {
    let mut mock = mock_through_listing();
    mock.expect_delete_backup().times(1).returning(|_| Ok(()));
    mock.expect_instance_status()
        .times(1)
        .returning(|_| Err(anyhow!("connection reset")));

    let app = App::new(Box::new(mock), config(3));
    let failure = app.run(run_time()).await.unwrap_err();

    assert!(matches!(failure, Failure::StatusTimeout { .. }));
}

#[tokio::test]
async fn test_instance_not_found() {
    let mut mock = MockCloudDatabasesTrait::new();
    mock.expect_find_instance().times(1).returning(|_| Ok(None));
    mock.expect_create_backup().times(0);

    let app = App::new(Box::new(mock), config(7));
    let failure = app.run(run_time()).await.unwrap_err();

    assert_eq!(failure.exit_code(), 4);
    assert_eq!(
        failure.to_string(),
        format!("no instances found matching '{INSTANCE_ID}'")
    );
}

#[tokio::test]
async fn test_create_failure_skips_rotation() {
    let mut mock = MockCloudDatabasesTrait::new();
    mock.expect_find_instance()
        .returning(|_| Ok(Some(instance("BUILD"))));
    mock.expect_create_backup()
        .times(1)
        .returning(|_, _, _| Err(anyhow!("422: instance is not ACTIVE")));
    mock.expect_list_backups().times(0);
    mock.expect_delete_backup().times(0);

    let app = App::new(Box::new(mock), config(1));
    let failure = app.run(run_time()).await.unwrap_err();

    assert_eq!(failure.exit_code(), 5);
}

#[tokio::test]
async fn test_listing_failure() {
    let mut mock = MockCloudDatabasesTrait::new();
    mock.expect_find_instance()
        .returning(|_| Ok(Some(instance("ACTIVE"))));
    mock.expect_create_backup()
        .returning(|_, _, _| Ok(nightly(4)));
    mock.expect_list_backups()
        .returning(|_| Err(anyhow!("503 Service Unavailable")));

    let app = App::new(Box::new(mock), config(1));
    let failure = app.run(run_time()).await.unwrap_err();

    assert_eq!(failure.exit_code(), 8);
}

#[tokio::test]
async fn test_custom_description_is_passed_through() {
    let mut mock = MockCloudDatabasesTrait::new();
    mock.expect_find_instance()
        .returning(|_| Ok(Some(instance("ACTIVE"))));
    mock.expect_create_backup()
        .withf(|_, _, description| description == "before schema migration")
        .times(1)
        .returning(|_, _, _| Ok(nightly(4)));
    mock.expect_list_backups().returning(|_| Ok(vec![nightly(4)]));

    let mut cfg = config(7);
    cfg.description = Some("before schema migration".to_string());
    let app = App::new(Box::new(mock), cfg);

    assert!(app.run(run_time()).await.is_ok());
}

#[tokio::test]
async fn test_dry_run_changes_nothing() {
    let mut mock = MockCloudDatabasesTrait::new();
    mock.expect_find_instance()
        .returning(|_| Ok(Some(instance("ACTIVE"))));
    mock.expect_create_backup().times(0);
    mock.expect_list_backups()
        .returning(|_| Ok(vec![nightly(1), nightly(2), nightly(3)]));
    mock.expect_delete_backup().times(0);
    mock.expect_instance_status().times(0);

    let mut cfg = config(2);
    cfg.dry_run = true;
    let app = App::new(Box::new(mock), cfg);
    let summary = app.run(run_time()).await.unwrap();

    assert!(summary.dry_run);
    assert_eq!(summary.created, None);
    assert_eq!(summary.backup_name, "nightly-2301040000");
    assert_eq!(summary.matches.len(), 4);
    assert_eq!(summary.deleted, vec![nightly(2), nightly(1)]);
}
