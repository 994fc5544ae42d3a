//! Tests for the 'cleanup' command

use rstest::rstest;
use std::fs;
use test_utils::{
    days_ago, file_names, seed_backups, BackupName, ConfigBuilder, DriverKind, MockExecutor,
    RunSummary, SourceConfig, TestContext,
};

fn cleanup_context(lifetime: Option<u32>, minimum_keeping: u32) -> TestContext {
    let builder = ConfigBuilder::new().with_minimum_keeping(minimum_keeping);
    let dest = builder.temp_dir().join("backups");
    TestContext::from_builder(
        builder
            .add_local_destination("local", &dest, lifetime)
            .add_directory_source("files", "/srv/files", &[]),
    )
}

#[rstest]
#[case::lifetime_only(0, vec![1])]
#[case::minimum_wins(3, vec![1, 10, 20])]
#[case::minimum_keeps_newest(2, vec![1, 10])]
fn test_cleanup_respects_lifetime_and_minimum(#[case] minimum_keeping: u32, #[case] kept_ages: Vec<i64>) {
    let ctx = cleanup_context(Some(7), minimum_keeping);
    let dest = ctx.destination_dir("local");
    let seeded = seed_backups(&dest, "files", &[1, 10, 20]);

    let summary = ctx.manager(MockExecutor::new()).cleanup(&[], &[], false).unwrap();
    assert_eq!(summary, RunSummary { succeeded: 1, failed: 0, skipped: 0 });

    let remaining = file_names(&dest);
    let ages = [1, 10, 20];
    let mut expected: Vec<String> = ages
        .iter()
        .zip(&seeded)
        .filter(|(age, _)| kept_ages.contains(age))
        .map(|(_, name)| name.clone())
        .collect();
    expected.sort();
    assert_eq!(remaining, expected);
}

#[test]
fn test_destination_without_lifetime_keeps_everything() {
    let ctx = cleanup_context(None, 0);
    let dest = ctx.destination_dir("local");
    seed_backups(&dest, "files", &[100, 200, 300]);

    let summary = ctx.manager(MockExecutor::new()).cleanup(&[], &[], false).unwrap();
    assert!(summary.is_success());
    assert_eq!(file_names(&dest).len(), 3);
}

#[test]
fn test_cleanup_leaves_other_files_alone() {
    let ctx = cleanup_context(Some(1), 0);
    let dest = ctx.destination_dir("local");
    seed_backups(&dest, "files", &[30]);
    let foreign = seed_backups(&dest, "files-extra", &[30]);
    fs::write(dest.join("README"), "keep me").unwrap();

    ctx.manager(MockExecutor::new()).cleanup(&[], &[], false).unwrap();

    let mut expected = vec!["README".to_string(), foreign[0].clone()];
    expected.sort();
    assert_eq!(file_names(&dest), expected);
}

#[test]
fn test_directory_backups_expire_too() {
    let ctx = cleanup_context(Some(7), 0);
    let dest = ctx.destination_dir("local");
    fs::create_dir_all(&dest).unwrap();
    let old = BackupName::new("files", days_ago(30), true).file_name();
    let fresh = BackupName::new("files", days_ago(2), true).file_name();
    fs::write(dest.join(&old), "zip").unwrap();
    fs::write(dest.join(&fresh), "zip").unwrap();

    ctx.manager(MockExecutor::new()).cleanup(&[], &[], false).unwrap();

    assert_eq!(file_names(&dest), vec![fresh]);
}

#[test]
fn test_source_minimum_overrides_global() {
    let builder = ConfigBuilder::new().with_minimum_keeping(0);
    let dest = builder.temp_dir().join("backups");
    let mut keep_two = SourceConfig {
        id: "db".to_string(),
        driver: DriverKind::Directory,
        minimum_keeping_backups: Some(2),
        cleanup_on_backup: None,
        options: toml::Table::new(),
    };
    keep_two
        .options
        .insert("directory".into(), toml::Value::String("/srv/db".into()));

    let ctx = TestContext::from_builder(
        builder
            .add_local_destination("local", &dest, Some(1))
            .add_directory_source("files", "/srv/files", &[])
            .add_source_config(keep_two),
    );
    seed_backups(&dest, "files", &[10, 20, 30]);
    seed_backups(&dest, "db", &[10, 20, 30]);

    ctx.manager(MockExecutor::new()).cleanup(&[], &[], false).unwrap();

    let remaining = file_names(&dest);
    assert_eq!(remaining.iter().filter(|n| n.starts_with("files-")).count(), 0);
    assert_eq!(remaining.iter().filter(|n| n.starts_with("db-")).count(), 2);
}

#[test]
fn test_source_filter_limits_cleanup() {
    let builder = ConfigBuilder::new();
    let dest = builder.temp_dir().join("backups");
    let ctx = TestContext::from_builder(
        builder
            .add_local_destination("local", &dest, Some(1))
            .add_directory_source("files", "/srv/files", &[])
            .add_directory_source("logs", "/srv/logs", &[]),
    );
    seed_backups(&dest, "files", &[10]);
    let logs = seed_backups(&dest, "logs", &[10]);

    let summary = ctx
        .manager(MockExecutor::new())
        .cleanup(&["files".to_string()], &[], false)
        .unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(file_names(&dest), logs);
}

#[test]
fn test_missing_destination_directory_is_not_an_error() {
    let ctx = cleanup_context(Some(1), 0);

    let summary = ctx.manager(MockExecutor::new()).cleanup(&[], &[], false).unwrap();
    assert!(summary.is_success());
}
