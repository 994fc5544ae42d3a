//! Tests for report delivery around runs

use backuping::managers::logging::{report_layer, LogBuffer};
use backuping::managers::report::ReportManager;
use test_utils::{
    sample_tree, seed_backups, BackupManager, ConfigBuilder, MockExecutor, RecordingMailer,
    RestoreTarget, TestContext,
};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;

fn report_context(cleanup_on_backup: bool) -> TestContext {
    let builder = ConfigBuilder::new();
    let tree = sample_tree(&builder.temp_dir().join("tree"));
    let dest = builder.temp_dir().join("backups");
    TestContext::from_builder(
        builder
            .add_local_destination("local", &dest, Some(7))
            .add_directory_source("files", &tree, &[])
            .with_cleanup_on_backup(cleanup_on_backup)
            .with_mail_report(&["ops@example.com", "dev@example.com"]),
    )
}

fn reporting_manager(ctx: &TestContext, mailer: &RecordingMailer) -> BackupManager {
    let report = ctx.config().unwrap().report.clone().unwrap();
    ctx.manager(MockExecutor::new())
        .with_report_manager(ReportManager::new(report, Box::new(mailer.clone())))
}

#[test]
fn test_one_report_per_backup_run() {
    let ctx = report_context(true);
    seed_backups(&ctx.destination_dir("local"), "files", &[30]);
    let mailer = RecordingMailer::new();

    reporting_manager(&ctx, &mailer).backup(&[], &[], true).unwrap();

    // Cleanup triggered by the backup does not report on its own
    assert_eq!(mailer.count(), 1);
    let report = &mailer.sent()[0];
    assert_eq!(report.subject, "test report - backup");
    assert_eq!(report.from.address, "backup@example.com");
    let receivers: Vec<_> = report.receivers.iter().map(|r| r.address.as_str()).collect();
    assert_eq!(receivers, vec!["ops@example.com", "dev@example.com"]);
}

#[test]
fn test_no_report_unless_requested() {
    let ctx = report_context(false);
    let mailer = RecordingMailer::new();
    let manager = reporting_manager(&ctx, &mailer);

    manager.backup(&[], &[], false).unwrap();
    manager.cleanup(&[], &[], false).unwrap();

    assert_eq!(mailer.count(), 0);
}

#[test]
fn test_report_kind_follows_command() {
    let ctx = report_context(false);
    let mailer = RecordingMailer::new();
    let manager = reporting_manager(&ctx, &mailer);

    manager.backup(&[], &[], false).unwrap();
    manager.restore(&[], &RestoreTarget::Latest, &[], true).unwrap();
    manager.cleanup(&[], &[], true).unwrap();

    let subjects: Vec<_> = mailer.sent().into_iter().map(|r| r.subject).collect();
    assert_eq!(subjects, vec!["test report - restore", "test report - cleanup"]);
}

#[test]
fn test_failed_run_still_reports() {
    let ctx = TestContext::from_builder(
        ConfigBuilder::minimal()
            .add_directory_source("broken", "/nonexistent/tree", &[])
            .with_mail_report(&["ops@example.com"]),
    );
    let mailer = RecordingMailer::new();

    let summary = reporting_manager(&ctx, &mailer).backup(&[], &[], true).unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(mailer.count(), 1);
}

#[test]
fn test_report_body_is_the_run_log() {
    let ctx = report_context(false);
    let mailer = RecordingMailer::new();
    let buffer = LogBuffer::new();
    let manager = reporting_manager(&ctx, &mailer).with_log_buffer(buffer.clone());

    let subscriber = tracing_subscriber::registry().with(report_layer(buffer.clone(), Level::INFO));
    tracing::subscriber::with_default(subscriber, || {
        tracing::info!("left over from an earlier run");
        manager.backup(&[], &[], true).unwrap();
    });

    let body = &mailer.sent()[0].message;
    assert!(body.contains("Starting backup for source: files"));
    assert!(!body.contains("left over from an earlier run"));
    // Sending drains the buffer
    assert!(!buffer.contents().contains("Starting backup"));
}

#[test]
fn test_requested_report_without_configuration_is_harmless() {
    let builder = ConfigBuilder::minimal();
    let tree = sample_tree(&builder.temp_dir().join("tree"));
    let ctx = TestContext::from_builder(builder.add_directory_source("files", &tree, &[]));

    let summary = ctx.manager(MockExecutor::new()).backup(&[], &[], true).unwrap();
    assert!(summary.is_success());
}
