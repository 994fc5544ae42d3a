//! Tests for transfer retries during 'backup'

use std::sync::Arc;
use tempfile::TempDir;
use test_utils::{
    directory_options, file_names, sample_tree, BackupManager, Catalog, Destination, DriverKind,
    FlakyNode, GlobalOptions, LocalDirectory, MockExecutor, Source,
};

struct Setup {
    temp: TempDir,
    manager: BackupManager,
    attempts: Arc<parking_lot::Mutex<u32>>,
}

fn setup(node: impl FnOnce(&std::path::Path) -> FlakyNode, retries: u32) -> Setup {
    let temp = TempDir::new().unwrap();
    let tree = sample_tree(&temp.path().join("tree"));
    let flaky = node(&temp.path().join("flaky"));
    let attempts = flaky.attempts();

    let catalog = Catalog::new(
        vec![Source::new("files", DriverKind::Directory, directory_options(&tree))],
        vec![
            Destination::new("flaky", Box::new(flaky), None),
            Destination::new(
                "steady",
                Box::new(LocalDirectory::new(temp.path().join("steady"))),
                None,
            ),
        ],
        GlobalOptions {
            transfer_retries: retries,
            temp_directory: temp.path().join("tmp"),
            lock_directory: temp.path().join("locks"),
            ..Default::default()
        },
    )
    .unwrap();

    let manager = BackupManager::new(catalog).with_executor(Arc::new(MockExecutor::new()));
    Setup {
        temp,
        manager,
        attempts,
    }
}

#[test]
fn test_transient_failures_are_retried() {
    let s = setup(|root| FlakyNode::new(root, 2), 2);

    let summary = s.manager.backup(&[], &[], false).unwrap();

    assert!(summary.is_success());
    assert_eq!(*s.attempts.lock(), 3);
    assert_eq!(file_names(&s.temp.path().join("flaky")).len(), 1);
}

#[test]
fn test_exhausted_retries_fail_the_source() {
    let s = setup(|root| FlakyNode::new(root, 5), 1);

    let summary = s.manager.backup(&[], &[], false).unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(*s.attempts.lock(), 2);
    assert!(file_names(&s.temp.path().join("flaky")).is_empty());
    // The other destination still receives the backup
    assert_eq!(file_names(&s.temp.path().join("steady")).len(), 1);
}

#[test]
fn test_refused_upload_counts_as_failure() {
    let s = setup(|root| FlakyNode::new(root, 1).refusing(), 0);

    let summary = s.manager.backup(&[], &[], false).unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(*s.attempts.lock(), 1);
}

#[test]
fn test_no_retries_needed() {
    let s = setup(|root| FlakyNode::new(root, 0), 3);

    let summary = s.manager.backup(&[], &[], false).unwrap();

    assert!(summary.is_success());
    assert_eq!(*s.attempts.lock(), 1);
}
