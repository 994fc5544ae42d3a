//! Tests for the 'restore' command

use backuping::managers::selection::{BackupSelector, Candidate};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use test_utils::{
    days_ago, file_names, options, sample_tree, BackupName, ConfigBuilder, DriverKind,
    MockExecutor, RestoreTarget, RunSummary, TestContext, TestResult,
};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// Write a directory backup holding `files` (relative path, contents)
fn write_directory_backup(dest: &Path, source_id: &str, timestamp: i64, files: &[(&str, &str)]) -> String {
    fs::create_dir_all(dest).unwrap();
    let name = BackupName::new(source_id, timestamp, true).file_name();
    let mut zip = ZipWriter::new(File::create(dest.join(&name)).unwrap());
    for (path, contents) in files {
        zip.start_file(*path, SimpleFileOptions::default()).unwrap();
        zip.write_all(contents.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
    name
}

/// A `files` directory source restoring into `<temp>/restored`, with destinations `local` and `mirror`
fn restore_context() -> (TestContext, PathBuf) {
    let builder = ConfigBuilder::minimal();
    let target = builder.temp_dir().join("restored");
    let mirror = builder.temp_dir().join("mirror");
    let ctx = TestContext::from_builder(
        builder
            .add_local_destination("mirror", &mirror, None)
            .add_directory_source("files", &target, &[]),
    );
    (ctx, target)
}

struct PickIndex(usize);

impl BackupSelector for PickIndex {
    fn select(&self, _source_id: &str, candidates: &[Candidate]) -> Option<usize> {
        (self.0 < candidates.len()).then_some(self.0)
    }
}

/// Relative paths under `root` with file contents (`None` for directories)
fn snapshot(root: &Path) -> BTreeMap<String, Option<Vec<u8>>> {
    WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .map(|entry| {
            let entry = entry.unwrap();
            let relative = entry
                .path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/");
            let contents = entry.file_type().is_file().then(|| fs::read(entry.path()).unwrap());
            (relative, contents)
        })
        .collect()
}

#[test]
fn test_backup_then_restore_round_trip() -> TestResult {
    let builder = ConfigBuilder::minimal();
    let tree = sample_tree(&builder.temp_dir().join("tree"));
    fs::write(tree.join("app/data.bin"), [0u8, 159, 146, 150, 255])?;
    let ctx = TestContext::from_builder(builder.add_directory_source("files", &tree, &[".git", "/\\.log$/"]));
    let manager = ctx.manager(MockExecutor::new());

    let mut expected = snapshot(&tree);
    expected.retain(|path, _| !path.contains(".git") && !path.ends_with(".log"));
    assert!(expected.contains_key("app/data.bin"));

    manager.backup(&[], &[], false)?;

    let unit = ctx.destination_dir("local").join(&file_names(&ctx.destination_dir("local"))[0]);
    let zip = ZipArchive::new(File::open(&unit)?)?;
    for name in zip.file_names() {
        assert!(!name.contains(".git"), "excluded entry {} was packaged", name);
        assert!(!name.ends_with(".log"), "excluded entry {} was packaged", name);
    }

    fs::remove_dir_all(&tree)?;
    let summary = manager.restore(&[], &RestoreTarget::Latest, &[], false)?;
    assert_eq!(summary, RunSummary { succeeded: 1, failed: 0, skipped: 0 });

    assert_eq!(snapshot(&tree), expected);
    Ok(())
}

#[test]
fn test_latest_picks_newest_backup() {
    let (ctx, target) = restore_context();
    write_directory_backup(&ctx.destination_dir("local"), "files", days_ago(3), &[("v.txt", "old")]);
    write_directory_backup(&ctx.destination_dir("mirror"), "files", days_ago(1), &[("v.txt", "new")]);

    let summary = ctx
        .manager(MockExecutor::new())
        .restore(&[], &RestoreTarget::Latest, &[], false)
        .unwrap();

    assert!(summary.is_success());
    assert_eq!(fs::read_to_string(target.join("v.txt")).unwrap(), "new");
}

#[test]
fn test_latest_tie_prefers_first_destination() {
    let (ctx, target) = restore_context();
    let timestamp = days_ago(1);
    write_directory_backup(&ctx.destination_dir("local"), "files", timestamp, &[("v.txt", "local")]);
    write_directory_backup(&ctx.destination_dir("mirror"), "files", timestamp, &[("v.txt", "mirror")]);

    ctx.manager(MockExecutor::new())
        .restore(&[], &RestoreTarget::Latest, &[], false)
        .unwrap();

    assert_eq!(fs::read_to_string(target.join("v.txt")).unwrap(), "local");
}

#[test]
fn test_named_backup() {
    let (ctx, target) = restore_context();
    let dest = ctx.destination_dir("local");
    let older = write_directory_backup(&dest, "files", days_ago(5), &[("v.txt", "older")]);
    write_directory_backup(&dest, "files", days_ago(1), &[("v.txt", "newer")]);

    let summary = ctx
        .manager(MockExecutor::new())
        .restore(&[], &RestoreTarget::Named(older), &[], false)
        .unwrap();

    assert!(summary.is_success());
    assert_eq!(fs::read_to_string(target.join("v.txt")).unwrap(), "older");
}

#[test]
fn test_named_backup_missing_fails_source() {
    let (ctx, _target) = restore_context();
    write_directory_backup(&ctx.destination_dir("local"), "files", days_ago(1), &[("v.txt", "x")]);

    let summary = ctx
        .manager(MockExecutor::new())
        .restore(&[], &RestoreTarget::Named("files-1.zip".to_string()), &[], false)
        .unwrap();

    assert_eq!(summary.failed, 1);
}

#[test]
fn test_destination_filter_limits_candidates() {
    let (ctx, target) = restore_context();
    write_directory_backup(&ctx.destination_dir("local"), "files", days_ago(3), &[("v.txt", "local")]);
    write_directory_backup(&ctx.destination_dir("mirror"), "files", days_ago(1), &[("v.txt", "mirror")]);

    ctx.manager(MockExecutor::new())
        .restore(&[], &RestoreTarget::Latest, &["local".to_string()], false)
        .unwrap();

    assert_eq!(fs::read_to_string(target.join("v.txt")).unwrap(), "local");
}

#[test]
fn test_ambiguous_choice_is_skipped_without_prompt() {
    let (ctx, target) = restore_context();
    let dest = ctx.destination_dir("local");
    write_directory_backup(&dest, "files", days_ago(2), &[("v.txt", "a")]);
    write_directory_backup(&dest, "files", days_ago(1), &[("v.txt", "b")]);

    let summary = ctx
        .manager(MockExecutor::new())
        .restore(&[], &RestoreTarget::Ask, &[], false)
        .unwrap();

    assert_eq!(summary, RunSummary { succeeded: 0, failed: 0, skipped: 1 });
    assert!(!target.join("v.txt").exists());
}

#[test]
fn test_selector_sees_newest_first() {
    let (ctx, target) = restore_context();
    let dest = ctx.destination_dir("local");
    write_directory_backup(&dest, "files", days_ago(9), &[("v.txt", "oldest")]);
    write_directory_backup(&dest, "files", days_ago(1), &[("v.txt", "newest")]);
    write_directory_backup(&dest, "files", days_ago(4), &[("v.txt", "middle")]);

    let summary = ctx
        .manager(MockExecutor::new())
        .with_selector(Box::new(PickIndex(1)))
        .restore(&[], &RestoreTarget::Ask, &[], false)
        .unwrap();

    assert!(summary.is_success());
    assert_eq!(fs::read_to_string(target.join("v.txt")).unwrap(), "middle");
}

#[test]
fn test_single_candidate_needs_no_choice() {
    let (ctx, target) = restore_context();
    write_directory_backup(&ctx.destination_dir("mirror"), "files", days_ago(1), &[("only.txt", "1")]);

    let summary = ctx
        .manager(MockExecutor::new())
        .restore(&[], &RestoreTarget::Ask, &[], false)
        .unwrap();

    assert_eq!(summary.succeeded, 1);
    assert!(target.join("only.txt").exists());
}

#[test]
fn test_no_backups_fails_source() {
    let (ctx, _target) = restore_context();

    let summary = ctx
        .manager(MockExecutor::new())
        .restore(&[], &RestoreTarget::Latest, &[], false)
        .unwrap();

    assert_eq!(summary, RunSummary { succeeded: 0, failed: 1, skipped: 0 });
}

#[test]
fn test_single_file_mysql_backup_imports_into_server() {
    let ctx = TestContext::from_builder(ConfigBuilder::minimal().add_source(
        "shop",
        DriverKind::MySql,
        options("host = \"db\"\nusername = \"root\"\npassword = \"pw\""),
    ));
    let dest = ctx.destination_dir("local");
    fs::create_dir_all(&dest).unwrap();
    let name = BackupName::new("shop", days_ago(1), false).file_name();
    fs::write(dest.join(&name), "CREATE TABLE t (id INT);").unwrap();

    let executor = MockExecutor::new();
    let summary = ctx
        .manager(executor.clone())
        .restore(&[], &RestoreTarget::Latest, &[], false)
        .unwrap();

    assert!(summary.is_success());
    let imports = executor.calls_to("mysql");
    assert_eq!(imports.len(), 1);
    assert!(imports[0].stdin.is_some());
    assert!(imports[0].has_arg("--host=db"));
    // No database argument for a whole-server dump
    assert!(!imports[0].args.iter().any(|a| !a.starts_with("--")));
    assert!(!executor.was_called("gzip"));
}

#[test]
fn test_other_sources_files_are_ignored() {
    let (ctx, _target) = restore_context();
    let dest = ctx.destination_dir("local");
    write_directory_backup(&dest, "files-old", days_ago(1), &[("v.txt", "x")]);
    fs::write(dest.join("notes.txt"), "not a backup").unwrap();

    let summary = ctx
        .manager(MockExecutor::new())
        .restore(&[], &RestoreTarget::Latest, &[], false)
        .unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(file_names(&dest).len(), 2);
}
