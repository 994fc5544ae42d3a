//! Unit tests for zip packaging

use backuping::utils::archive::{create_archive, extract_archive, TreeEntry};
use std::fs::{self, File};
use test_utils::{sample_tree, TestContext};
use zip::{CompressionMethod, ZipArchive};

fn entries_of(root: &std::path::Path, names: &[(&str, bool)]) -> Vec<TreeEntry> {
    names
        .iter()
        .map(|(relative, is_dir)| TreeEntry {
            path: root.join(relative),
            relative: relative.to_string(),
            is_dir: *is_dir,
        })
        .collect()
}

#[test]
fn test_empty_tree_gives_valid_archive() {
    let ctx = TestContext::new();
    let dest = ctx.temp_dir().join("empty.zip");

    assert_eq!(create_archive(&[], &dest).unwrap(), 0);

    let zip = ZipArchive::new(File::open(&dest).unwrap()).unwrap();
    assert_eq!(zip.len(), 0);
}

#[test]
fn test_compressed_members_are_stored() {
    let ctx = TestContext::new();
    let root = ctx.create_subdir("tree");
    fs::write(root.join("dump.sql.gz"), vec![0x1f, 0x8b, 0, 0]).unwrap();
    fs::write(root.join("notes.txt"), "notes notes notes notes").unwrap();

    let dest = ctx.temp_dir().join("unit.zip");
    create_archive(
        &entries_of(&root, &[("dump.sql.gz", false), ("notes.txt", false)]),
        &dest,
    )
    .unwrap();

    let mut zip = ZipArchive::new(File::open(&dest).unwrap()).unwrap();
    assert_eq!(zip.by_name("dump.sql.gz").unwrap().compression(), CompressionMethod::Stored);
    assert_eq!(zip.by_name("notes.txt").unwrap().compression(), CompressionMethod::Deflated);
}

#[test]
fn test_tree_survives_packaging() {
    let ctx = TestContext::new();
    let root = sample_tree(&ctx.create_subdir("tree"));

    let entries = entries_of(
        &root,
        &[
            ("app", true),
            ("app/cache", true),
            ("app/cache/debug.log", false),
            ("app/config.ini", false),
            ("readme.txt", false),
        ],
    );
    let dest = ctx.temp_dir().join("unit.zip");
    assert_eq!(create_archive(&entries, &dest).unwrap(), 3);

    let out = ctx.temp_dir().join("out");
    assert_eq!(extract_archive(&dest, &out).unwrap(), 3);
    assert_eq!(
        fs::read_to_string(out.join("app/config.ini")).unwrap(),
        "[app]\nname = demo\n"
    );
    assert!(out.join("app/cache").is_dir());
    assert!(!out.join(".git").exists());
}
