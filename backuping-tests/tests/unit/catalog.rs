//! Unit tests for the resolved catalog

use backuping::config::{Catalog, ConfigError, GlobalOptions, Source};
use rstest::rstest;
use test_utils::{directory_options, ConfigBuilder, Destination, DriverKind, LocalDirectory, TestContext};

fn catalog() -> Catalog {
    let ctx = TestContext::from_builder(
        ConfigBuilder::minimal()
            .add_directory_source("a", "/srv/a", &[])
            .add_directory_source("b", "/srv/b", &[])
            .add_directory_source("c", "/srv/c", &[])
            .with_minimum_keeping(3)
            .with_cleanup_on_backup(true),
    );
    ctx.catalog()
}

#[rstest]
#[case(&[], &["a", "b", "c"])]
#[case(&["c", "a"], &["a", "c"])]
#[case(&["b"], &["b"])]
fn test_select_sources_keeps_config_order(#[case] filter: &[&str], #[case] expected: &[&str]) {
    let catalog = catalog();
    let filter: Vec<String> = filter.iter().map(|s| s.to_string()).collect();
    let ids: Vec<_> = catalog
        .select_sources(&filter)
        .unwrap()
        .iter()
        .map(|s| s.id.clone())
        .collect();
    assert_eq!(ids, expected);
}

#[test]
fn test_unknown_filters() {
    let catalog = catalog();
    assert!(matches!(
        catalog.select_sources(&["zzz".to_string()]),
        Err(ConfigError::SourceNotFound(id)) if id == "zzz"
    ));
    assert!(matches!(
        catalog.select_destinations(&["nowhere".to_string()]),
        Err(ConfigError::DestinationNotFound(_))
    ));
}

#[test]
fn test_effective_values_fall_back_to_global() {
    let catalog = catalog();
    let options = catalog.options();
    let source = &catalog.sources()[0];

    assert_eq!(source.effective_minimum_keeping(options), 3);
    assert!(source.effective_cleanup_on_backup(options));

    let mut overridden = source.clone();
    overridden.minimum_keeping_backups = Some(1);
    overridden.cleanup_on_backup = Some(false);
    assert_eq!(overridden.effective_minimum_keeping(options), 1);
    assert!(!overridden.effective_cleanup_on_backup(options));
}

#[test]
fn test_new_rejects_duplicate_sources() {
    let ctx = TestContext::new();
    let result = Catalog::new(
        vec![
            Source::new("x", DriverKind::Directory, directory_options(ctx.temp_dir())),
            Source::new("x", DriverKind::Directory, directory_options(ctx.temp_dir())),
        ],
        vec![Destination::new(
            "local",
            Box::new(LocalDirectory::new(ctx.temp_dir())),
            None,
        )],
        GlobalOptions::default(),
    );
    assert!(matches!(result, Err(ConfigError::ValidationError(_))));
}
