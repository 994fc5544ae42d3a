//! Tests for the 'validate' command
//!
//! Validation loads the file and resolves it into a catalog.

use backuping::config::{load_config, ConfigError};
use test_utils::{
    multi_driver_config_toml, render, Catalog, ConfigBuilder, DriverKind, TestContext,
};

#[test]
fn test_validate_builder_config() {
    let builder = ConfigBuilder::minimal()
        .add_directory_source("web", "/srv/web", &[".cache"])
        .with_mail_report(&["ops@example.com"]);
    let path = builder.write_toml();

    let config = load_config(&path).unwrap();
    let catalog = Catalog::from_config(&config).unwrap();

    assert_eq!(catalog.sources().len(), 1);
    assert_eq!(catalog.destinations().len(), 1);
    assert!(catalog.report().is_some());
}

#[test]
fn test_validate_every_driver() {
    let ctx = TestContext::new();
    let path = ctx.create_file("config.toml", &render(multi_driver_config_toml(), ctx.temp_dir()));

    let config = load_config(&path).unwrap();
    let drivers: Vec<_> = config.sources.iter().map(|s| s.driver).collect();
    assert_eq!(
        drivers,
        vec![
            DriverKind::Directory,
            DriverKind::MySql,
            DriverKind::MongoDb,
            DriverKind::PostgreSql
        ]
    );

    let catalog = Catalog::from_config(&config).unwrap();
    let destinations: Vec<_> = catalog.destinations().iter().map(|d| d.id.as_str()).collect();
    assert_eq!(destinations, vec!["local", "archive"]);
}

#[test]
fn test_validate_rejects_duplicate_source() {
    let builder = ConfigBuilder::minimal()
        .add_directory_source("web", "/srv/a", &[])
        .add_directory_source("web", "/srv/b", &[]);
    let path = builder.write_toml();

    match load_config(&path) {
        Err(ConfigError::ValidationError(msg)) => assert!(msg.contains("web")),
        other => panic!("expected a validation error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_validate_missing_file() {
    let ctx = TestContext::new();
    let result = load_config(ctx.temp_dir().join("missing.toml"));
    assert!(matches!(result, Err(ConfigError::ReadError(_))));
}

#[test]
fn test_validate_wrong_value_type() {
    let ctx = TestContext::new();
    let path = ctx.create_file(
        "config.toml",
        "[options]\ntransfer_source_backup_retries = \"lots\"\n",
    );

    assert!(matches!(load_config(&path), Err(ConfigError::ParseError(_))));
}
