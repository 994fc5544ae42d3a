//! Unit tests for the backup drivers, driven through the public driver API

use backuping::strategies::{for_driver, Artifact, DriverContext, StrategyError};
use rstest::rstest;
use std::fs;
use test_utils::{directory_options, options, sample_tree, DriverKind, MockExecutor, MockResponse, TestContext};

#[rstest]
#[case(DriverKind::MySql)]
#[case(DriverKind::MongoDb)]
#[case(DriverKind::PostgreSql)]
fn test_database_drivers_require_host(#[case] driver: DriverKind) {
    let ctx = TestContext::new();
    let executor = MockExecutor::new();
    let driver_ctx = DriverContext::new(&executor, ctx.temp_dir());

    let result = for_driver(driver).backup(&options("username = \"root\""), &driver_ctx);

    assert!(matches!(result, Err(StrategyError::Validation { .. })));
    assert!(executor.get_calls().is_empty());
}

#[rstest]
#[case(DriverKind::MySql, "port = 0")]
#[case(DriverKind::MySql, "port = 70000")]
#[case(DriverKind::PostgreSql, "port = \"abc\"")]
fn test_invalid_ports(#[case] driver: DriverKind, #[case] port: &str) {
    let ctx = TestContext::new();
    let executor = MockExecutor::new();
    let driver_ctx = DriverContext::new(&executor, ctx.temp_dir());

    let opts = options(&format!("host = \"db\"\nusername = \"root\"\n{}", port));
    assert!(for_driver(driver).backup(&opts, &driver_ctx).is_err());
}

#[test]
fn test_directory_view_applies_excludes() {
    let ctx = TestContext::new();
    let root = sample_tree(&ctx.create_subdir("tree"));
    let executor = MockExecutor::new();
    let driver_ctx = DriverContext::new(&executor, ctx.temp_dir());

    let mut opts = directory_options(&root);
    opts.insert(
        "exclude".into(),
        toml::Value::Array(vec![".git".into(), r"/\.log$/".into()]),
    );

    let artifact = for_driver(DriverKind::Directory).backup(&opts, &driver_ctx).unwrap();
    let Artifact::Directory(dir) = artifact else {
        panic!("directory driver must produce a directory artifact");
    };

    let names: Vec<_> = dir.entries().unwrap().into_iter().map(|e| e.relative).collect();
    assert_eq!(names, vec!["app", "app/cache", "app/config.ini", "readme.txt"]);
    // The live tree is never touched
    assert!(root.join(".git/HEAD").exists());
}

#[test]
fn test_mysql_separate_mode_excludes() {
    let ctx = TestContext::new();
    let executor = MockExecutor::new()
        .expect("mysql", MockResponse::stdout("app\nlogs\nshop\n"))
        .without_program("gzip");
    let driver_ctx = DriverContext::new(&executor, ctx.temp_dir());

    let opts = options(
        "host = \"db\"\nusername = \"root\"\nexclude = [\"logs\", { shop = [\"sessions\"] }]",
    );
    let artifact = for_driver(DriverKind::MySql).backup(&opts, &driver_ctx).unwrap();
    assert!(artifact.is_directory());

    let dumps = executor.calls_to("mysqldump");
    assert_eq!(dumps.len(), 2);
    assert_eq!(dumps[0].args.last().map(String::as_str), Some("app"));
    assert!(dumps[1].has_arg("--ignore-table=shop.sessions"));
    assert_eq!(dumps[1].args.last().map(String::as_str), Some("shop"));
    assert!(!executor.was_called("gzip"));
}

#[test]
fn test_mysql_tool_failure_is_reported() {
    let ctx = TestContext::new();
    let executor = MockExecutor::new()
        .expect("mysqldump", MockResponse::failure("Access denied for user 'root'"));
    let driver_ctx = DriverContext::new(&executor, ctx.temp_dir());

    let result = for_driver(DriverKind::MySql).backup(
        &options("host = \"db\"\nusername = \"root\"\nonly = [\"app\"]"),
        &driver_ctx,
    );

    match result {
        Err(StrategyError::Tool(e)) => assert!(e.to_string().contains("Access denied")),
        other => panic!("expected a tool error, got {:?}", other.map(|a| a.is_directory())),
    }
}

#[test]
fn test_postgres_password_stays_off_the_command_line() {
    let ctx = TestContext::new();
    let executor = MockExecutor::new();
    let driver_ctx = DriverContext::new(&executor, ctx.temp_dir());

    for_driver(DriverKind::PostgreSql)
        .backup(
            &options("host = \"pg\"\nusername = \"postgres\"\npassword = \"s3cret\""),
            &driver_ctx,
        )
        .unwrap();

    let calls = executor.calls_to("pg_dumpall");
    assert_eq!(calls.len(), 1);
    assert!(calls[0].args.iter().all(|a| !a.contains("s3cret")));
    assert!(calls[0].envs.contains(&("PGPASSWORD".to_string(), "s3cret".to_string())));
}

#[test]
fn test_mongodb_collections_need_a_database() {
    let ctx = TestContext::new();
    let executor = MockExecutor::new();
    let driver_ctx = DriverContext::new(&executor, ctx.temp_dir());

    let result = for_driver(DriverKind::MongoDb).backup(
        &options("host = \"mongo\"\nusername = \"admin\"\nexcludeCollectionsWithPrefix = [\"tmp_\"]"),
        &driver_ctx,
    );
    assert!(matches!(result, Err(StrategyError::Validation { .. })));
}

#[test]
fn test_scratch_is_removed_with_the_artifact() {
    let ctx = TestContext::new();
    let scratch_root = ctx.create_subdir("scratch");
    let executor = MockExecutor::new();
    let driver_ctx = DriverContext::new(&executor, &scratch_root);

    let artifact = for_driver(DriverKind::MongoDb)
        .backup(&options("uri = \"mongodb://localhost\""), &driver_ctx)
        .unwrap();
    assert!(artifact.path().starts_with(&scratch_root));

    drop(artifact);
    assert_eq!(fs::read_dir(&scratch_root).unwrap().count(), 0);
}
