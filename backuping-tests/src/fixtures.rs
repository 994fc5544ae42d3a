//! Test fixtures and sample data
//!
//! Provides pre-built test data and templates for testing.

use backuping::utils::command::ToolInvocation;
use std::fs;
use std::path::{Path, PathBuf};

const DAY: i64 = 86_400;

/// Create a small tree with a nested file and a `.git` directory
///
/// ```text
/// root/
///   readme.txt
///   app/config.ini
///   app/cache/debug.log
///   .git/HEAD
/// ```
pub fn sample_tree(root: &Path) -> PathBuf {
    for (name, contents) in [
        ("readme.txt", "hello"),
        ("app/config.ini", "[app]\nname = demo\n"),
        ("app/cache/debug.log", "noise"),
        (".git/HEAD", "ref: refs/heads/main"),
    ] {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create fixture directory");
        }
        fs::write(&path, contents).expect("Failed to write fixture file");
    }
    root.to_path_buf()
}

/// Unix time `days` days before now
pub fn days_ago(days: i64) -> i64 {
    chrono::Utc::now().timestamp() - days * DAY
}

/// Place fake backup files for `source_id`, aged by the given days
pub fn seed_backups(dir: &Path, source_id: &str, ages_in_days: &[i64]) -> Vec<String> {
    fs::create_dir_all(dir).expect("Failed to create destination directory");
    ages_in_days
        .iter()
        .map(|age| {
            let name = format!("{}-{}.zip", source_id, days_ago(*age));
            fs::write(dir.join(&name), b"backup").expect("Failed to write backup file");
            name
        })
        .collect()
}

/// Directory names of a listing, sorted
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}

/// Mock side effect writing `contents` to the path of a `--flag=path` argument
pub fn write_flag_target(flag: &'static str, contents: &'static str) -> impl Fn(&ToolInvocation) + Send + Sync {
    move |invocation: &ToolInvocation| {
        let prefix = format!("{}=", flag);
        if let Some(path) = invocation.args.iter().find_map(|a| a.strip_prefix(prefix.as_str())) {
            fs::write(path, contents).expect("Failed to write tool output");
        }
    }
}

/// Directory source options table
pub fn directory_options(path: &Path) -> toml::Table {
    let mut table = toml::Table::new();
    table.insert(
        "directory".to_string(),
        toml::Value::String(path.display().to_string()),
    );
    table
}

/// Parse a TOML snippet into an options table
pub fn options(src: &str) -> toml::Table {
    toml::from_str(src).expect("Invalid options TOML")
}

/// Minimal valid config TOML template
///
/// Placeholders: `{tree}`, `{backups}`, `{tmp}`, `{logs}`
pub fn minimal_config_toml() -> &'static str {
    r#"
[options]
log_directory = "{logs}"
temp_directory = "{tmp}"
lock_directory = "{tmp}"

[[sources]]
id = "files"
driver = "directory"

[sources.options]
directory = "{tree}"

[[destinations]]
id = "local"
directory = "{backups}"
lifetime = 7
"#
}

/// Config with one source per driver and a mail report
pub fn multi_driver_config_toml() -> &'static str {
    r#"
[options]
cleanup_on_backup = true
minimum_keeping_source_backups = 2
transfer_source_backup_retries = 3
log_directory = "{logs}"
temp_directory = "{tmp}"

[[sources]]
id = "files"
driver = "directory"
options = { directory = "{tree}", exclude = [".git", "/\\.log$/"] }

[[sources]]
id = "shop"
driver = "mariadb"
minimum_keeping_backups = 5
options = { host = "db", username = "root", password = "pw", only = ["shop"] }

[[sources]]
id = "events"
driver = "mongo"
options = { uri = "mongodb://localhost", db = ["events"] }

[[sources]]
id = "pg"
driver = "postgres"
cleanup_on_backup = false
options = { host = "pg", username = "postgres", exclude = ["template0"] }

[[destinations]]
id = "local"
directory = "{backups}"
lifetime = 14

[[destinations]]
id = "archive"
directory = "local"
options = { path = "{backups}/archive" }

[report]
subject = "nightly"

[report.sender]
type = "mail"
from = { address = "backup@example.com", name = "Backup" }

[[report.receivers]]
name = "Ops"
mail = "ops@example.com"
"#
}

/// Fill the placeholders of a template
pub fn render(template: &str, root: &Path) -> String {
    template
        .replace("{tree}", &root.join("tree").display().to_string())
        .replace("{backups}", &root.join("backups").display().to_string())
        .replace("{tmp}", &root.join("tmp").display().to_string())
        .replace("{logs}", &root.join("logs").display().to_string())
}
