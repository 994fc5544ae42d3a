//! MySQL / MariaDB driver built on `mysqldump` and `mysql`

use super::connection::{validate_connection, ConnectionInfo};
use super::options::{get_bool, get_selection, Selection};
use super::{
    capture_time, database_from_file_name, Artifact, BackupStrategy, DirectoryArtifact,
    DriverContext, FileArtifact, StrategyError,
};
use crate::utils::command::{path_arg, ToolInvocation};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const DRIVER: &str = "mysql";
const DEFAULT_PORT: u16 = 3306;
const COMBINED_PREFIX: &str = "all-databases";

pub struct MySqlStrategy;

/// One `mysqldump` run: the database and the arguments that filter its tables
#[derive(Debug, Clone, PartialEq, Eq)]
struct DumpPlan {
    database: String,
    /// `--ignore-table=` flags, placed before the database name
    ignore_flags: Vec<String>,
    /// Table names, placed after the database name
    tables: Vec<String>,
}

fn connection_args(conn: &ConnectionInfo) -> Vec<String> {
    let mut args = vec![
        format!("--host={}", conn.host),
        format!("--port={}", conn.port),
        format!("--user={}", conn.username),
    ];
    if let Some(ref password) = conn.password {
        args.push(format!("--password={}", password));
    }
    args
}

fn ignore_table_flags(database: &str, tables: &[String]) -> Vec<String> {
    tables
        .iter()
        .map(|table| format!("--ignore-table={}.{}", database, table))
        .collect()
}

fn is_gzip_file(path: &Path) -> std::io::Result<bool> {
    let mut magic = [0u8; 2];
    let mut file = File::open(path)?;
    let read = file.read(&mut magic)?;
    Ok(read == 2 && magic == [0x1f, 0x8b])
}

impl MySqlStrategy {
    fn use_gzip(options: &toml::Table, ctx: &DriverContext) -> Result<bool, StrategyError> {
        if !get_bool(DRIVER, options, &["gzip"])?.unwrap_or(true) {
            return Ok(false);
        }
        if ctx.executor.command_exists("gzip") {
            return Ok(true);
        }
        warn!("gzip is not available, dumps will be kept uncompressed");
        Ok(false)
    }

    fn list_databases(ctx: &DriverContext, conn: &ConnectionInfo) -> Result<Vec<String>, StrategyError> {
        let invocation = ToolInvocation::new("mysql")
            .args(connection_args(conn))
            .args(["--batch", "--skip-column-names", "--execute=SHOW DATABASES"]);
        let stdout = ctx.executor.run_stdout(&invocation)?;

        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Databases to dump one by one
    fn plan_separate(
        ctx: &DriverContext,
        conn: &ConnectionInfo,
        only: Selection,
        exclude: &Selection,
    ) -> Result<Vec<DumpPlan>, StrategyError> {
        if !only.is_empty() {
            if !exclude.is_empty() {
                info!("'only' is set, ignoring 'exclude'");
            }
            return Ok(only
                .into_iter()
                .map(|(database, tables)| DumpPlan {
                    database,
                    ignore_flags: Vec::new(),
                    tables,
                })
                .collect());
        }

        info!("Listing databases...");
        let databases = Self::list_databases(ctx, conn)?;
        debug!("Found {} databases", databases.len());

        let mut plans = Vec::new();
        for database in databases {
            let ignore_flags = match exclude.get(&database) {
                Some(tables) if tables.is_empty() => {
                    debug!("Excluding database: {}", database);
                    continue;
                }
                Some(tables) => ignore_table_flags(&database, tables),
                None => Vec::new(),
            };
            plans.push(DumpPlan {
                database,
                ignore_flags,
                tables: Vec::new(),
            });
        }
        Ok(plans)
    }

    fn dump(
        ctx: &DriverContext,
        conn: &ConnectionInfo,
        file: &Path,
        target_args: Vec<String>,
        gzip: bool,
    ) -> Result<PathBuf, StrategyError> {
        let invocation = ToolInvocation::new("mysqldump")
            .args(connection_args(conn))
            .arg(path_arg("--result-file", file))
            .args(target_args);
        ctx.run(&invocation)?;

        if !gzip {
            return Ok(file.to_path_buf());
        }

        ctx.run(
            &ToolInvocation::new("gzip")
                .arg("--force")
                .arg(file.display().to_string()),
        )?;
        let mut compressed = file.as_os_str().to_owned();
        compressed.push(".gz");
        Ok(PathBuf::from(compressed))
    }

    /// Decompress `.gz` dumps in place, returning the `.sql` files to import
    fn prepare_sql_files(ctx: &DriverContext, files: Vec<PathBuf>) -> Result<Vec<PathBuf>, StrategyError> {
        let mut sql_files = Vec::new();

        for file in files {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            if let Some(stripped) = name.strip_suffix(".gz") {
                if !ctx.executor.command_exists("gzip") {
                    return Err(StrategyError::validation(
                        DRIVER,
                        format!("gzip is required to restore {}", name),
                    ));
                }
                ctx.run(
                    &ToolInvocation::new("gzip")
                        .args(["--decompress", "--force"])
                        .arg(file.display().to_string()),
                )?;
                if stripped.ends_with(".sql") {
                    sql_files.push(file.with_file_name(stripped));
                }
            } else if name.ends_with(".sql") {
                sql_files.push(file);
            } else {
                debug!("Skipping non-dump file: {}", name);
            }
        }

        sql_files.sort();
        Ok(sql_files)
    }
}

impl BackupStrategy for MySqlStrategy {
    fn backup(&self, options: &toml::Table, ctx: &DriverContext) -> Result<Artifact, StrategyError> {
        let conn = validate_connection(DRIVER, options, DEFAULT_PORT)?;
        let only = get_selection(DRIVER, options, "only")?;
        let exclude = get_selection(DRIVER, options, "exclude")?;
        let separate = get_bool(DRIVER, options, &["separate", "seprate"])?.unwrap_or(true);
        let gzip = Self::use_gzip(options, ctx)?;

        let time = capture_time();
        let scratch = ctx.scratch_dir("mysql-")?;

        if !only.is_empty() || separate {
            let plans = Self::plan_separate(ctx, &conn, only, &exclude)?;
            if plans.is_empty() {
                warn!("No databases left to dump");
            }

            for plan in plans {
                info!("Dumping database: {}", plan.database);
                let file = scratch.path().join(format!("{}-{}.sql", plan.database, time));
                let mut args = plan.ignore_flags;
                args.push(plan.database);
                args.extend(plan.tables);
                Self::dump(ctx, &conn, &file, args, gzip)?;
            }

            return Ok(Artifact::Directory(DirectoryArtifact::scratch(scratch)));
        }

        info!("Dumping all databases into one file");
        let mut args = vec!["--all-databases".to_string()];
        for (database, tables) in &exclude {
            if tables.is_empty() {
                args.push(format!("--ignore-database={}", database));
            } else {
                args.extend(ignore_table_flags(database, tables));
            }
        }

        let file = scratch
            .path()
            .join(format!("{}-{}.sql", COMBINED_PREFIX, time));
        let path = Self::dump(ctx, &conn, &file, args, gzip)?;
        Ok(Artifact::File(FileArtifact::in_scratch(path, scratch)))
    }

    fn restore(
        &self,
        artifact: &Artifact,
        options: &toml::Table,
        ctx: &DriverContext,
    ) -> Result<(), StrategyError> {
        let conn = validate_connection(DRIVER, options, DEFAULT_PORT)?;

        // A single-file backup arrives under its transport name; give it a dump name
        let mut _scratch = None;
        let files = match artifact {
            Artifact::Directory(dir) => dir
                .top_level()?
                .into_iter()
                .filter(|path| path.is_file())
                .collect(),
            Artifact::File(file) => {
                let scratch = ctx.scratch_dir("mysql-restore-")?;
                let name = if is_gzip_file(file.path())? {
                    format!("{}.sql.gz", COMBINED_PREFIX)
                } else {
                    format!("{}.sql", COMBINED_PREFIX)
                };
                let copy = scratch.path().join(name);
                fs::copy(file.path(), &copy)?;
                _scratch = Some(scratch);
                vec![copy]
            }
        };

        for file in Self::prepare_sql_files(ctx, files)? {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let database = if name.starts_with(COMBINED_PREFIX) {
                None
            } else {
                database_from_file_name(&name)
            };

            info!(
                "Importing {} into {}",
                name,
                database.unwrap_or("the server")
            );

            let mut invocation = ToolInvocation::new("mysql").args(connection_args(&conn));
            if let Some(database) = database {
                invocation = invocation.arg(database);
            }
            ctx.run(&invocation.stdin_file(&file))?;
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        DRIVER
    }
}
