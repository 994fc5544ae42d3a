//! PostgreSQL driver built on `pg_dump`, `pg_dumpall`, `psql` and `pg_restore`

use super::connection::{validate_connection, ConnectionInfo};
use super::options::{get_int, get_selection, get_string_list, lookup};
use super::{
    capture_time, database_from_file_name, Artifact, BackupStrategy, DirectoryArtifact,
    DriverContext, StrategyError,
};
use crate::utils::command::{path_arg, ToolInvocation};
use std::path::{Path, PathBuf};
use tracing::info;

const DRIVER: &str = "postgresql";
const DEFAULT_PORT: u16 = 5432;
const CLUSTER_PREFIX: &str = "pg_dumpall";

/// `pg_dump --format` values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpFormat {
    Custom,
    Directory,
    Tar,
    Plain,
}

impl DumpFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "c" => Some(DumpFormat::Custom),
            "d" => Some(DumpFormat::Directory),
            "t" => Some(DumpFormat::Tar),
            "p" => Some(DumpFormat::Plain),
            _ => None,
        }
    }

    fn flag(&self) -> &'static str {
        match self {
            DumpFormat::Custom => "c",
            DumpFormat::Directory => "d",
            DumpFormat::Tar => "t",
            DumpFormat::Plain => "p",
        }
    }

    /// Output name for a database dump taken at `time`
    fn output_name(format: Option<Self>, database: &str, time: i64) -> String {
        match format {
            Some(DumpFormat::Custom) => format!("{}-{}.dump", database, time),
            Some(DumpFormat::Directory) => format!("{}-{}", database, time),
            Some(DumpFormat::Tar) => format!("{}-{}.tar", database, time),
            Some(DumpFormat::Plain) | None => format!("{}-{}.pgsql", database, time),
        }
    }
}

/// Validated dump settings
#[derive(Debug)]
struct DumpSettings {
    conn: ConnectionInfo,
    only: super::options::Selection,
    exclude: Vec<String>,
    format: Option<DumpFormat>,
    jobs: Option<i64>,
    compress: Option<i64>,
}

pub struct PostgreSqlStrategy;

impl PostgreSqlStrategy {
    fn jobs(options: &toml::Table) -> Result<Option<i64>, StrategyError> {
        match get_int(DRIVER, options, "jobs")? {
            Some(jobs) if jobs <= 0 => Err(StrategyError::validation(
                DRIVER,
                "the 'jobs' should be numeric and bigger than zero",
            )),
            jobs => Ok(jobs),
        }
    }

    fn settings(options: &toml::Table) -> Result<DumpSettings, StrategyError> {
        let conn = validate_connection(DRIVER, options, DEFAULT_PORT)?;
        let only = get_selection(DRIVER, options, "only")?;
        let exclude = get_string_list(DRIVER, options, &["exclude"])?;

        if !only.is_empty() && !exclude.is_empty() {
            return Err(StrategyError::validation(
                DRIVER,
                "you can only pass one of 'only' or 'exclude' at the same time",
            ));
        }

        let jobs = Self::jobs(options)?;

        let compress = get_int(DRIVER, options, "compress")?;
        if let Some(level) = compress {
            if !(0..=9).contains(&level) {
                return Err(StrategyError::validation(
                    DRIVER,
                    "the 'compress' should be numeric and in range 0-9",
                ));
            }
        }

        let format = match lookup(options, &["only_format", "only-format"]) {
            None => None,
            Some(value) => Some(value.as_str().and_then(DumpFormat::parse).ok_or_else(|| {
                StrategyError::validation(DRIVER, "the 'only_format' should be one of c, d, t or p")
            })?),
        };

        Ok(DumpSettings {
            conn,
            only,
            exclude,
            format,
            jobs,
            compress,
        })
    }

    fn invocation(program: &str, conn: &ConnectionInfo) -> ToolInvocation {
        let mut invocation = ToolInvocation::new(program).args([
            "--no-password".to_string(),
            format!("--host={}", conn.host),
            format!("--username={}", conn.username),
            format!("--port={}", conn.port),
        ]);
        if let Some(ref password) = conn.password {
            invocation = invocation.env("PGPASSWORD", password.as_str());
        }
        invocation
    }

    fn dump_databases(settings: &DumpSettings, ctx: &DriverContext, dir: &Path) -> Result<(), StrategyError> {
        let time = capture_time();

        for (database, tables) in &settings.only {
            info!("Dumping database: {}", database);

            let mut invocation = Self::invocation("pg_dump", &settings.conn);
            if let Some(jobs) = settings.jobs {
                invocation = invocation.arg(format!("--jobs={}", jobs));
            }
            if let Some(level) = settings.compress {
                invocation = invocation.arg(format!("--compress={}", level));
            }
            if let Some(format) = settings.format {
                invocation = invocation.arg(format!("--format={}", format.flag()));
            }

            let output = dir.join(DumpFormat::output_name(settings.format, database, time));
            let invocation = invocation
                .arg(format!("--dbname={}", database))
                .args(tables.iter().map(|t| format!("--table={}", t)))
                .arg(path_arg("--file", &output));
            ctx.run(&invocation)?;
        }

        Ok(())
    }

    fn dump_cluster(settings: &DumpSettings, ctx: &DriverContext, dir: &Path) -> Result<(), StrategyError> {
        info!("Dumping the whole cluster");

        let output = dir.join(format!("{}-{}.pgsql", CLUSTER_PREFIX, capture_time()));
        let invocation = Self::invocation("pg_dumpall", &settings.conn)
            .args(settings.exclude.iter().map(|db| format!("--exclude-database={}", db)))
            .arg(path_arg("--file", &output));
        ctx.run(&invocation)?;
        Ok(())
    }

    fn restore_item(
        item: &Path,
        conn: &ConnectionInfo,
        jobs: Option<i64>,
        ctx: &DriverContext,
    ) -> Result<(), StrategyError> {
        let name = item
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let database = if name.starts_with(CLUSTER_PREFIX) {
            "postgres"
        } else {
            database_from_file_name(&name).ok_or_else(|| {
                StrategyError::validation(
                    DRIVER,
                    format!("can not find the database name in '{}'", name),
                )
            })?
        };

        info!("Restoring {} into {}", name, database);

        let invocation = if name.ends_with(".pgsql") {
            Self::invocation("psql", conn)
                .arg("--set=ON_ERROR_STOP=1")
                .arg(format!("--dbname={}", database))
                .arg(path_arg("--file", item))
        } else {
            let mut invocation = Self::invocation("pg_restore", conn);
            if let Some(jobs) = jobs {
                invocation = invocation.arg(format!("--jobs={}", jobs));
            }
            invocation
                .args(["--clean", "--if-exists"])
                .arg(format!("--dbname={}", database))
                .arg(item.display().to_string())
        };

        ctx.run(&invocation)?;
        Ok(())
    }
}

impl BackupStrategy for PostgreSqlStrategy {
    fn backup(&self, options: &toml::Table, ctx: &DriverContext) -> Result<Artifact, StrategyError> {
        let settings = Self::settings(options)?;
        let scratch = ctx.scratch_dir("postgresql-")?;

        if settings.only.is_empty() {
            Self::dump_cluster(&settings, ctx, scratch.path())?;
        } else {
            Self::dump_databases(&settings, ctx, scratch.path())?;
        }

        Ok(Artifact::Directory(DirectoryArtifact::scratch(scratch)))
    }

    fn restore(
        &self,
        artifact: &Artifact,
        options: &toml::Table,
        ctx: &DriverContext,
    ) -> Result<(), StrategyError> {
        let conn = validate_connection(DRIVER, options, DEFAULT_PORT)?;
        let jobs = Self::jobs(options)?;

        let items: Vec<PathBuf> = match artifact {
            Artifact::Directory(dir) => dir.top_level()?,
            Artifact::File(file) => vec![file.path().to_path_buf()],
        };

        for item in items {
            Self::restore_item(&item, &conn, jobs, ctx)?;
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        DRIVER
    }
}
