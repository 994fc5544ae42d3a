//! MongoDB driver built on `mongodump` and `mongorestore`

use super::connection::validate_connection;
use super::options::{get_bool, get_selection, get_str, get_string_list};
use super::{Artifact, BackupStrategy, DirectoryArtifact, DriverContext, StrategyError};
use crate::utils::command::{path_arg, ToolInvocation};
use regex::Regex;
use tracing::info;

const DRIVER: &str = "mongodb";
const DEFAULT_PORT: u16 = 27017;

/// `mongodb://[username:password@]host1[:port1][,...hostN[:portN]][/[defaultauthdb][?options]]`
const URI_PATTERN: &str = r#"^mongodb://(?:(?:[^:]+):(?:[^@]+)?@)?(?:(?:(?:[^/]+)|(?:/.+.sock?),?)+)(?:/([^/\. "*<>:|?]*))?(?:\?(?:(.+=.+)&?)+)*$"#;

fn is_valid_uri(uri: &str) -> bool {
    Regex::new(URI_PATTERN)
        .map(|re| re.is_match(uri))
        .unwrap_or(false)
}

pub struct MongoDbStrategy;

impl MongoDbStrategy {
    /// `--uri=` or the discrete host/port/username/password flags
    fn connection_args(options: &toml::Table) -> Result<Vec<String>, StrategyError> {
        if let Some(uri) = get_str(DRIVER, options, "uri")?.filter(|u| !u.is_empty()) {
            if !is_valid_uri(uri) {
                return Err(StrategyError::validation(
                    DRIVER,
                    format!(
                        "the 'uri' should be in mongodb://[username:password@]host1[:port1][,...hostN[:portN]][/[defaultauthdb][?options]] format, got {}",
                        uri
                    ),
                ));
            }
            return Ok(vec![format!("--uri={}", uri)]);
        }

        let conn = validate_connection(DRIVER, options, DEFAULT_PORT)?;
        let mut args = vec![
            format!("--host={}", conn.host),
            format!("--port={}", conn.port),
            format!("--username={}", conn.username),
        ];
        if let Some(password) = conn.password {
            args.push(format!("--password={}", password));
        }
        Ok(args)
    }

    fn gzip(options: &toml::Table) -> Result<bool, StrategyError> {
        Ok(get_bool(DRIVER, options, &["gzip"])?.unwrap_or(false))
    }
}

impl BackupStrategy for MongoDbStrategy {
    fn backup(&self, options: &toml::Table, ctx: &DriverContext) -> Result<Artifact, StrategyError> {
        let connection = Self::connection_args(options)?;
        let databases = get_selection(DRIVER, options, "db")?;
        let exclude_collections =
            get_string_list(DRIVER, options, &["exclude_collection", "excludeCollection"])?;
        let exclude_prefixes = get_string_list(
            DRIVER,
            options,
            &["exclude_collections_with_prefix", "excludeCollectionsWithPrefix"],
        )?;

        if (!exclude_collections.is_empty() || !exclude_prefixes.is_empty()) && databases.is_empty() {
            return Err(StrategyError::validation(
                DRIVER,
                "'db' is required when 'exclude_collection' or 'exclude_collections_with_prefix' is specified",
            ));
        }

        let gzip = Self::gzip(options)?;
        let scratch = ctx.scratch_dir("mongodb-")?;
        let out = path_arg("--out", scratch.path());

        let base = || {
            ToolInvocation::new("mongodump").args(connection.iter().cloned())
        };
        let finish = |invocation: ToolInvocation| {
            let invocation = if gzip { invocation.arg("--gzip") } else { invocation };
            invocation.arg(out.clone())
        };

        let mut invocations = Vec::new();
        if databases.is_empty() {
            info!("Dumping all databases");
            invocations.push(finish(base()));
        }

        for (database, collections) in &databases {
            if collections.is_empty() {
                info!("Dumping database: {}", database);
                let invocation = base()
                    .arg(format!("--db={}", database))
                    .args(exclude_collections.iter().map(|c| format!("--excludeCollection={}", c)))
                    .args(
                        exclude_prefixes
                            .iter()
                            .map(|p| format!("--excludeCollectionsWithPrefix={}", p)),
                    );
                invocations.push(finish(invocation));
                continue;
            }

            for collection in collections {
                info!("Dumping collection: {}.{}", database, collection);
                let invocation = base()
                    .arg(format!("--db={}", database))
                    .arg(format!("--collection={}", collection));
                invocations.push(finish(invocation));
            }
        }

        for invocation in &invocations {
            ctx.run(invocation)?;
        }

        Ok(Artifact::Directory(DirectoryArtifact::scratch(scratch)))
    }

    fn restore(
        &self,
        artifact: &Artifact,
        options: &toml::Table,
        ctx: &DriverContext,
    ) -> Result<(), StrategyError> {
        let connection = Self::connection_args(options)?;

        let Artifact::Directory(dir) = artifact else {
            return Err(StrategyError::validation(
                DRIVER,
                "mongorestore needs a directory backup",
            ));
        };

        let mut invocation = ToolInvocation::new("mongorestore").args(connection);
        if Self::gzip(options)? {
            invocation = invocation.arg("--gzip");
        }
        invocation = invocation.arg(path_arg("--dir", dir.root()));

        info!("Restoring MongoDB dump from {:?}", dir.root());
        ctx.run(&invocation)?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        DRIVER
    }
}
