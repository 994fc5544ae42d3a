use anyhow::{Context, Result};
use backuping::config::{self, Catalog};
use backuping::managers::backup::{BackupListing, BackupManager, RestoreTarget, RunSummary};
use backuping::managers::logging::{self, LogBuffer, LoggingConfig};
use backuping::managers::report::ReportManager;
use backuping::managers::selection::InteractiveSelector;
use backuping::utils::{CommandExecutor, RealExecutor};
use clap::{Args, Parser, Subcommand};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DEFAULT_CONFIG: &str = "/etc/backuping/config.toml";

#[derive(Parser)]
#[command(name = "backuping")]
#[command(about = "Declarative backups of directories and databases to multiple destinations", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "BACKUPING_CONFIG", default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Log debug output to the console
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Source and destination filters shared by every run command
#[derive(Args, Debug, Clone, Default)]
struct Filters {
    /// Source id to process (repeatable, defaults to all sources)
    #[arg(short = 's', long = "source")]
    sources: Vec<String>,

    /// Destination id to use (repeatable, defaults to all destinations)
    #[arg(short = 'd', long = "destination")]
    destinations: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Back up sources to destinations
    Backup {
        #[command(flatten)]
        filters: Filters,

        /// Mail the run log to the configured receivers
        #[arg(long)]
        report: bool,
    },

    /// Restore sources from a backup
    Restore {
        #[command(flatten)]
        filters: Filters,

        /// Mail the run log to the configured receivers
        #[arg(long)]
        report: bool,

        /// Exact backup file name, e.g. web-1700000000-directory.zip
        #[arg(long, conflicts_with = "latest")]
        backup_name: Option<String>,

        /// Use the newest backup without asking
        #[arg(long)]
        latest: bool,
    },

    /// Delete backups older than each destination's lifetime
    Cleanup {
        #[command(flatten)]
        filters: Filters,

        /// Mail the run log to the configured receivers
        #[arg(long)]
        report: bool,
    },

    /// List backups found on the destinations
    List {
        #[command(flatten)]
        filters: Filters,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration file
    Validate,
}

impl Commands {
    fn wants_report(&self) -> bool {
        match self {
            Commands::Backup { report, .. }
            | Commands::Restore { report, .. }
            | Commands::Cleanup { report, .. } => *report,
            Commands::List { .. } | Commands::Validate => false,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Validation never touches the log directory
    if let Commands::Validate = cli.command {
        logging::init_console_logging(cli.verbose);
        return handle_validate(&cli.config);
    }

    let config = config::load_config(&cli.config)
        .with_context(|| format!("Failed to load configuration from {:?}", cli.config))?;
    let catalog = Catalog::from_config(&config)?;

    let logging_config = LoggingConfig::from_config(
        &config.options.log_directory,
        &config.options.log_level,
        config.options.log_max_files,
        cli.verbose,
    );
    let report_buffer = cli.command.wants_report().then(LogBuffer::new);
    let log_guard = logging::init_logging(&logging_config, report_buffer.clone())?;

    let executor: Arc<dyn CommandExecutor> = Arc::new(RealExecutor::new());
    let mut manager = BackupManager::new(catalog).with_executor(Arc::clone(&executor));

    if let Some(buffer) = report_buffer {
        manager = manager.with_log_buffer(buffer);
    }
    if let Some(report) = config.report.clone() {
        manager = manager.with_report_manager(ReportManager::from_config(report, Arc::clone(&executor)));
    }
    if std::io::stdin().is_terminal() {
        manager = manager.with_selector(Box::new(InteractiveSelector));
    }

    let summary = match cli.command {
        Commands::Backup { filters, report } => {
            manager.backup(&filters.sources, &filters.destinations, report)?
        }

        Commands::Restore {
            filters,
            report,
            backup_name,
            latest,
        } => {
            let target = match (backup_name, latest) {
                (Some(name), _) => RestoreTarget::Named(name),
                (None, true) => RestoreTarget::Latest,
                (None, false) => RestoreTarget::Ask,
            };
            manager.restore(&filters.sources, &target, &filters.destinations, report)?
        }

        Commands::Cleanup { filters, report } => {
            manager.cleanup(&filters.sources, &filters.destinations, report)?
        }

        Commands::List { filters, json } => {
            let listings = manager.list(&filters.sources, &filters.destinations)?;
            print_listings(&listings, json)?;
            RunSummary::default()
        }

        Commands::Validate => return handle_validate(&cli.config),
    };

    if !summary.is_success() {
        eprintln!(
            "✗ {} source(s) failed, {} succeeded, {} skipped",
            summary.failed, summary.succeeded, summary.skipped
        );
        // Flush file logs before exiting
        drop(log_guard);
        std::process::exit(1);
    }

    Ok(())
}

fn handle_validate(path: &Path) -> Result<()> {
    let config = config::load_config(path)
        .with_context(|| format!("Failed to load configuration from {:?}", path))?;
    let catalog = Catalog::from_config(&config)?;

    println!("Configuration is valid!");
    println!("Sources: {}", catalog.sources().len());
    println!("Destinations: {}", catalog.destinations().len());
    println!(
        "Report: {}",
        if catalog.report().is_some() { "configured" } else { "none" }
    );
    Ok(())
}

fn print_listings(listings: &[BackupListing], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(listings)?);
        return Ok(());
    }

    if listings.is_empty() {
        println!("No backups found");
        return Ok(());
    }

    let mut current: Option<(&str, &str)> = None;
    for listing in listings {
        let key = (listing.source_id.as_str(), listing.destination_id.as_str());
        if current != Some(key) {
            println!("{} on {}:", key.0, key.1);
            current = Some(key);
        }

        let size = listing
            .size
            .map(|s| format!("{} bytes", s))
            .unwrap_or_else(|| "unknown size".to_string());
        println!("  {}  {}  ({})", listing.file_name, listing.captured_at, size);
    }

    Ok(())
}
