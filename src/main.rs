//! tskdb CLI - load image analysis output into an object hierarchy store

use clap::{Parser, Subcommand};
use indicatif::HumanDuration;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use tskdb::config::{self, TskdbConfig};
use tskdb::loader::Loader;
use tskdb::storage::Session;
use tskdb::ui::{self, Icons};

#[derive(Parser)]
#[command(name = "tskdb")]
#[command(version)]
#[command(about = "Persist disk image analysis results into a SQLite object hierarchy")]
#[command(long_about = r#"
tskdb records images, volume systems, volumes, filesystems and files as one
containment tree, resolving each file's parent directory by its native
metadata address as it goes.

Example usage:
  tskdb init --database case.db --block-map
  walker disk.raw | tskdb load --input - --database case.db
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a tskdb.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a fresh store
    Init {
        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Create the block layout table
        #[arg(short, long)]
        block_map: bool,

        /// Also write the effective settings to tskdb.toml
        #[arg(long)]
        save_config: bool,
    },

    /// Load an entity stream (JSON lines, `-` for stdin)
    Load {
        /// Entity stream to read
        #[arg(short, long)]
        input: PathBuf,

        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Record byte runs (new stores only)
        #[arg(short, long)]
        block_map: bool,

        /// Roll back failing entities and keep going
        #[arg(long)]
        continue_on_error: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();

    let config = config::load_config(cli.config.as_deref())?.unwrap_or_default();

    match cli.command {
        Commands::Init { database, block_map, save_config } => {
            let mut config = config;
            if block_map {
                config.block_map = Some(true);
            }
            let database = resolve_database(database, &config);
            run_init(&database, &config)?;
            if save_config {
                config.database = Some(database.display().to_string());
                config::write_config(&config::default_config_path(), &config, false)?;
                ui::success("Wrote tskdb.toml");
            }
        }
        Commands::Load { input, database, block_map, continue_on_error } => {
            let mut config = config;
            if block_map {
                config.block_map = Some(true);
            }
            if continue_on_error {
                config.continue_on_error = Some(true);
            }
            let database = resolve_database(database, &config);
            run_load(&input, &database, &config)?;
        }
    }

    Ok(())
}

fn resolve_database(flag: Option<PathBuf>, config: &TskdbConfig) -> PathBuf {
    flag.or_else(|| config.database.as_ref().map(PathBuf::from))
        .unwrap_or_else(config::default_database_path)
}

fn run_init(database: &Path, config: &TskdbConfig) -> anyhow::Result<()> {
    if database.exists() {
        anyhow::bail!("{} already exists; init only creates new stores", database.display());
    }
    config::ensure_db_dir(database)?;

    let mut session = Session::open_file(database, config.session_options())?;
    session.initialize_schema()?;
    session.close()?;

    ui::success(&format!("Created {}", database.display()));
    ui::info(Icons::DATABASE, "Block map", if config.session_options().block_map { "on" } else { "off" });
    Ok(())
}

fn run_load(input: &Path, database: &Path, config: &TskdbConfig) -> anyhow::Result<()> {
    let start = Instant::now();
    config::ensure_db_dir(database)?;
    let fresh = !database.exists();

    ui::header("Loading entity stream");
    ui::info(Icons::DISK, "Input", &input.display().to_string());
    ui::info(Icons::DATABASE, "Database", &database.display().to_string());

    let reader: Box<dyn BufRead> = if input == Path::new("-") {
        Box::new(BufReader::new(io::stdin()))
    } else {
        Box::new(BufReader::new(File::open(input)?))
    };

    let mut session = Session::open_file(database, config.session_options())?;
    if fresh {
        session.initialize_schema()?;
    }

    let spinner = ui::LoadSpinner::new("Loading");
    let result = Loader::new(&mut session, config.load_options()).load(reader, |report| spinner.update(report));
    spinner.finish();

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            ui::error(&e.to_string());
            ui::warn("Entities before the failure were kept");
            session.close()?;
            return Err(e.into());
        }
    };

    let stats = session.stats()?;
    session.close()?;

    ui::section("Summary");
    println!("{}", ui::report_table(&report, &stats));
    if report.skipped > 0 {
        ui::summary_row("Unnamed records skipped:", &report.skipped.to_string());
    }
    if !report.failures.is_empty() {
        ui::warn(&format!("{} entities rolled back", report.failures.len()));
        println!("{}", ui::failures_table(&report.failures));
    }
    ui::timing(&format!("Complete in {}", HumanDuration(start.elapsed())));
    Ok(())
}
