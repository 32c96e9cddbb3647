//! ucnhistory CLI
//!
//! Command-line interface for the UCN history database:
//! - List tables and columns
//! - Fetch a table over a time window to CSV
//! - Search variables by name and export the joined result
//! - Generate a default config file

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use ucnhistory::config::{generate_default_config, Config, LoggingConfig};
use ucnhistory::connection::provider_from_config;
use ucnhistory::export::{self, ExportHeader};
use ucnhistory::query::{RecordSet, SearchQuery, TimeBound};
use ucnhistory::History;

#[derive(Parser)]
#[command(name = "ucnhistory")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Fetch tables from the UCN history SQL database to csv files")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search standard locations)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format for listings
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(flatten)]
    Store(StoreCommand),

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Commands that talk to the history database
#[derive(Subcommand)]
pub enum StoreCommand {
    /// List all tables in the database
    Tables,

    /// List the columns of a table
    Columns {
        /// Table name
        table: String,
    },

    /// Fetch a table to csv
    Fetch {
        /// Table name
        table: String,
        /// Columns to fetch (default: all)
        #[arg(short, long = "column")]
        columns: Vec<String>,
        /// Start time, e.g. "yesterday", "March 4 12pm", "now-2d" (default: 24h before end)
        #[arg(short, long)]
        start: Option<String>,
        /// End time (default: now)
        #[arg(short, long)]
        end: Option<String>,
        /// Output csv file, "-" for stdout (default: <yymmdd>_<table>.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Search variables by name and fetch them to csv
    Search {
        /// Variable names; several names are joined on time
        #[arg(required = true)]
        names: Vec<String>,
        /// Start time (default: 24h before end)
        #[arg(short, long)]
        start: Option<String>,
        /// End time (default: now)
        #[arg(short, long)]
        end: Option<String>,
        /// Output csv file, "-" for stdout (default: <yymmdd>_<table>.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Keep database column names instead of the searched names
        #[arg(long)]
        keep_column_names: bool,
    },

    /// Show which table and column a variable name resolves to
    Locate {
        /// Variable name
        name: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Config { output } => write_default_config(output.as_deref()),
        Commands::Store(command) => {
            let config =
                Config::load_default(cli.config.as_deref()).context("Failed to load config")?;
            init_logging(&config.logging);
            tracing::debug!("ucnhistory v{}", env!("CARGO_PKG_VERSION"));
            run(command, &config, cli.format)
        }
    }
}

fn run(command: StoreCommand, config: &Config, format: OutputFormat) -> Result<()> {
    let provider = provider_from_config(config).context("Failed to set up database connection")?;
    tracing::debug!("Database: {}", provider.describe());
    let mut history = History::new(config, provider)?;

    match command {
        StoreCommand::Tables => {
            let tables = history.tables().context("Failed to list tables")?;
            print_list(&tables, format)?;
        }

        StoreCommand::Columns { table } => {
            let columns = history
                .columns(&table)
                .with_context(|| format!("Failed to list columns of {}", table))?;
            print_list(&columns, format)?;
        }

        StoreCommand::Fetch {
            table,
            columns,
            start,
            end,
            output,
        } => {
            let columns = (!columns.is_empty()).then_some(columns);
            let records = history
                .get_data(
                    &table,
                    columns.as_deref(),
                    start.map(TimeBound::from).as_ref(),
                    end.map(TimeBound::from).as_ref(),
                )
                .with_context(|| format!("Failed to fetch {}", table))?;
            save(config, &history, &records, output.as_deref())?;
        }

        StoreCommand::Search {
            mut names,
            start,
            end,
            output,
            keep_column_names,
        } => {
            let query = match names.len() {
                1 => SearchQuery::Single(names.remove(0)),
                _ => SearchQuery::Many(names),
            };
            let records = history
                .search_data(
                    &query,
                    start.map(TimeBound::from).as_ref(),
                    end.map(TimeBound::from).as_ref(),
                    !keep_column_names,
                )
                .context("Search failed")?;
            save(config, &history, &records, output.as_deref())?;
        }

        StoreCommand::Locate { name } => {
            let resolution = history.locate(&name)?;
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(resolution.locations())?);
                }
                OutputFormat::Table => {
                    for location in resolution.locations() {
                        println!("{}", location);
                    }
                }
            }
        }
    }

    Ok(())
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ucnhistory={}", logging.level)));
    let registry = tracing_subscriber::registry().with(filter);

    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

fn print_list(items: &[String], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(items)?),
        OutputFormat::Table => {
            for item in items {
                println!("{}", item);
            }
        }
    }
    Ok(())
}

/// Write records to `output`, stdout for "-", or the default file name
fn save(config: &Config, history: &History, records: &RecordSet, output: Option<&Path>) -> Result<()> {
    let header = ExportHeader::new(
        config.database.name.clone(),
        records.source.clone(),
        history.provider().describe(),
    );

    if output == Some(Path::new("-")) {
        export::write_records(io::stdout().lock(), records, &header)?;
        return Ok(());
    }

    let path = match output {
        Some(path) => path.to_path_buf(),
        None => {
            let today = chrono::Local::now().date_naive();
            PathBuf::from(export::default_filename(&records.source.replace(',', "+"), today))
        }
    };

    let written = export::write_csv(&path, records, &header)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    eprintln!("Wrote {} rows to {}", records.len(), written.display());
    Ok(())
}

fn write_default_config(output: Option<&Path>) -> Result<()> {
    let config = generate_default_config();
    match output {
        Some(path) => {
            std::fs::write(path, config)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Config written to {}", path.display());
        }
        None => print!("{}", config),
    }
    Ok(())
}
