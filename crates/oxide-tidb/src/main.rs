//! oxide-tidb CLI
//!
//! Applies and exports Schemafiles against MySQL-compatible databases, with
//! TiDB `AUTO_RANDOM` support.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_schema::{BlockingMySqlConnection, SchemaClient};
use oxide_tidb::{supports_auto_random, AutoRandomExtension};

/// Declarative schema management for TiDB and MySQL.
#[derive(Parser)]
#[command(name = "oxide-tidb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL, e.g. mysql://root@127.0.0.1:4000/app.
    #[arg(short, long, env = "DATABASE_URL")]
    database: String,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bring the database in line with a Schemafile.
    Apply {
        /// Schemafile path.
        #[arg(short, long, default_value = "Schemafile")]
        file: PathBuf,

        /// Print the SQL without executing it.
        #[arg(long)]
        dry_run: bool,

        /// Never drop tables missing from the Schemafile.
        #[arg(long)]
        skip_drop_table: bool,
    },

    /// Show what `apply` would change.
    Diff {
        /// Schemafile path.
        #[arg(short, long, default_value = "Schemafile")]
        file: PathBuf,

        /// Print the operations as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Export the database as a Schemafile.
    Export {
        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Report whether the server supports AUTO_RANDOM.
    Detect,
}

fn read_schemafile(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let conn = BlockingMySqlConnection::connect(&cli.database)?;
    let mut client = SchemaClient::new(Box::new(conn)).with_extension(AutoRandomExtension::new());

    match cli.command {
        Commands::Apply {
            file,
            dry_run,
            skip_drop_table,
        } => {
            let schemafile = read_schemafile(&file)?;
            if dry_run {
                info!("Dry run mode - SQL will be printed but not executed.");
            }
            let mut client = client.dry_run(dry_run).skip_drop_table(skip_drop_table);
            let statements = client.apply(&schemafile)?;
            if dry_run {
                for sql in &statements {
                    println!("{sql};");
                }
            }
            info!(statements = statements.len(), "Apply finished");
        }

        Commands::Diff { file, json } => {
            let schemafile = read_schemafile(&file)?;
            let diff = client.diff(&schemafile)?;
            if json {
                println!("{}", diff.to_json()?);
            } else if diff.operations.is_empty() {
                info!("No change");
            } else {
                print!("{diff}");
            }
        }

        Commands::Export { output } => {
            let schemafile = client.dump()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, schemafile)
                        .with_context(|| format!("writing {}", path.display()))?;
                    info!(path = %path.display(), "Schemafile written");
                }
                None => print!("{schemafile}"),
            }
        }

        Commands::Detect => {
            if supports_auto_random(client.session()) {
                println!("TiDB detected: AUTO_RANDOM is supported");
            } else {
                println!("Not TiDB: AUTO_RANDOM options will be ignored");
            }
        }
    }

    Ok(())
}
