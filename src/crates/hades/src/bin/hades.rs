//! Hades CLI
//!
//! Track, inspect and roll back operations from the command line.

use clap::{Parser, Subcommand};
use colored::Colorize;
use hades::{cli, config, logging, RollbackEngine};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hades")]
#[command(about = "Hades - track operations and roll them back", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Explicit configuration file, applied after the standard locations
    #[arg(short, long, global = true, env = "HADES_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List recent operations
    List {
        /// Maximum number of operations to show
        #[arg(short, long, default_value_t = 10)]
        limit: u32,
    },
    /// Roll back one operation
    Rollback {
        /// Operation ID
        #[arg(long)]
        id: String,
    },
    /// Roll back the most recent operations that are not rolled back yet
    RollbackLast {
        /// How many operations to roll back
        #[arg(short, long, default_value_t = 1)]
        count: u32,
    },
    /// Track a command before running it; prints the operation ID
    Track {
        /// Operation type, e.g. file_write, docker_stop, sql_update
        #[arg(short = 't', long = "type")]
        operation_type: String,
        /// External reference for the caller's own bookkeeping
        #[arg(long)]
        correlation_id: Option<String>,
        /// The command that is about to run
        command: String,
    },
    /// Record that a tracked command finished
    Complete {
        /// Operation ID
        #[arg(long)]
        id: String,
        /// The command failed
        #[arg(long)]
        failed: bool,
    },
    /// Show the full record of one operation
    Show {
        /// Operation ID
        #[arg(long)]
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let config = config::load_config(args.config.as_deref()).await?;
    logging::init(&config.logging);

    let engine = match RollbackEngine::from_config(&config).await {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("{} {}", "✗ Failed to start:".red().bold(), e);
            return Err(e.into());
        }
    };

    let succeeded = match args.command {
        Commands::List { limit } => cli::handle_list(&engine, limit).await.map(|_| true)?,
        Commands::Rollback { id } => cli::handle_rollback(&engine, id).await?,
        Commands::RollbackLast { count } => cli::handle_rollback_last(&engine, count).await?,
        Commands::Track {
            operation_type,
            correlation_id,
            command,
        } => cli::handle_track(&engine, operation_type, command, correlation_id)
            .await
            .map(|_| true)?,
        Commands::Complete { id, failed } => cli::handle_complete(&engine, id, !failed)
            .await
            .map(|_| true)?,
        Commands::Show { id } => cli::handle_show(&engine, id).await.map(|_| true)?,
    };

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}
