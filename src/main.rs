//! Inventory console.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌───────────────────────────────────────────────────┐
//!                 │                 INVENTORY CONSOLE                 │
//!   Request       │  ┌─────────┐    ┌──────────┐    ┌─────────────┐   │
//!   ──────────────┼─▶│  http   │───▶│ routing  │───▶│    views    │   │
//!                 │  │ server  │    │  table   │    │  handlers   │   │
//!   Response      │  └─────────┘    └──────────┘    └──────┬──────┘   │
//!   ◀─────────────┼────────────────────────────────────────┘          │
//!                 │                                                   │
//!   Operator      │  ┌─────────────────────────────────────────────┐  │
//!   ──────────────┼─▶│ migrations: chain → ledger → atomic apply   │  │
//!                 │  └─────────────────────────────────────────────┘  │
//!                 │  config · observability · lifecycle               │
//!                 └───────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use inventory_console::config::{load_config, ConsoleConfig};
use inventory_console::lifecycle::{signals, startup, Shutdown};
use inventory_console::migrations::Migrator;
use inventory_console::observability::logging;
use inventory_console::routing::Router;

#[derive(Parser)]
#[command(name = "inventory-console")]
#[command(about = "Inventory console: route table and schema migrations", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the console (default)
    Serve,
    /// Apply pending schema migrations
    Migrate {
        /// Mark this migration as applied without running it
        #[arg(long)]
        fake: Option<String>,
    },
    /// List migrations and whether they are applied
    Showmigrations,
    /// Print the route table in match order
    Routes,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ConsoleConfig::default(),
    };
    logging::init(&config.observability.log_level);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            tracing::info!("inventory-console v{} starting", env!("CARGO_PKG_VERSION"));
            let shutdown = Shutdown::new();
            signals::spawn_signal_listener(shutdown.clone());
            startup::run(config, shutdown).await?;
            tracing::info!("Shutdown complete");
        }
        Commands::Migrate { fake } => {
            let mut conn = startup::open_database(&config.database)?;
            match fake {
                Some(name) => {
                    let migrator = Migrator::inventory()?;
                    let step = migrator.find(&name)?.clone();
                    migrator.fake(&mut conn, &step)?;
                    println!("  Faked {}", step.key);
                }
                None => {
                    let applied = startup::run_migrations(&mut conn)?;
                    if applied.is_empty() {
                        println!("  No migrations to apply.");
                    }
                    for key in applied {
                        println!("  Applied {key}");
                    }
                }
            }
        }
        Commands::Showmigrations => {
            let conn = startup::open_database(&config.database)?;
            let migrator = Migrator::inventory()?;
            let pending: Vec<_> = migrator.plan(&conn)?.iter().map(|m| m.key).collect();
            for step in migrator.steps() {
                let mark = if pending.contains(&step.key) { ' ' } else { 'X' };
                println!(" [{mark}] {}", step.key);
            }
        }
        Commands::Routes => {
            let router = Router::inventory()?;
            for route in router.routes() {
                println!(
                    "{:<45} {:<20} {}",
                    route.pattern.template(),
                    route.name,
                    route.view
                );
            }
        }
    }

    Ok(())
}
