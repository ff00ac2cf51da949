//! Tangelo CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run store database migrations
//! tangelo-cli migrate store
//!
//! # Seed the catalog with sample products
//! tangelo-cli seed
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed` - Seed the catalog with sample products

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "tangelo-cli")]
#[command(author, version, about = "Tangelo CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        target: MigrateTarget,
    },
    /// Seed the catalog with sample products
    Seed,
}

#[derive(Subcommand)]
enum MigrateTarget {
    /// Run store database migrations
    Store,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate { target } => match target {
            MigrateTarget::Store => commands::migrate::store().await?,
        },
        Commands::Seed => commands::seed::run().await?,
    }
    Ok(())
}
