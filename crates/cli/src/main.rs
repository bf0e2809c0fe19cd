//! Marram Goods CLI - database migrations and seed data.
//!
//! # Usage
//!
//! ```bash
//! # Run commerce database migrations
//! mg-cli migrate
//!
//! # Seed the catalog with demo data
//! mg-cli seed
//!
//! # Wipe the catalog first, then seed
//! mg-cli seed --clear
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed` - Insert demo products, variants, and coupons

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "mg-cli")]
#[command(author, version, about = "Marram Goods CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the catalog with demo data
    Seed {
        /// Wipe catalog tables before seeding
        #[arg(long)]
        clear: bool,
    },
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
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { clear } => commands::seed::run(clear).await?,
    }
    Ok(())
}
