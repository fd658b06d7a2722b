//! ShareRideStories CLI - Database migrations and demo data.
//!
//! # Usage
//!
//! ```bash
//! # Create or upgrade the schema (stories, users, tokens, sessions)
//! sharerides-cli migrate
//!
//! # Insert 20 demo stories owned by a demo user
//! sharerides-cli seed --count 20
//! ```
//!
//! Both commands read `SHARERIDES_DATABASE_URL` (or `DATABASE_URL`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "sharerides-cli")]
#[command(author, version, about = "ShareRideStories CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Insert demo stories
    Seed {
        /// Number of stories to insert
        #[arg(short, long, default_value_t = 20)]
        count: u32,

        /// Owner of the demo stories
        #[arg(short, long, default_value = "demo@shareridestories.com")]
        email: String,
    },
}

#[tokio::main]
async fn main() {
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
        Commands::Seed { count, email } => commands::seed::stories(count, &email).await?,
    }
    Ok(())
}
