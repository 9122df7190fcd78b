//! Emporium CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront migrations (application tables and session table)
//! emporium migrate
//!
//! # Create demo products owned by a user (created if missing)
//! emporium seed --owner-email owner@example.com --password secret1
//!
//! # Delete expired sessions
//! emporium sessions prune
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "emporium")]
#[command(author, version, about = "Emporium CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the catalog with demo products
    Seed {
        /// Email of the user who will own the demo products
        #[arg(short, long)]
        owner_email: String,

        /// Password used if the owner account has to be created
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Manage stored sessions
    Sessions {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Delete expired sessions
    Prune,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed {
            owner_email,
            password,
        } => {
            commands::seed::demo_products(&owner_email, password.as_deref()).await?;
        }
        Commands::Sessions { action } => match action {
            SessionAction::Prune => commands::sessions::prune().await?,
        },
    }
    Ok(())
}
