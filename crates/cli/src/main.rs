//! Elizabeth CLI - database migrations and Armtek diagnostics.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! elizabeth migrate
//!
//! # Search with the configured default account
//! elizabeth armtek search OC90_MAHLE
//!
//! # Show the customer structure behind ARMTEK_LOGIN
//! elizabeth armtek profile
//!
//! # Compute correlation tokens for an offer
//! elizabeth armtek token 111 --pin OC90 --brand MAHLE
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `armtek search` - One-off part search, printed as JSON
//! - `armtek profile` - Sales organizations and discovered search context
//! - `armtek token` - API and characteristics tokens

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "elizabeth")]
#[command(author, version, about = "Elizabeth CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Talk to the Armtek web service with the configured default account
    Armtek {
        #[command(subcommand)]
        action: ArmtekAction,
    },
}

#[derive(Subcommand)]
enum ArmtekAction {
    /// Search for an article (`PIN`, `PIN_BRAND` or `PIN BRAND`)
    Search {
        /// Query text
        query: String,

        /// Explicit `QUERY_TYPE` sent to Armtek
        #[arg(short = 't', long)]
        query_type: Option<i32>,

        /// Print every row instead of the main offer only
        #[arg(short, long)]
        all: bool,
    },
    /// Discover the customer structure behind the login
    Profile,
    /// Compute correlation tokens for an offer
    Token {
        /// Armtek article id (`ARTID`)
        artid: String,

        /// Article number the offer was found under
        #[arg(short, long)]
        pin: String,

        /// Brand the offer was found under
        #[arg(short, long)]
        brand: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "elizabeth_server=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

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
        Commands::Armtek { action } => match action {
            ArmtekAction::Search {
                query,
                query_type,
                all,
            } => commands::armtek::search(&query, query_type, all).await?,
            ArmtekAction::Profile => commands::armtek::profile().await?,
            ArmtekAction::Token { artid, pin, brand } => {
                commands::armtek::token(&artid, &pin, brand.as_deref())?;
            }
        },
    }
    Ok(())
}
