//! DevOps Relay CLI - Database migrations and secret tooling.
//!
//! # Usage
//!
//! ```bash
//! # Create the key-value table
//! relay-cli migrate
//!
//! # Print a strong secret for RELAY_WEBHOOK_SECRET or RELAY_ENCRYPTION_SECRET
//! relay-cli secret generate
//!
//! # Print the sealed token Azure DevOps carries in ?webhookSecret=
//! relay-cli secret encode
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `secret generate` - Generate a random secret
//! - `secret encode` - Seal the webhook secret with the encryption secret

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(author, version, about = "DevOps Relay CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Generate and seal secrets
    Secret {
        #[command(subcommand)]
        action: SecretAction,
    },
}

#[derive(Subcommand)]
enum SecretAction {
    /// Generate a random URL-safe secret
    Generate,
    /// Seal a webhook secret for use in a service hook URL
    Encode {
        /// Secret to seal (default: `RELAY_WEBHOOK_SECRET`)
        #[arg(short, long)]
        secret: Option<String>,
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
        Commands::Secret { action } => match action {
            SecretAction::Generate => commands::secret::generate(),
            SecretAction::Encode { secret } => commands::secret::encode(secret.as_deref())?,
        },
    }
    Ok(())
}
