//! Ledgerline CLI - Database migrations and platform bootstrap.
//!
//! # Usage
//!
//! ```bash
//! # Run billing database migrations
//! ll-cli migrate
//!
//! # Create a user
//! ll-cli user create -u alice -e alice@acme.io
//!
//! # Create the broker organization managed by alice
//! ll-cli broker create -s broker -n "Acme Platform" -e billing@acme.io -m alice
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `user create` - Create a user account
//! - `broker create` - Create the organization hosting the platform

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "ll-cli")]
#[command(author, version, about = "Ledgerline CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Manage the broker organization
    Broker {
        #[command(subcommand)]
        action: BrokerAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new user
    Create {
        /// Username (slug)
        #[arg(short, long)]
        username: String,

        /// Email address
        #[arg(short, long)]
        email: String,

        #[arg(long, default_value = "")]
        first_name: String,

        #[arg(long, default_value = "")]
        last_name: String,
    },
}

#[derive(Subcommand)]
enum BrokerAction {
    /// Create the broker organization
    Create {
        /// Organization slug (must match `BILLING_BROKER_SLUG`)
        #[arg(short, long, default_value = "broker")]
        slug: String,

        /// Organization display name
        #[arg(short, long)]
        name: String,

        /// Billing contact email
        #[arg(short, long)]
        email: String,

        /// Username of the first manager
        #[arg(short, long)]
        manager: Option<String>,
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
        Commands::User { action } => match action {
            UserAction::Create {
                username,
                email,
                first_name,
                last_name,
            } => {
                commands::broker::create_user(&username, &email, &first_name, &last_name).await?;
            }
        },
        Commands::Broker { action } => match action {
            BrokerAction::Create {
                slug,
                name,
                email,
                manager,
            } => {
                commands::broker::create(&slug, &name, &email, manager.as_deref()).await?;
            }
        },
    }
    Ok(())
}
