//! Bazaar CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! bazaar-cli migrate
//!
//! # Create a user (role defaults to `user`)
//! bazaar-cli user create -e admin@example.com -n "Admin Name" -p 'long password' -r admin
//!
//! # Promote an existing user to admin
//! bazaar-cli user promote -e someone@example.com
//!
//! # Insert demo categories, products and a warehouse
//! bazaar-cli seed
//! ```
//!
//! All commands read `DATABASE_URL` from the environment or `.env`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "bazaar-cli")]
#[command(author, version, about = "Bazaar CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage user accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Insert demo data (safe to run repeatedly)
    Seed,
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new user
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Password (8 to 128 characters)
        #[arg(short, long)]
        password: String,

        /// Role (`user`, `admin`)
        #[arg(short, long, default_value = "user")]
        role: String,
    },
    /// Give an existing user the admin role
    Promote {
        /// Email address
        #[arg(short, long)]
        email: String,
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
                email,
                name,
                password,
                role,
            } => {
                commands::user::create(&email, &name, &password, &role).await?;
            }
            UserAction::Promote { email } => commands::user::promote(&email).await?,
        },
        Commands::Seed => commands::seed::run().await?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_user_create_role_defaults_to_user() {
        let cli = Cli::try_parse_from([
            "bazaar-cli",
            "user",
            "create",
            "-e",
            "a@example.com",
            "-n",
            "A",
            "-p",
            "password123",
        ]);
        let Ok(Cli {
            command:
                Commands::User {
                    action: UserAction::Create { role, .. },
                },
        }) = cli
        else {
            panic!("expected user create");
        };
        assert_eq!(role, "user");
    }
}
