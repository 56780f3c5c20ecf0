//! ShopEZ CLI - browse the catalog and manage your cart from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Browse
//! shopez products --limit 5
//! shopez products --category electronics
//! shopez product 7
//!
//! # Account
//! shopez signup -e shopper@example.com
//! shopez login -e shopper@example.com
//!
//! # Cart
//! shopez cart add 7 --quantity 2
//! shopez cart dec 7
//! shopez cart watch
//! ```
//!
//! Catalog commands need no account. Account and cart commands read
//! `SHOPEZ_DATABASE_URL` and `SHOPEZ_API_KEY`; the sign-in persists in
//! `SHOPEZ_CACHE_DIR` between runs.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use shopez_storefront::config::SentryConfig;
use shopez_storefront::error::AppError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "shopez")]
#[command(author, version, about = "ShopEZ storefront")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and sign in
    Signup {
        #[arg(short, long)]
        email: String,
        /// Read from stdin when omitted
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Sign in with email and password
    Login {
        #[arg(short, long)]
        email: String,
        /// Read from stdin when omitted
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Sign out and forget the saved session
    Logout,
    /// Show the signed-in account
    Whoami,
    /// List products
    Products {
        /// Only products in this category
        #[arg(short, long)]
        category: Option<String>,
        /// Only the first N products
        #[arg(short, long)]
        limit: Option<u32>,
    },
    /// List product categories
    Categories,
    /// Show one product
    Product {
        /// Product ID
        id: String,
    },
    /// Manage your cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart
    Show,
    /// Add a product
    Add {
        /// Product ID
        id: String,
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Set a line's quantity (0 removes it)
    Set {
        /// Product ID
        id: String,
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Increase a line's quantity by one
    Inc {
        /// Product ID
        id: String,
    },
    /// Decrease a line's quantity by one
    Dec {
        /// Product ID
        id: String,
    },
    /// Remove a line
    Remove {
        /// Product ID
        id: String,
    },
    /// Follow the cart live until Ctrl-C
    Watch,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &SentryConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config.environment.clone().map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&SentryConfig::from_env());

    // Logs go to stderr so command output stays clean
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "shopez_storefront=info,shopez_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let result: Result<(), AppError> = match cli.command {
        Commands::Signup { email, password } => commands::auth::signup(&email, password).await,
        Commands::Login { email, password } => commands::auth::login(&email, password).await,
        Commands::Logout => commands::auth::logout().await,
        Commands::Whoami => commands::auth::whoami().await,
        Commands::Products { category, limit } => {
            commands::catalog::products(category.as_deref(), limit).await
        }
        Commands::Categories => commands::catalog::categories().await,
        Commands::Product { id } => commands::catalog::product(&id).await,
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show().await,
            CartAction::Add { id, quantity } => commands::cart::add(&id, quantity).await,
            CartAction::Set { id, quantity } => commands::cart::set(&id, quantity).await,
            CartAction::Inc { id } => commands::cart::step(&id, 1).await,
            CartAction::Dec { id } => commands::cart::step(&id, -1).await,
            CartAction::Remove { id } => commands::cart::remove(&id).await,
            CartAction::Watch => commands::cart::watch().await,
        },
    };

    result.map_err(|e| {
        e.report();
        e.user_message().into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_cart_set_negative() {
        let cli = Cli::try_parse_from(["shopez", "cart", "set", "7", "-1"]).unwrap_or_else(|e| {
            panic!("parse failed: {e}");
        });
        assert!(matches!(
            cli.command,
            Commands::Cart {
                action: CartAction::Set { quantity: -1, .. }
            }
        ));
    }

    #[test]
    fn test_parse_add_defaults_to_one() {
        let cli = Cli::try_parse_from(["shopez", "cart", "add", "7"]).unwrap_or_else(|e| {
            panic!("parse failed: {e}");
        });
        assert!(matches!(
            cli.command,
            Commands::Cart {
                action: CartAction::Add { quantity: 1, .. }
            }
        ));
    }
}
