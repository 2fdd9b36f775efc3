//! Tally CLI - personal finance tracking in your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{account, dashboard, logs, transaction};

/// Tally - income and expenses in your terminal
#[derive(Parser)]
#[command(name = "tally", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account with email and password
    Register {
        /// Display name
        #[arg(long)]
        name: Option<String>,
        /// Email address
        #[arg(long)]
        email: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Log in with email and password
    Login {
        /// Email address
        #[arg(long)]
        email: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Log in with an identity asserted by an external provider
    LoginExternal {
        #[command(flatten)]
        assertion: account::AssertionArgs,
        /// Link the assertion to the currently logged in identity instead
        #[arg(long)]
        link: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// End the current session
    Logout,

    /// Show who is logged in
    Whoami {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete expired sessions
    PurgeSessions {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Record a transaction
    Add {
        #[command(flatten)]
        fields: transaction::TransactionArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List your transactions, newest first
    List {
        /// Show at most this many
        #[arg(short, long)]
        limit: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one of your transactions
    Show {
        /// Transaction ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replace the fields of one of your transactions
    Edit {
        /// Transaction ID
        id: String,
        #[command(flatten)]
        fields: transaction::TransactionArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete one of your transactions
    Delete {
        /// Transaction ID
        id: String,
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },

    /// Totals, balance and spending by category
    Dashboard {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Everyone's transactions (read-only)
    Public {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// View and manage the internal event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

fn report(e: &anyhow::Error) {
    match e.downcast_ref::<tally_core::Error>() {
        Some(tally_core::Error::Validation(errors)) => {
            for message in errors.messages() {
                output::error(message);
            }
        }
        _ => output::error(&format!("{:#}", e)),
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Register { name, email, json } => account::register(name, email, json).await,
        Commands::Login { email, json } => account::login(email, json).await,
        Commands::LoginExternal { assertion, link, json } => {
            account::login_external(assertion, link, json).await
        }
        Commands::Logout => account::logout().await,
        Commands::Whoami { json } => account::whoami(json).await,
        Commands::PurgeSessions { json } => account::purge_sessions(json).await,
        Commands::Add { fields, json } => transaction::add(fields, json).await,
        Commands::List { limit, json } => transaction::list(limit, json).await,
        Commands::Show { id, json } => transaction::show(&id, json).await,
        Commands::Edit { id, fields, json } => transaction::edit(&id, fields, json).await,
        Commands::Delete { id, force } => transaction::delete(&id, force).await,
        Commands::Dashboard { json } => dashboard::dashboard(json).await,
        Commands::Public { json } => dashboard::public_feed(json).await,
        Commands::Logs { command } => logs::run(command),
    }
}
