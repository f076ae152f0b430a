//! ContaAI CLI - accounting back-office
//!
//! Usage:
//!   contaai init                       Initialize database
//!   contaai serve --port 3001          Start web server
//!   contaai report --company 1         Print a financial report
//!   contaai reconcile -c 1 -s 2        Run bank reconciliation
//!   contaai status                     Show database status

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Serve {
            port,
            host,
            static_dir,
        } => {
            commands::cmd_serve(&cli.db, &host, port, static_dir.as_deref(), cli.no_encrypt).await
        }
        Commands::Report {
            company,
            from,
            to,
            json,
        } => commands::cmd_report(
            &cli.db,
            company,
            from.as_deref(),
            to.as_deref(),
            json,
            cli.no_encrypt,
        ),
        Commands::Reconcile { company, statement } => {
            commands::cmd_reconcile(&cli.db, company, statement, cli.no_encrypt)
        }
        Commands::Companies => commands::cmd_companies(&cli.db, cli.no_encrypt),
        Commands::Status => commands::cmd_status(&cli.db, cli.no_encrypt),
    }
}
