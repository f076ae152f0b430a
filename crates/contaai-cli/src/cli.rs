//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI
//! arguments. The actual command implementations are in the `commands`
//! module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Default database location: ~/.local/share/contaai/contaai.db (or the
/// platform equivalent), falling back to the working directory.
pub fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("contaai").join("contaai.db"))
        .unwrap_or_else(|| PathBuf::from("contaai.db"))
}

/// ContaAI - accounting back-office server and tools
#[derive(Parser)]
#[command(name = "contaai")]
#[command(about = "Multi-tenant accounting back-office", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value_os_t = default_db_path(), global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set CONTAAI_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3001")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Directory containing static files to serve (e.g., ui/dist)
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },

    /// Compute a financial report for a company
    Report {
        /// Company ID
        #[arg(short, long)]
        company: i64,

        /// Inclusive range start (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// Exclusive range end (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,

        /// Print the raw JSON payload instead of the summary table
        #[arg(long)]
        json: bool,
    },

    /// Run bank reconciliation for a statement
    Reconcile {
        /// Company ID
        #[arg(short, long)]
        company: i64,

        /// Bank statement ID
        #[arg(short, long)]
        statement: i64,
    },

    /// List companies
    Companies,

    /// Show database status
    Status,
}
