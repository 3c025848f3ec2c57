//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// JJM - Personal finance tracker with a chat assistant
#[derive(Parser)]
#[command(name = "jjm")]
#[command(about = "Personal finance tracker with a chat assistant", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path (falls back to JJM_DB, then jjm.db)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database and seed the PINs
    Init,

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3001")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Directory of a prebuilt UI to serve
        #[arg(long)]
        static_dir: Option<PathBuf>,

        /// Send raw error text to clients (also JJM_VERBOSE_ERRORS)
        #[arg(long)]
        verbose_errors: bool,

        /// Maximum pooled database connections (also JJM_POOL_SIZE)
        #[arg(long)]
        pool_size: Option<u32>,
    },

    /// PIN maintenance
    Pin {
        #[command(subcommand)]
        action: PinAction,
    },

    /// Chat history maintenance
    Chat {
        #[command(subcommand)]
        action: ChatAction,
    },

    /// Print the financial summary the chat assistant sees today
    Stats,
}

#[derive(Subcommand)]
pub enum PinAction {
    /// Restore the primary PIN to the configured default (backup PIN is untouched)
    Reset {
        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum ChatAction {
    /// Show recent chat messages
    History {
        /// Number of messages to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Delete all chat messages
    Clear {
        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
}
