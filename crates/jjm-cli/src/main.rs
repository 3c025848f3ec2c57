//! JJM CLI - Personal finance tracker
//!
//! Usage:
//!   jjm init                  Initialize database
//!   jjm serve --port 3001     Start web server
//!   jjm pin reset             Restore the primary PIN
//!   jjm chat clear            Delete chat history
//!   jjm stats                 Print today's financial summary

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

    let db_path = commands::resolve_db_path(cli.db.as_deref());

    match cli.command {
        Commands::Init => commands::cmd_init(&db_path),
        Commands::Serve {
            port,
            host,
            static_dir,
            verbose_errors,
            pool_size,
        } => {
            commands::cmd_serve(
                &db_path,
                &host,
                port,
                static_dir.as_deref(),
                verbose_errors,
                pool_size,
            )
            .await
        }
        Commands::Pin { action } => {
            let db = commands::open_db(&db_path, None)?;
            match action {
                PinAction::Reset { yes } => {
                    let defaults = commands::pin_defaults()?;
                    commands::cmd_pin_reset(&db, &defaults, yes)
                }
            }
        }
        Commands::Chat { action } => {
            let db = commands::open_db(&db_path, None)?;
            match action {
                ChatAction::History { limit } => commands::cmd_chat_history(&db, limit),
                ChatAction::Clear { yes } => commands::cmd_chat_clear(&db, yes),
            }
        }
        Commands::Stats => {
            let db = commands::open_db(&db_path, None)?;
            commands::cmd_stats(&db, chrono::Local::now().date_naive())
        }
    }
}
