//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `resolve_db_path` / `open_db` - Shared database setup
//! - `pin_defaults` - PIN defaults from the environment
//! - `confirm` - Interactive y/N prompt
//! - `cmd_init` - Initialize the database

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use jjm_core::db::{Database, DEFAULT_POOL_SIZE};
use jjm_core::PinDefaults;

/// Environment variable holding the database path
pub const DB_PATH_ENV: &str = "JJM_DB";

/// Environment variable holding the pool size
pub const POOL_SIZE_ENV: &str = "JJM_POOL_SIZE";

const DEFAULT_DB_PATH: &str = "jjm.db";

/// `--db`, else `JJM_DB`, else `jjm.db`
pub fn resolve_db_path(arg: Option<&Path>) -> PathBuf {
    if let Some(path) = arg {
        return path.to_path_buf();
    }
    std::env::var(DB_PATH_ENV)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH))
}

/// `--pool-size`, else `JJM_POOL_SIZE`, else the library default
pub fn resolve_pool_size(arg: Option<u32>) -> Result<u32> {
    let size = match arg {
        Some(size) => size,
        None => match std::env::var(POOL_SIZE_ENV) {
            Ok(value) if !value.trim().is_empty() => value
                .trim()
                .parse::<u32>()
                .with_context(|| format!("{} must be a positive number", POOL_SIZE_ENV))?,
            _ => DEFAULT_POOL_SIZE,
        },
    };

    if size == 0 {
        anyhow::bail!("Pool size must be at least 1");
    }
    Ok(size)
}

/// Open the database, creating the schema if needed
pub fn open_db(db_path: &Path, pool_size: Option<u32>) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path must be valid UTF-8")?;
    let pool_size = resolve_pool_size(pool_size)?;
    Database::open_with_pool_size(path_str, pool_size)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))
}

/// PIN defaults from `JJM_DEFAULT_PIN` / `JJM_BACKUP_PIN`
pub fn pin_defaults() -> Result<PinDefaults> {
    PinDefaults::from_env().context("Invalid PIN configuration")
}

/// Ask a y/N question on stdin
pub fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

pub fn cmd_init(db_path: &Path) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path, None)?;
    init_database(&db, &pin_defaults()?)?;

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Start the server: jjm serve");
    println!("  2. Log in with the default PIN, then change it from the app");

    Ok(())
}

/// Seed settings; safe to run on an existing database
pub fn init_database(db: &Database, defaults: &PinDefaults) -> Result<()> {
    db.ensure_settings(defaults)
        .context("Failed to seed settings")?;
    println!("   Settings seeded (existing PINs are kept)");
    Ok(())
}
