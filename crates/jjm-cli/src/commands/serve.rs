//! Server command implementation

use std::path::Path;

use anyhow::{Context, Result};
use jjm_core::{ChatMode, MarketConfig};
use jjm_server::ServerConfig;

use super::{open_db, pin_defaults};

/// Environment variable enabling raw error text in responses
pub const VERBOSE_ERRORS_ENV: &str = "JJM_VERBOSE_ERRORS";

/// Comma-separated CORS origins; unset means any origin
pub const ALLOWED_ORIGINS_ENV: &str = "JJM_ALLOWED_ORIGINS";

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

/// Build the server configuration from flags and environment variables
pub fn server_config(verbose_errors: bool) -> Result<ServerConfig> {
    let allowed_origins: Vec<String> = std::env::var(ALLOWED_ORIGINS_ENV)
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    Ok(ServerConfig {
        verbose_errors: verbose_errors || env_flag(VERBOSE_ERRORS_ENV),
        allowed_origins,
        pins: pin_defaults()?,
        chat_mode: ChatMode::from_env().context("Invalid chat mode")?,
        market: MarketConfig::from_env(),
    })
}

pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    static_dir: Option<&Path>,
    verbose_errors: bool,
    pool_size: Option<u32>,
) -> Result<()> {
    let config = server_config(verbose_errors)?;

    println!("🚀 Starting JJM web server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);
    if let Some(dir) = static_dir {
        println!("   Static files: {}", dir.display());
    }
    println!("   Chat mode: {}", config.chat_mode);
    if let Some(ref market) = config.market {
        println!(
            "   📈 Market data: enabled ({}s timeout per source)",
            market.timeout.as_secs()
        );
    }
    if config.allowed_origins.is_empty() {
        println!("   🌐 CORS: any origin");
    } else {
        println!("   🌐 CORS: {}", config.allowed_origins.join(", "));
    }
    if config.verbose_errors {
        println!();
        println!("   ⚠️  Verbose errors ENABLED - raw error text is sent to clients");
    }
    println!();
    println!("   Press Ctrl+C to stop");

    let db = open_db(db_path, pool_size)?;

    let static_dir_str = static_dir
        .map(|p| p.to_str().context("Static directory path must be valid UTF-8"))
        .transpose()?;
    jjm_server::serve_with_config(db, host, port, static_dir_str, config).await?;

    Ok(())
}
