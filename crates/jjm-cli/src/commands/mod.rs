//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init and shared utilities (open_db, resolve_db_path, confirm)
//! - `serve` - Web server command and its environment configuration
//! - `pin` - PIN recovery
//! - `chat` - Chat history maintenance
//! - `stats` - Today's financial summary

pub mod chat;
pub mod core;
pub mod pin;
pub mod serve;
pub mod stats;

// Re-export command functions for main.rs
pub use chat::*;
pub use core::*;
pub use pin::*;
pub use serve::*;
pub use stats::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
