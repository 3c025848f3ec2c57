//! Chat history commands

use anyhow::{Context, Result};
use jjm_core::db::Database;

use super::{confirm, truncate};

pub fn cmd_chat_history(db: &Database, limit: i64) -> Result<()> {
    let messages = db
        .recent_chat_messages(limit)
        .context("Failed to load chat history")?;

    if messages.is_empty() {
        println!("No chat messages.");
        return Ok(());
    }

    println!("💬 Last {} chat message(s)", messages.len());
    println!("   ─────────────────────────────");
    for message in &messages {
        println!(
            "   [{}] {:<9} {}",
            message.created_at.format("%Y-%m-%d %H:%M"),
            message.role.as_str(),
            truncate(&message.content.replace('\n', " "), 80)
        );
    }

    Ok(())
}

pub fn cmd_chat_clear(db: &Database, yes: bool) -> Result<()> {
    let count = db.count_chat_messages()?;
    if count == 0 {
        println!("Chat history is already empty.");
        return Ok(());
    }

    if !yes && !confirm(&format!("⚠️  Delete all {} chat message(s)?", count))? {
        println!("Cancelled.");
        return Ok(());
    }

    let removed = db
        .clear_chat_messages()
        .context("Failed to clear chat history")?;
    println!("✅ Deleted {} chat message(s).", removed);
    Ok(())
}
