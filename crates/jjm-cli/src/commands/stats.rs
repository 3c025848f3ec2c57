//! Financial summary command

use anyhow::{Context, Result};
use chrono::NaiveDate;
use jjm_core::db::Database;
use jjm_core::ContextAssembler;

/// Print the context block the chat assistant would receive for `today`
pub fn cmd_stats(db: &Database, today: NaiveDate) -> Result<()> {
    let snapshot = ContextAssembler::new(db)
        .snapshot(today)
        .context("Failed to build financial summary")?;

    println!("📊 Ringkasan keuangan per {}", today);
    println!("   ─────────────────────────────");
    println!("{}", snapshot.render());

    Ok(())
}
