//! PIN recovery command

use anyhow::{Context, Result};
use jjm_core::db::Database;
use jjm_core::PinDefaults;

use super::confirm;

/// Restore the primary PIN to the configured default.
///
/// The backup PIN is never written here; it only changes by editing the
/// database by hand.
pub fn cmd_pin_reset(db: &Database, defaults: &PinDefaults, yes: bool) -> Result<()> {
    if !yes && !confirm("⚠️  This will reset the primary PIN to the configured default. Continue?")? {
        println!("Cancelled.");
        return Ok(());
    }

    db.ensure_settings(defaults).context("Failed to seed settings")?;
    db.set_primary_pin(&defaults.primary).context("Failed to reset PIN")?;

    tracing::info!("Primary PIN reset to configured default");
    println!("✅ Primary PIN reset. The backup PIN is unchanged.");
    Ok(())
}
