//! PIN format rules and seeded defaults

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Primary PIN seeded on first run
pub const DEFAULT_PRIMARY_PIN: &str = "1234";

/// Backup PIN seeded on first run
pub const DEFAULT_BACKUP_PIN: &str = "0000";

/// Environment variable overriding the seeded primary PIN
pub const PRIMARY_PIN_ENV: &str = "JJM_DEFAULT_PIN";

/// Environment variable overriding the seeded backup PIN
pub const BACKUP_PIN_ENV: &str = "JJM_BACKUP_PIN";

/// Exactly four ASCII digits. `\d` would also admit non-ASCII digits.
const PIN_PATTERN: &str = r"^[0-9]{4}$";

/// Check that a PIN candidate is exactly four ASCII digits
pub fn is_valid_pin(pin: &str) -> bool {
    static PIN_RE: OnceLock<Regex> = OnceLock::new();
    PIN_RE
        .get_or_init(|| Regex::new(PIN_PATTERN).expect("valid regex"))
        .is_match(pin)
}

/// The PIN values written by ensure-and-seed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinDefaults {
    pub primary: String,
    pub backup: String,
}

impl Default for PinDefaults {
    fn default() -> Self {
        Self {
            primary: DEFAULT_PRIMARY_PIN.to_string(),
            backup: DEFAULT_BACKUP_PIN.to_string(),
        }
    }
}

impl PinDefaults {
    /// Build from explicit values, rejecting anything that isn't a valid PIN
    pub fn new(primary: impl Into<String>, backup: impl Into<String>) -> Result<Self> {
        let defaults = Self {
            primary: primary.into(),
            backup: backup.into(),
        };
        if !is_valid_pin(&defaults.primary) {
            return Err(Error::Config(format!(
                "{} must be exactly 4 digits",
                PRIMARY_PIN_ENV
            )));
        }
        if !is_valid_pin(&defaults.backup) {
            return Err(Error::Config(format!(
                "{} must be exactly 4 digits",
                BACKUP_PIN_ENV
            )));
        }
        Ok(defaults)
    }

    /// Read `JJM_DEFAULT_PIN` / `JJM_BACKUP_PIN`, falling back to 1234 / 0000
    pub fn from_env() -> Result<Self> {
        let primary =
            std::env::var(PRIMARY_PIN_ENV).unwrap_or_else(|_| DEFAULT_PRIMARY_PIN.to_string());
        let backup =
            std::env::var(BACKUP_PIN_ENV).unwrap_or_else(|_| DEFAULT_BACKUP_PIN.to_string());
        Self::new(primary, backup)
    }
}
