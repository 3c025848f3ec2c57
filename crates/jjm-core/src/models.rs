//! Domain models for JJM

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Settings key holding the primary (mutable) PIN
pub const USER_PIN_KEY: &str = "user_pin";

/// Settings key holding the backup (immutable) PIN
pub const BACKUP_PIN_KEY: &str = "backup_pin";

/// A key/value settings row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Setting {
    pub key_name: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

/// Direction of money flow.
///
/// Transactions and categories store their type as free text; this enum is
/// what the aggregate queries and report plans filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Income,
    Expense,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl std::str::FromStr for EntryType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            _ => Err(format!("Unknown entry type: {}", s)),
        }
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A spending or income category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    /// Hex color used by the UI, e.g. `#ff8800`
    pub color: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Fields for creating or replacing a category
#[derive(Debug, Clone, PartialEq)]
pub struct NewCategory {
    pub name: String,
    pub color: Option<String>,
    pub kind: String,
}

/// A recorded transaction
///
/// `category` is a soft reference to `Category::name`; nothing in the store
/// keeps the two in sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub title: String,
    pub amount: f64,
    pub category: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Parsed entry type, `None` for free-text values outside income/expense
    pub fn entry_type(&self) -> Option<EntryType> {
        self.kind.parse().ok()
    }
}

/// Fields for creating or replacing a transaction
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub title: String,
    pub amount: f64,
    pub category: String,
    pub kind: String,
    pub date: NaiveDate,
}

/// Who wrote a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for ChatRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            _ => Err(format!("Unknown chat role: {}", s)),
        }
    }
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Income/expense totals over a date range
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub income: f64,
    pub expense: f64,
    pub count: i64,
}

impl PeriodSummary {
    pub fn balance(&self) -> f64 {
        self.income - self.expense
    }
}

/// Totals for a single calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub income: f64,
    pub expense: f64,
    pub count: i64,
}

/// Total for one category over a period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total: f64,
    pub count: i64,
}
