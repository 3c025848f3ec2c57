//! Allow-listed report plans
//!
//! In report mode the model never writes SQL. It answers with one line of a
//! tiny grammar:
//!
//! ```text
//! REPORT <summary|top_categories|recent|daily|largest> <today|week|month|last_month|all> [income|expense]
//! NONE
//! ```
//!
//! [`parse_plan`] accepts exactly that (case-insensitive, optionally wrapped
//! in backticks) and rejects everything else. Accepted plans run as fixed,
//! parameterized queries via [`run_report`].

use chrono::NaiveDate;
use thiserror::Error;

use crate::context::{
    format_rupiah, month_bounds, previous_month_bounds, render_transaction, trailing_week,
};
use crate::db::Database;
use crate::error::Result;
use crate::models::EntryType;

const TOP_LIMIT: i64 = 5;
const RECENT_LIMIT: i64 = 10;

/// Which report to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Summary,
    TopCategories,
    Recent,
    Daily,
    Largest,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::TopCategories => "top_categories",
            Self::Recent => "recent",
            Self::Daily => "daily",
            Self::Largest => "largest",
        }
    }
}

impl std::str::FromStr for ReportKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(Self::Summary),
            "top_categories" => Ok(Self::TopCategories),
            "recent" => Ok(Self::Recent),
            "daily" => Ok(Self::Daily),
            "largest" => Ok(Self::Largest),
            _ => Err(format!("Unknown report: {}", s)),
        }
    }
}

/// Date window for a report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportPeriod {
    Today,
    Week,
    Month,
    LastMonth,
    All,
}

impl ReportPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Week => "week",
            Self::Month => "month",
            Self::LastMonth => "last_month",
            Self::All => "all",
        }
    }

    /// Inclusive bounds relative to `today`
    pub fn bounds(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            Self::Today => (today, today),
            Self::Week => trailing_week(today),
            Self::Month => month_bounds(today),
            Self::LastMonth => previous_month_bounds(today),
            // Stored dates are YYYY-MM-DD text, so the bounds must be too
            Self::All => (
                NaiveDate::from_ymd_opt(1, 1, 1).unwrap_or(today),
                NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(today),
            ),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Today => "hari ini",
            Self::Week => "7 hari terakhir",
            Self::Month => "bulan ini",
            Self::LastMonth => "bulan lalu",
            Self::All => "sepanjang waktu",
        }
    }
}

impl std::str::FromStr for ReportPeriod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "today" => Ok(Self::Today),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "last_month" => Ok(Self::LastMonth),
            "all" => Ok(Self::All),
            _ => Err(format!("Unknown period: {}", s)),
        }
    }
}

/// A parsed, allow-listed report request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportPlan {
    pub kind: ReportKind,
    pub period: ReportPeriod,
    pub entry_type: Option<EntryType>,
}

/// What the planning call asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanReply {
    Report(ReportPlan),
    /// The question needs no transaction data
    NoReport,
}

/// Why a planning reply was refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanRejection {
    #[error("empty plan")]
    Empty,

    #[error("plan spans multiple lines")]
    MultiLine,

    #[error("plan must start with REPORT or be NONE, got {0:?}")]
    NotAReport(String),

    #[error("wrong number of plan arguments ({0})")]
    Arity(usize),

    #[error("{0}")]
    UnknownToken(String),
}

/// Strictly parse a planning reply.
pub fn parse_plan(reply: &str) -> std::result::Result<PlanReply, PlanRejection> {
    let trimmed = reply.trim().trim_matches('`').trim();
    if trimmed.is_empty() {
        return Err(PlanRejection::Empty);
    }
    if trimmed.contains('\n') || trimmed.contains('\r') {
        return Err(PlanRejection::MultiLine);
    }

    let tokens: Vec<&str> = trimmed.split_whitespace().collect();

    if tokens.len() == 1 && tokens[0].eq_ignore_ascii_case("NONE") {
        return Ok(PlanReply::NoReport);
    }
    if !tokens[0].eq_ignore_ascii_case("REPORT") {
        return Err(PlanRejection::NotAReport(tokens[0].to_string()));
    }
    if !(3..=4).contains(&tokens.len()) {
        return Err(PlanRejection::Arity(tokens.len() - 1));
    }

    let kind: ReportKind = tokens[1].parse().map_err(PlanRejection::UnknownToken)?;
    let period: ReportPeriod = tokens[2].parse().map_err(PlanRejection::UnknownToken)?;
    let entry_type = match tokens.get(3) {
        Some(token) => Some(
            token
                .parse::<EntryType>()
                .map_err(PlanRejection::UnknownToken)?,
        ),
        None => None,
    };

    Ok(PlanReply::Report(ReportPlan {
        kind,
        period,
        entry_type,
    }))
}

/// Run a plan and render its rows as Indonesian text for the narration call
pub fn run_report(db: &Database, plan: &ReportPlan, today: NaiveDate) -> Result<String> {
    let (from, to) = plan.period.bounds(today);
    let period = plan.period.label();
    let mut lines = Vec::new();

    match plan.kind {
        ReportKind::Summary => {
            let summary = db.summarize_period(from, to)?;
            lines.push(format!("Ringkasan {}:", period));
            match plan.entry_type {
                Some(EntryType::Income) => {
                    lines.push(format!("- Pemasukan: {}", format_rupiah(summary.income)))
                }
                Some(EntryType::Expense) => {
                    lines.push(format!("- Pengeluaran: {}", format_rupiah(summary.expense)))
                }
                None => {
                    lines.push(format!("- Pemasukan: {}", format_rupiah(summary.income)));
                    lines.push(format!("- Pengeluaran: {}", format_rupiah(summary.expense)));
                    lines.push(format!("- Saldo: {}", format_rupiah(summary.balance())));
                }
            }
            lines.push(format!("- Jumlah transaksi: {}", summary.count));
        }
        ReportKind::TopCategories => {
            let kind = plan.entry_type.unwrap_or(EntryType::Expense);
            let totals = db.top_categories(kind, from, to, TOP_LIMIT)?;
            lines.push(format!("Kategori {} terbesar {}:", kind_label(kind), period));
            if totals.is_empty() {
                lines.push("- Tidak ada data".to_string());
            }
            for (i, cat) in totals.iter().enumerate() {
                lines.push(format!(
                    "{}. {}: {} ({} transaksi)",
                    i + 1,
                    cat.category,
                    format_rupiah(cat.total),
                    cat.count
                ));
            }
        }
        ReportKind::Recent => {
            let transactions = db.transactions_between(from, to, plan.entry_type, RECENT_LIMIT)?;
            lines.push(format!("Transaksi terbaru {}:", period));
            if transactions.is_empty() {
                lines.push("- Tidak ada data".to_string());
            }
            for tx in &transactions {
                lines.push(format!("- {}", render_transaction(tx)));
            }
        }
        ReportKind::Daily => {
            let days = db.daily_totals(from, to)?;
            lines.push(format!("Rincian harian {}:", period));
            if days.is_empty() {
                lines.push("- Tidak ada data".to_string());
            }
            for day in &days {
                let detail = match plan.entry_type {
                    Some(EntryType::Income) => format!("masuk {}", format_rupiah(day.income)),
                    Some(EntryType::Expense) => format!("keluar {}", format_rupiah(day.expense)),
                    None => format!(
                        "masuk {}, keluar {}",
                        format_rupiah(day.income),
                        format_rupiah(day.expense)
                    ),
                };
                lines.push(format!("- {}: {} ({} transaksi)", day.date, detail, day.count));
            }
        }
        ReportKind::Largest => {
            let kind = plan.entry_type.unwrap_or(EntryType::Expense);
            lines.push(format!("{} terbesar {}:", capitalize(kind_label(kind)), period));
            match db.largest_transaction(kind, from, to)? {
                Some(tx) => lines.push(format!("- {}", render_transaction(&tx))),
                None => lines.push("- Tidak ada data".to_string()),
            }
        }
    }

    Ok(lines.join("\n"))
}

fn kind_label(kind: EntryType) -> &'static str {
    match kind {
        EntryType::Income => "pemasukan",
        EntryType::Expense => "pengeluaran",
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
