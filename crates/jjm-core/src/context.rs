//! Context Assembler
//!
//! Runs a fixed battery of aggregate queries and renders them as the
//! Indonesian text block the chat persona answers from:
//! - Current month totals, with deltas against the previous month
//! - Today's summary and itemized transactions
//! - Trailing 7-day summary and per-day breakdown
//! - Top categories by income and expense this month
//! - The 10 most recent transactions
//! - Per-day averages this month, largest expense and income this month
//! - All-time totals and the earliest transaction date
//!
//! If any query fails the whole block degrades to [`NO_DATA_CONTEXT`].

use chrono::{Datelike, Duration, NaiveDate};
use tracing::warn;

use crate::db::Database;
use crate::error::Result;
use crate::models::{CategoryTotal, DailyTotal, EntryType, PeriodSummary, Transaction};

/// Context text used when the store can't be queried
pub const NO_DATA_CONTEXT: &str = "Tidak ada data keuangan tersedia.";

const TOP_CATEGORY_LIMIT: i64 = 5;
const RECENT_LIMIT: i64 = 10;
const TODAY_LIMIT: i64 = 50;

/// First and last day of the month containing `date`
pub fn month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = date.with_day(1).unwrap_or(date);
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    let last = NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.pred_opt())
        .unwrap_or(date);
    (first, last)
}

/// First and last day of the month before the one containing `date`
pub fn previous_month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let (first, _) = month_bounds(date);
    month_bounds(first.pred_opt().unwrap_or(first))
}

/// The 7 days ending with `date`, inclusive
pub fn trailing_week(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    (date - Duration::days(6), date)
}

/// Format an amount as rupiah with `.` thousands separators, e.g. `Rp 25.000`
pub fn format_rupiah(amount: f64) -> String {
    let rounded = amount.round();
    let digits = format!("{:.0}", rounded.abs());

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    if rounded < 0.0 {
        format!("-Rp {}", grouped)
    } else {
        format!("Rp {}", grouped)
    }
}

/// "naik 12.5%" / "turun 3.0%" relative to `previous`; `None` when there's
/// nothing to compare against
pub fn describe_change(previous: f64, current: f64) -> Option<String> {
    if previous == 0.0 {
        return None;
    }
    let pct = (current - previous) / previous * 100.0;
    Some(if pct.abs() < 0.05 {
        "sama".to_string()
    } else if pct > 0.0 {
        format!("naik {:.1}%", pct)
    } else {
        format!("turun {:.1}%", pct.abs())
    })
}

fn entry_label(kind: &str) -> &str {
    match kind.parse::<EntryType>() {
        Ok(EntryType::Income) => "pemasukan",
        Ok(EntryType::Expense) => "pengeluaran",
        Err(_) => kind,
    }
}

/// One line per transaction: `2024-03-10 Coffee (Food): Rp 25.000 [pengeluaran]`
pub fn render_transaction(tx: &Transaction) -> String {
    let category = if tx.category.is_empty() {
        String::new()
    } else {
        format!(" ({})", tx.category)
    };
    format!(
        "{} {}{}: {} [{}]",
        tx.date,
        tx.title,
        category,
        format_rupiah(tx.amount),
        entry_label(&tx.kind)
    )
}

/// Results of the context query battery
#[derive(Debug, Clone)]
pub struct FinancialSnapshot {
    pub today: NaiveDate,
    pub this_month: PeriodSummary,
    pub last_month: PeriodSummary,
    pub today_summary: PeriodSummary,
    pub today_transactions: Vec<Transaction>,
    pub week: PeriodSummary,
    pub week_daily: Vec<DailyTotal>,
    pub top_expense_categories: Vec<CategoryTotal>,
    pub top_income_categories: Vec<CategoryTotal>,
    pub recent: Vec<Transaction>,
    pub largest_expense: Option<Transaction>,
    pub largest_income: Option<Transaction>,
    pub all_time: PeriodSummary,
    pub first_transaction: Option<NaiveDate>,
}

impl FinancialSnapshot {
    /// Days of the current month up to and including today
    pub fn days_elapsed(&self) -> u32 {
        self.today.day()
    }

    pub fn daily_average_expense(&self) -> f64 {
        self.this_month.expense / f64::from(self.days_elapsed())
    }

    pub fn daily_average_income(&self) -> f64 {
        self.this_month.income / f64::from(self.days_elapsed())
    }

    /// Render the context block
    pub fn render(&self) -> String {
        if self.all_time.count == 0 {
            return "Belum ada transaksi yang tercatat.".to_string();
        }

        let mut out = Vec::new();

        out.push(format!(
            "Bulan ini ({}):",
            self.today.format("%m/%Y")
        ));
        out.push(with_change(
            "Pemasukan",
            self.this_month.income,
            self.last_month.income,
        ));
        out.push(with_change(
            "Pengeluaran",
            self.this_month.expense,
            self.last_month.expense,
        ));
        out.push(format!(
            "- Saldo: {}",
            format_rupiah(self.this_month.balance())
        ));
        out.push(format!("- Jumlah transaksi: {}", self.this_month.count));

        out.push(String::new());
        out.push("Bulan lalu:".to_string());
        push_summary(&mut out, &self.last_month);

        out.push(String::new());
        out.push(format!("Hari ini ({}):", self.today));
        if self.today_transactions.is_empty() {
            out.push("- Belum ada transaksi hari ini".to_string());
        } else {
            push_summary(&mut out, &self.today_summary);
            for tx in &self.today_transactions {
                out.push(format!("  - {}", render_transaction(tx)));
            }
        }

        out.push(String::new());
        out.push("7 hari terakhir:".to_string());
        push_summary(&mut out, &self.week);
        for day in &self.week_daily {
            out.push(format!(
                "  - {}: masuk {}, keluar {} ({} transaksi)",
                day.date,
                format_rupiah(day.income),
                format_rupiah(day.expense),
                day.count
            ));
        }

        if !self.top_expense_categories.is_empty() {
            out.push(String::new());
            out.push("Kategori pengeluaran terbesar bulan ini:".to_string());
            push_categories(&mut out, &self.top_expense_categories);
        }
        if !self.top_income_categories.is_empty() {
            out.push(String::new());
            out.push("Sumber pemasukan terbesar bulan ini:".to_string());
            push_categories(&mut out, &self.top_income_categories);
        }

        out.push(String::new());
        out.push(format!("Rata-rata per hari bulan ini ({} hari):", self.days_elapsed()));
        out.push(format!(
            "- Pengeluaran: {}",
            format_rupiah(self.daily_average_expense())
        ));
        out.push(format!(
            "- Pemasukan: {}",
            format_rupiah(self.daily_average_income())
        ));

        if let Some(ref tx) = self.largest_expense {
            out.push(format!("Pengeluaran terbesar bulan ini: {}", render_transaction(tx)));
        }
        if let Some(ref tx) = self.largest_income {
            out.push(format!("Pemasukan terbesar bulan ini: {}", render_transaction(tx)));
        }

        if !self.recent.is_empty() {
            out.push(String::new());
            out.push(format!("{} transaksi terakhir:", self.recent.len()));
            for tx in &self.recent {
                out.push(format!("- {}", render_transaction(tx)));
            }
        }

        out.push(String::new());
        match self.first_transaction {
            Some(first) => out.push(format!("Sepanjang waktu (sejak {}):", first)),
            None => out.push("Sepanjang waktu:".to_string()),
        }
        push_summary(&mut out, &self.all_time);

        out.join("\n")
    }
}

fn with_change(label: &str, current: f64, previous: f64) -> String {
    match describe_change(previous, current) {
        Some(change) => format!(
            "- {}: {} ({} dari bulan lalu)",
            label,
            format_rupiah(current),
            change
        ),
        None => format!("- {}: {}", label, format_rupiah(current)),
    }
}

fn push_summary(out: &mut Vec<String>, summary: &PeriodSummary) {
    out.push(format!("- Pemasukan: {}", format_rupiah(summary.income)));
    out.push(format!("- Pengeluaran: {}", format_rupiah(summary.expense)));
    out.push(format!("- Saldo: {}", format_rupiah(summary.balance())));
    out.push(format!("- Jumlah transaksi: {}", summary.count));
}

fn push_categories(out: &mut Vec<String>, categories: &[CategoryTotal]) {
    for (i, cat) in categories.iter().enumerate() {
        out.push(format!(
            "{}. {}: {} ({} transaksi)",
            i + 1,
            cat.category,
            format_rupiah(cat.total),
            cat.count
        ));
    }
}

/// Builds [`FinancialSnapshot`]s from the database
pub struct ContextAssembler<'a> {
    db: &'a Database,
}

impl<'a> ContextAssembler<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Run every query for the given day
    pub fn snapshot(&self, today: NaiveDate) -> Result<FinancialSnapshot> {
        let (month_start, month_end) = month_bounds(today);
        let (last_start, last_end) = previous_month_bounds(today);
        let (week_start, week_end) = trailing_week(today);

        Ok(FinancialSnapshot {
            today,
            this_month: self.db.summarize_period(month_start, month_end)?,
            last_month: self.db.summarize_period(last_start, last_end)?,
            today_summary: self.db.summarize_period(today, today)?,
            today_transactions: self
                .db
                .transactions_between(today, today, None, TODAY_LIMIT)?,
            week: self.db.summarize_period(week_start, week_end)?,
            week_daily: self.db.daily_totals(week_start, week_end)?,
            top_expense_categories: self.db.top_categories(
                EntryType::Expense,
                month_start,
                month_end,
                TOP_CATEGORY_LIMIT,
            )?,
            top_income_categories: self.db.top_categories(
                EntryType::Income,
                month_start,
                month_end,
                TOP_CATEGORY_LIMIT,
            )?,
            recent: self.db.recent_transactions(RECENT_LIMIT)?,
            largest_expense: self
                .db
                .largest_transaction(EntryType::Expense, month_start, month_end)?,
            largest_income: self
                .db
                .largest_transaction(EntryType::Income, month_start, month_end)?,
            all_time: self.db.summarize_all_time()?,
            first_transaction: self.db.earliest_transaction_date()?,
        })
    }

    /// Rendered context block, or [`NO_DATA_CONTEXT`] if any query fails
    pub fn context_block(&self, today: NaiveDate) -> String {
        match self.snapshot(today) {
            Ok(snapshot) => snapshot.render(),
            Err(e) => {
                warn!(error = %e, "Failed to assemble financial context");
                NO_DATA_CONTEXT.to_string()
            }
        }
    }
}
