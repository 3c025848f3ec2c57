//! JJM Core Library
//!
//! Shared functionality for the JJM personal finance tracker:
//! - Database access and migrations (settings, categories, transactions, chat)
//! - PIN rules and seeded defaults
//! - Context assembler rendering the financial summary for the assistant
//! - Market data enrichment (exchange rate, gold, Bitcoin, IHSG)
//! - Allow-listed report plans for report-mode chat
//! - Pluggable completion backends (OpenAI-compatible, mock)
//! - Prompt library for customizable assistant prompts

pub mod ai;
pub mod assistant;
pub mod context;
pub mod db;
pub mod error;
pub mod market;
pub mod models;
pub mod pin;
pub mod prompts;
pub mod report_query;

/// Test utilities including a mock upstream server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{AIBackend, AIClient, MockBackend, OpenAICompatibleBackend};
pub use assistant::{Assistant, AssistantReply, ChatMode, APOLOGY};
pub use context::{format_rupiah, ContextAssembler, FinancialSnapshot, NO_DATA_CONTEXT};
pub use db::{Database, CHAT_HISTORY_LIMIT, DEFAULT_POOL_SIZE};
pub use error::{Error, Result};
pub use market::{MarketClient, MarketConfig, MarketSnapshot};
pub use pin::{is_valid_pin, PinDefaults};
pub use prompts::{Prompt, PromptId, PromptLibrary};
pub use report_query::{parse_plan, run_report, PlanRejection, PlanReply, ReportPlan};
