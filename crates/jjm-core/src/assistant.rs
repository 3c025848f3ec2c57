//! Chat assistant ("JJ")
//!
//! Produces the reply for one chat turn. Persistence is the caller's job;
//! this module only reads from the store.
//!
//! Two modes:
//! - `Context`: assemble the financial context block (blocking store work on
//!   `spawn_blocking`) while market data is fetched, then one completion call.
//! - `Report`: plan → parse → execute → narrate, strictly in that order.
//!   Rejected or failed plans fall back to a persona-only answer.
//!
//! A turn never fails: when the backend is missing or errors, the reply is
//! [`APOLOGY`] and `debug` carries the cause.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::ai::{AIBackend, AIClient};
use crate::context::{ContextAssembler, NO_DATA_CONTEXT};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::market::MarketClient;
use crate::prompts::{PromptId, PromptLibrary};
use crate::report_query::{parse_plan, run_report, PlanReply};

/// Reply stored and returned when the completion call fails
pub const APOLOGY: &str = "Maaf, terjadi kesalahan.";

/// Environment variable selecting the chat mode
pub const CHAT_MODE_ENV: &str = "JJM_CHAT_MODE";

/// How a chat turn gathers its data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatMode {
    /// Fixed context battery in the system prompt
    #[default]
    Context,
    /// Model picks an allow-listed report
    Report,
}

impl ChatMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Context => "context",
            Self::Report => "report",
        }
    }

    /// Read `JJM_CHAT_MODE`, defaulting to `context`
    pub fn from_env() -> Result<Self> {
        match std::env::var(CHAT_MODE_ENV) {
            Ok(value) if !value.trim().is_empty() => value.parse().map_err(Error::Config),
            _ => Ok(Self::default()),
        }
    }
}

impl std::str::FromStr for ChatMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "context" => Ok(Self::Context),
            "report" => Ok(Self::Report),
            _ => Err(format!("Unknown chat mode: {}", s)),
        }
    }
}

impl std::fmt::Display for ChatMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The outcome of one chat turn
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantReply {
    pub text: String,
    /// Upstream failure detail when `text` is the apology
    pub debug: Option<String>,
    /// Whether the answer was built from store data
    pub grounded: bool,
}

impl AssistantReply {
    fn apology(cause: impl Into<String>) -> Self {
        Self {
            text: APOLOGY.to_string(),
            debug: Some(cause.into()),
            grounded: false,
        }
    }

    pub fn is_apology(&self) -> bool {
        self.text == APOLOGY
    }
}

/// Chat assistant
#[derive(Clone)]
pub struct Assistant {
    db: Database,
    ai: Option<AIClient>,
    market: Option<MarketClient>,
    prompts: Arc<PromptLibrary>,
    mode: ChatMode,
}

impl Assistant {
    pub fn new(db: Database, ai: Option<AIClient>, mode: ChatMode) -> Self {
        Self {
            db,
            ai,
            market: None,
            prompts: Arc::new(PromptLibrary::new()),
            mode,
        }
    }

    /// Enrich context-mode prompts with market data
    pub fn with_market(mut self, market: MarketClient) -> Self {
        self.market = Some(market);
        self
    }

    pub fn with_prompts(mut self, prompts: PromptLibrary) -> Self {
        self.prompts = Arc::new(prompts);
        self
    }

    pub fn mode(&self) -> ChatMode {
        self.mode
    }

    pub fn ai(&self) -> Option<&AIClient> {
        self.ai.as_ref()
    }

    /// Answer one user message. `note` is optional client-supplied context.
    pub async fn reply(
        &self,
        message: &str,
        note: Option<&str>,
        today: NaiveDate,
    ) -> AssistantReply {
        let Some(ai) = self.ai.as_ref() else {
            warn!("Chat requested but no AI backend is configured");
            return AssistantReply::apology("AI backend not configured");
        };

        match self.mode {
            ChatMode::Context => self.reply_with_context(ai, message, note, today).await,
            ChatMode::Report => self.reply_with_report(ai, message, note, today).await,
        }
    }

    async fn reply_with_context(
        &self,
        ai: &AIClient,
        message: &str,
        note: Option<&str>,
        today: NaiveDate,
    ) -> AssistantReply {
        let db = self.db.clone();
        let context_task =
            tokio::task::spawn_blocking(move || ContextAssembler::new(&db).context_block(today));
        let market_task = async {
            match &self.market {
                Some(market) => Some(market.snapshot().await),
                None => None,
            }
        };

        let (context, market) = tokio::join!(context_task, market_task);
        let context = context.unwrap_or_else(|e| {
            warn!(error = %e, "Context task failed");
            NO_DATA_CONTEXT.to_string()
        });
        let market_text = market.map(|m| m.render());
        let grounded = context != NO_DATA_CONTEXT;

        let system = match self.persona_prompt(&context, market_text.as_deref(), note, today) {
            Ok(system) => system,
            Err(e) => return AssistantReply::apology(e.to_string()),
        };

        match ai.complete(&system, message).await {
            Ok(text) => {
                debug!(chars = text.len(), "Chat reply received");
                AssistantReply {
                    text,
                    debug: None,
                    grounded,
                }
            }
            Err(e) => {
                warn!(error = %e, model = ai.model(), "Chat completion failed");
                AssistantReply::apology(e.to_string())
            }
        }
    }

    async fn reply_with_report(
        &self,
        ai: &AIClient,
        message: &str,
        note: Option<&str>,
        today: NaiveDate,
    ) -> AssistantReply {
        match self.grounded_report_answer(ai, message, today).await {
            Ok(Some(text)) => AssistantReply {
                text,
                debug: None,
                grounded: true,
            },
            Ok(None) => self.persona_only(ai, message, note, today).await,
            Err(e) => {
                warn!(error = %e, "Report flow failed, answering without data");
                self.persona_only(ai, message, note, today).await
            }
        }
    }

    /// `Ok(None)` when the model asked for no report or its plan was rejected
    async fn grounded_report_answer(
        &self,
        ai: &AIClient,
        message: &str,
        today: NaiveDate,
    ) -> Result<Option<String>> {
        let today_str = today.to_string();

        let plan_prompt = self.prompts.get(PromptId::PlanReport)?;
        let mut vars = HashMap::new();
        vars.insert("today", today_str.as_str());
        vars.insert("question", message);
        let plan_reply = ai
            .complete(&plan_prompt.render_system(&vars)?, &plan_prompt.render_user(&vars))
            .await?;

        let plan = match parse_plan(&plan_reply) {
            Ok(PlanReply::Report(plan)) => plan,
            Ok(PlanReply::NoReport) => {
                debug!("Planner chose no report");
                return Ok(None);
            }
            Err(rejection) => {
                warn!(reason = %rejection, reply = %plan_reply, "Rejected report plan");
                return Ok(None);
            }
        };

        info!(
            report = plan.kind.as_str(),
            period = plan.period.as_str(),
            "Running report plan"
        );
        let db = self.db.clone();
        let report = tokio::task::spawn_blocking(move || run_report(&db, &plan, today))
            .await
            .map_err(|e| Error::InvalidData(format!("Report task failed: {}", e)))??;

        let narrate_prompt = self.prompts.get(PromptId::NarrateReport)?;
        let mut vars = HashMap::new();
        vars.insert("report", report.as_str());
        vars.insert("question", message);
        let answer = ai
            .complete(
                &narrate_prompt.render_system(&vars)?,
                &narrate_prompt.render_user(&vars),
            )
            .await?;

        Ok(Some(answer))
    }

    /// Persona prompt with no store data
    async fn persona_only(
        &self,
        ai: &AIClient,
        message: &str,
        note: Option<&str>,
        today: NaiveDate,
    ) -> AssistantReply {
        let system = match self.persona_prompt(NO_DATA_CONTEXT, None, note, today) {
            Ok(system) => system,
            Err(e) => return AssistantReply::apology(e.to_string()),
        };
        match ai.complete(&system, message).await {
            Ok(text) => AssistantReply {
                text,
                debug: None,
                grounded: false,
            },
            Err(e) => {
                warn!(error = %e, "Persona-only completion failed");
                AssistantReply::apology(e.to_string())
            }
        }
    }

    fn persona_prompt(
        &self,
        context: &str,
        market: Option<&str>,
        note: Option<&str>,
        today: NaiveDate,
    ) -> Result<String> {
        let prompt = self.prompts.get(PromptId::ChatPersona)?;
        let today_str = today.to_string();
        let mut vars = HashMap::new();
        vars.insert("today", today_str.as_str());
        vars.insert("context", context);
        vars.insert("market", market.unwrap_or(""));
        vars.insert("note", note.unwrap_or(""));
        prompt.render_system(&vars)
    }
}
