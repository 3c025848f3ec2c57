//! Prompt templates for the chat assistant
//!
//! Prompts are loaded with a two-layer resolution:
//! 1. Check for an override file in the override directory
//!    (`JJM_PROMPTS_DIR`, else ~/.local/share/jjm/prompts/overrides/)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Each file carries YAML frontmatter followed by `# System` and `# User`
//! sections. Sections support `{{var}}` substitution and
//! `{{#if var}}...{{/if}}` blocks that vanish when `var` is empty.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Environment variable pointing at a prompt override directory
pub const PROMPTS_DIR_ENV: &str = "JJM_PROMPTS_DIR";

/// Embedded default prompts (compiled into binary)
mod defaults {
    pub const CHAT_PERSONA: &str = include_str!("../../../prompts/chat_persona.md");
    pub const PLAN_REPORT: &str = include_str!("../../../prompts/plan_report.md");
    pub const NARRATE_REPORT: &str = include_str!("../../../prompts/narrate_report.md");
}

/// Known prompt IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    /// The "JJ" persona answering with the financial context block
    ChatPersona,
    /// Asks the model to choose one allow-listed report
    PlanReport,
    /// Turns report rows into a conversational answer
    NarrateReport,
}

impl PromptId {
    /// Get the string identifier for this prompt
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChatPersona => "chat_persona",
            Self::PlanReport => "plan_report",
            Self::NarrateReport => "narrate_report",
        }
    }

    /// Get all known prompt IDs
    pub fn all() -> &'static [PromptId] {
        &[Self::ChatPersona, Self::PlanReport, Self::NarrateReport]
    }

    fn default_content(&self) -> &'static str {
        match self {
            Self::ChatPersona => defaults::CHAT_PERSONA,
            Self::PlanReport => defaults::PLAN_REPORT,
            Self::NarrateReport => defaults::NARRATE_REPORT,
        }
    }
}

/// Prompt frontmatter metadata
#[derive(Debug, Clone, Deserialize)]
pub struct PromptMetadata {
    pub id: String,
    pub version: u32,
    /// Free-form label (chat, planning, narration)
    pub task_type: String,
}

/// A loaded prompt with metadata and content
#[derive(Debug, Clone)]
pub struct Prompt {
    pub metadata: PromptMetadata,
    /// The prompt body (system + user sections)
    pub content: String,
    /// Whether this came from an override file
    pub is_override: bool,
}

impl Prompt {
    pub fn system_section(&self) -> Option<&str> {
        extract_section(&self.content, "# System")
    }

    pub fn user_section(&self) -> Option<&str> {
        extract_section(&self.content, "# User")
    }

    /// Render the system section. Errors if the prompt has none.
    pub fn render_system(&self, vars: &HashMap<&str, &str>) -> Result<String> {
        let section = self.system_section().ok_or_else(|| {
            Error::Prompt(format!("{} has no # System section", self.metadata.id))
        })?;
        Ok(render_template(section, vars))
    }

    /// Render the user section, or the whole body when there is no user section
    pub fn render_user(&self, vars: &HashMap<&str, &str>) -> String {
        render_template(self.user_section().unwrap_or(&self.content), vars)
    }
}

/// Prompt library with override resolution and a parse cache
pub struct PromptLibrary {
    override_dir: Option<PathBuf>,
    cache: RwLock<HashMap<PromptId, Prompt>>,
}

impl PromptLibrary {
    /// Use `JJM_PROMPTS_DIR` if set, else the platform data directory
    pub fn new() -> Self {
        let override_dir = std::env::var(PROMPTS_DIR_ENV)
            .ok()
            .filter(|d| !d.is_empty())
            .map(PathBuf::from)
            .or_else(default_prompts_dir);
        Self {
            override_dir,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_override_dir(path: PathBuf) -> Self {
        Self {
            override_dir: Some(path),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// No override directory (embedded only)
    pub fn embedded_only() -> Self {
        Self {
            override_dir: None,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Get a prompt by ID, loading from override or default
    pub fn get(&self, id: PromptId) -> Result<Prompt> {
        if let Some(prompt) = self
            .cache
            .read()
            .ok()
            .and_then(|cache| cache.get(&id).cloned())
        {
            return Ok(prompt);
        }

        let prompt = self.load(id)?;
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(id, prompt.clone());
        }
        Ok(prompt)
    }

    fn load(&self, id: PromptId) -> Result<Prompt> {
        if let Some(override_path) = self.override_path(id) {
            if override_path.exists() {
                let content = fs::read_to_string(&override_path).map_err(|e| {
                    Error::Prompt(format!("Failed to read prompt override: {}", e))
                })?;
                let (metadata, body) = parse_prompt(&content)?;
                debug!(prompt = id.as_str(), path = %override_path.display(), "Using prompt override");
                return Ok(Prompt {
                    metadata,
                    content: body,
                    is_override: true,
                });
            }
        }

        let (metadata, body) = parse_prompt(id.default_content())?;
        Ok(Prompt {
            metadata,
            content: body,
            is_override: false,
        })
    }

    fn override_path(&self, id: PromptId) -> Option<PathBuf> {
        self.override_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.md", id.as_str())))
    }

    pub fn override_dir(&self) -> Option<&PathBuf> {
        self.override_dir.as_ref()
    }

    /// Drop cached prompts so edited override files are re-read
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.write() {
            cache.clear();
        }
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::new()
    }
}

/// Default prompts override directory
pub fn default_prompts_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("jjm").join("prompts").join("overrides"))
}

/// Parse a prompt file into metadata and body
fn parse_prompt(content: &str) -> Result<(PromptMetadata, String)> {
    let content = content.trim();

    if !content.starts_with("---") {
        return Err(Error::Prompt(
            "Prompt must start with YAML frontmatter (---)".into(),
        ));
    }

    let rest = &content[3..];
    let end = rest.find("---").ok_or_else(|| {
        Error::Prompt("Prompt frontmatter not closed (missing second ---)".into())
    })?;

    let frontmatter = rest[..end].trim();
    let body = rest[end + 3..].trim();

    let metadata: PromptMetadata = serde_yaml::from_str(frontmatter)
        .map_err(|e| Error::Prompt(format!("Invalid prompt frontmatter: {}", e)))?;

    Ok((metadata, body.to_string()))
}

fn extract_section<'a>(content: &'a str, header: &str) -> Option<&'a str> {
    let start = content.find(header)?;
    let after_header = &content[start + header.len()..];
    let end = after_header.find("\n# ").unwrap_or(after_header.len());
    Some(after_header[..end].trim())
}

/// Resolve conditionals, then substitute variables.
///
/// Conditionals go first so substituted values (user notes, context text)
/// are never interpreted as template syntax.
fn render_template(template: &str, vars: &HashMap<&str, &str>) -> String {
    let mut result = resolve_conditionals(template, vars);
    for (key, value) in vars {
        let pattern = format!("{{{{{}}}}}", key);
        result = result.replace(&pattern, value);
    }
    result.trim().to_string()
}

/// Keep `{{#if var}}` blocks whose variable is non-empty, drop the rest
fn resolve_conditionals(content: &str, vars: &HashMap<&str, &str>) -> String {
    let mut result = content.to_string();

    while let Some(if_start) = result.find("{{#if ") {
        let var_start = if_start + 6;
        let Some(var_end) = result[var_start..].find("}}") else {
            break;
        };
        let var_name = result[var_start..var_start + var_end].trim();
        let block_start = var_start + var_end + 2;
        let Some(endif_pos) = result[block_start..].find("{{/if}}") else {
            break;
        };
        let block_content = &result[block_start..block_start + endif_pos];
        let full_end = block_start + endif_pos + 7;

        let keep = vars.get(var_name).is_some_and(|v| !v.trim().is_empty());
        result = if keep {
            format!(
                "{}{}{}",
                &result[..if_start],
                block_content,
                &result[full_end..]
            )
        } else {
            format!("{}{}", &result[..if_start], &result[full_end..])
        };
    }

    result
}
