//! Data model shared by every component of the agent processor.
//!
//! Mirrors the shapes `spec.md` §3 describes. Persistence identity (`id`,
//! `created_at`) is carried on [`Message`]/[`Summary`] even though the
//! distilled spec only mentions it implicitly — a real store needs a key to
//! express "the set of prior message ids" the Summary invariant talks about.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Task
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    NeedsHelp,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::NeedsHelp => "needs_help",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "running" => Ok(TaskStatus::Running),
            "needs_help" => Ok(TaskStatus::NeedsHelp),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

/// Caps `error` at `limit` chars, per `spec.md` §3/§7 ("capped at 500 chars").
pub fn cap_error(message: &str, limit: usize) -> String {
    if message.chars().count() <= limit {
        message.to_string()
    } else {
        message.chars().take(limit).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub status: TaskStatus,
    /// Opaque persisted model field — string, object, or malformed. Coerced
    /// by [`crate::descriptor::resolve`].
    pub model: serde_json::Value,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// Partial update applied via `TaskStore::update`. `None` fields are left
/// untouched; there is no way to express "clear a field" because the core
/// never needs to (it only ever sets `error`/`completed_at`, never unsets).
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(TaskStatus::Failed),
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn needs_help(error: impl Into<String>) -> Self {
        Self {
            status: Some(TaskStatus::NeedsHelp),
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn completed() -> Self {
        Self {
            status: Some(TaskStatus::Completed),
            completed_at: Some(Utc::now()),
            ..Default::default()
        }
    }
}

/// Who created a task — carried by `create_task` dispatch (`spec.md` §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreatedBy {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskDto {
    /// Uppercased `type` from the tool-use input, when present.
    pub task_type: Option<String>,
    /// Uppercased `priority` from the tool-use input, when present.
    pub priority: Option<String>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub created_by: CreatedBy,
    /// The parent task's (coerced) model, carried verbatim so the spawned
    /// task uses the same descriptor.
    pub model: serde_json::Value,
    /// Any remaining fields from the tool-use input, passed through.
    pub extra: serde_json::Value,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message / Content block
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolUse {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

impl ToolUse {
    /// `name` starting with `computer_` denotes a desktop tool (`spec.md` §3).
    pub fn is_computer_tool(&self) -> bool {
        self.name.starts_with("computer_")
    }

    pub fn is_create_task(&self) -> bool {
        self.name == "create_task"
    }

    pub fn is_set_task_status(&self) -> bool {
        self.name == "set_task_status"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_use_id: String,
    /// Ordered text content — the original system's tool results are a
    /// sequence of blocks; this crate only ever produces/consumes text.
    pub content: Vec<String>,
    pub is_error: Option<bool>,
}

impl ToolResult {
    pub fn text(tool_use_id: impl Into<String>, text: impl Into<String>, is_error: bool) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content: vec![text.into()],
            is_error: Some(is_error),
        }
    }

    pub fn joined_text(&self) -> String {
        self.content.join("\n")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse(ToolUse),
    #[serde(rename = "tool_result")]
    ToolResult(ToolResult),
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn as_tool_use(&self) -> Option<&ToolUse> {
        match self {
            ContentBlock::ToolUse(tu) => Some(tu),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Empty for synthetic messages that are never persisted (`spec.md` §4.4).
    pub id: String,
    pub role: Role,
    pub content: Vec<ContentBlock>,
    pub created_at: DateTime<Utc>,
    /// Back-reference to the [`Summary`] that covers this message.
    pub summary_id: Option<String>,
    /// `true` for assembler-generated advisory/summary messages that must
    /// never be passed to `MessageStore::create` or `attach_summary`.
    pub synthetic: bool,
}

impl Message {
    pub fn synthetic_user_text(text: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            role: Role::User,
            content: vec![ContentBlock::text(text)],
            created_at: Utc::now(),
            summary_id: None,
            synthetic: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub task_id: String,
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Summary
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub id: String,
    pub task_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSummary {
    pub task_id: String,
    pub content: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Model descriptor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderTag {
    Anthropic,
    Openai,
    Google,
    Proxy,
}

impl std::fmt::Display for ProviderTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProviderTag::Anthropic => "anthropic",
            ProviderTag::Openai => "openai",
            ProviderTag::Google => "google",
            ProviderTag::Proxy => "proxy",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub provider: ProviderTag,
    pub name: String,
    pub title: String,
    pub context_window: Option<u32>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Provider contract response
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub total_tokens: u32,
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct GenerateMessageResponse {
    pub content_blocks: Vec<ContentBlock>,
    pub token_usage: TokenUsage,
}
