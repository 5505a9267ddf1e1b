//! Trait seams for every external collaborator named in `spec.md` §1/§6.
//! Concrete implementations (a relational store, concrete provider HTTP
//! clients, the desktop tool backend, input capture) live outside this
//! crate — it is "out of scope, referenced only by interface". Shape
//! follows `sa_providers::traits::LlmProvider` (teacher's async-trait,
//! `Send + Sync` convention).

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::model::{
    CreateTaskDto, GenerateMessageResponse, Message, NewMessage, NewSummary, Summary, Task,
    TaskPatch, ToolUse,
};

/// Task store (`spec.md` §6: `findById`, `update`, `create`).
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Task>>;
    async fn update(&self, id: &str, patch: TaskPatch) -> Result<Task>;
    async fn create(&self, dto: CreateTaskDto) -> Result<Task>;
}

/// Message store (`spec.md` §6: `findUnsummarized`, `create`, `attachSummary`).
///
/// `find_unsummarized` must return messages ordered by creation time — the
/// Conversation Assembler (`spec.md` §4.4) relies on that ordering and does
/// not re-sort.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn find_unsummarized(&self, task_id: &str) -> Result<Vec<Message>>;
    async fn create(&self, new_message: NewMessage) -> Result<Message>;
    async fn attach_summary(
        &self,
        task_id: &str,
        summary_id: &str,
        message_ids: &[String],
    ) -> Result<()>;
}

/// Summary store (`spec.md` §6: `findLatest`, `create`).
#[async_trait]
pub trait SummaryStore: Send + Sync {
    async fn find_latest(&self, task_id: &str) -> Result<Option<Summary>>;
    async fn create(&self, new_summary: NewSummary) -> Result<Summary>;
}

/// The provider contract from `spec.md` §4.2. Deliberately distinct from
/// `sa_providers::traits::LlmProvider` (the teacher's richer chat-completion
/// trait): this is the narrower generate-message shape the spec defines,
/// normalizing whatever concrete HTTP client sits behind it.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn generate_message(
        &self,
        system_prompt: &str,
        messages: &[Message],
        model_name: &str,
        tools_enabled: bool,
        cancel: CancellationToken,
    ) -> Result<GenerateMessageResponse>;
}

/// Input-capture collaborator during user takeover (`spec.md` §6).
#[async_trait]
pub trait InputCapture: Send + Sync {
    async fn start(&self, task_id: &str);
    async fn stop(&self);
}

/// Desktop tool execution backend (`spec.md` §6: `handleComputerToolUse`).
/// The spec's signature also takes a `logger`; this crate uses `tracing`
/// spans instead of threading a logger handle through the call.
#[async_trait]
pub trait ComputerToolHandler: Send + Sync {
    async fn handle_computer_tool_use(&self, block: &ToolUse) -> crate::model::ToolResult;
}

/// Delegation target for the `create_task` control tool (`spec.md` §4.6).
#[async_trait]
pub trait TaskService: Send + Sync {
    async fn create_task(&self, dto: CreateTaskDto) -> Result<Task>;
}
