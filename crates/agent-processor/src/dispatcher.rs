//! Tool Dispatcher + Computer-Tool Degrader (`spec.md` §4.6). Classifies
//! each content block the LLM returned and routes it, producing
//! tool-result blocks; counts consecutive computer-tool failures and
//! degrades the task once the threshold is crossed. Grounded on
//! `gateway/src/runtime/tools.rs`'s per-block classify-and-route loop.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::collaborators::{ComputerToolHandler, MessageStore, TaskService, TaskStore};
use crate::config::ProcessorConfig;
use crate::error::Result;
use crate::events::ProcessorEvent;
use crate::lifecycle::EphemeralStore;
use crate::model::{ContentBlock, CreateTaskDto, CreatedBy, NewMessage, Role, Task, TaskPatch};

/// Outcome of one dispatch sweep: whether the iteration loop should
/// continue scheduling turns for this task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    StillRunning,
    Terminated,
}

fn uppercase_opt(v: Option<&Value>) -> Option<String> {
    v.and_then(Value::as_str).map(|s| s.to_ascii_uppercase())
}

fn parse_scheduled_for(input: &Value) -> Option<DateTime<Utc>> {
    input
        .get("scheduledFor")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn build_create_task_dto(input: &Value, parent: &Task) -> CreateTaskDto {
    let mut extra = input.clone();
    if let Value::Object(map) = &mut extra {
        for key in ["type", "priority", "scheduledFor", "description"] {
            map.remove(key);
        }
    }
    CreateTaskDto {
        task_type: uppercase_opt(input.get("type")),
        priority: uppercase_opt(input.get("priority")),
        scheduled_for: parse_scheduled_for(input),
        description: input
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        created_by: CreatedBy::Assistant,
        model: parent.model.clone(),
        extra,
    }
}

/// Route every content block in an assistant response, in order.
#[allow(clippy::too_many_arguments)]
pub async fn dispatch(
    cfg: &ProcessorConfig,
    message_store: &dyn MessageStore,
    task_store: &dyn TaskStore,
    task_service: &dyn TaskService,
    computer_handler: &dyn ComputerToolHandler,
    ephemeral: &EphemeralStore,
    task: &Task,
    blocks: &[ContentBlock],
) -> Result<DispatchOutcome> {
    let mut tool_results: Vec<ContentBlock> = Vec::new();
    let mut set_status: Option<String> = None;

    for block in blocks {
        let Some(tool_use) = block.as_tool_use() else {
            continue;
        };

        if tool_use.is_computer_tool() {
            let result = computer_handler.handle_computer_tool_use(tool_use).await;
            let is_error = result.is_error.unwrap_or(false);
            tool_results.push(ContentBlock::ToolResult(result));

            if is_error {
                let failures = ephemeral.increment_computer_tool_failures(&task.id);
                ProcessorEvent::ComputerToolFailure {
                    task_id: task.id.clone(),
                    consecutive_failures: failures,
                }
                .emit();

                if failures >= cfg.computer_tool_failure_threshold
                    && !ephemeral.is_computer_tools_disabled(&task.id)
                {
                    ephemeral.set_computer_tools_disabled(&task.id, true);

                    if !tool_results.is_empty() {
                        message_store
                            .create(NewMessage {
                                task_id: task.id.clone(),
                                role: Role::User,
                                content: std::mem::take(&mut tool_results),
                            })
                            .await?;
                    }

                    task_store
                        .update(
                            &task.id,
                            TaskPatch::needs_help(
                                "Desktop automation is unavailable after repeated \
                                 tool failures; human assistance is required.",
                            ),
                        )
                        .await?;

                    ProcessorEvent::ComputerToolDegraded {
                        task_id: task.id.clone(),
                    }
                    .emit();
                    ProcessorEvent::TaskTerminal {
                        task_id: task.id.clone(),
                        status: "needs_help".into(),
                    }
                    .emit();

                    return Ok(DispatchOutcome::Terminated);
                }
            }
            continue;
        }

        if tool_use.is_create_task() {
            let dto = build_create_task_dto(&tool_use.input, task);
            task_service.create_task(dto).await?;
            tool_results.push(ContentBlock::ToolResult(crate::model::ToolResult::text(
                tool_use.id.clone(),
                "The task has been created",
                false,
            )));
            continue;
        }

        if tool_use.is_set_task_status() {
            let status = tool_use
                .input
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let description = tool_use
                .input
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let is_error = status == "failed";
            tool_results.push(ContentBlock::ToolResult(crate::model::ToolResult::text(
                tool_use.id.clone(),
                description,
                is_error,
            )));
            set_status = Some(status);
            continue;
        }
    }

    if !tool_results.is_empty() {
        message_store
            .create(NewMessage {
                task_id: task.id.clone(),
                role: Role::User,
                content: tool_results,
            })
            .await?;
    }

    match set_status.as_deref() {
        Some("completed") => {
            task_store
                .update(&task.id, TaskPatch::completed())
                .await?;
            ProcessorEvent::TaskTerminal {
                task_id: task.id.clone(),
                status: "completed".into(),
            }
            .emit();
            Ok(DispatchOutcome::Terminated)
        }
        Some("needs_help") => {
            task_store
                .update(
                    &task.id,
                    TaskPatch::status(crate::model::TaskStatus::NeedsHelp),
                )
                .await?;
            ProcessorEvent::TaskTerminal {
                task_id: task.id.clone(),
                status: "needs_help".into(),
            }
            .emit();
            Ok(DispatchOutcome::Terminated)
        }
        // `"failed"` produces an error-marked tool result but does not
        // transition the task (spec.md §9 Open Question (c), preserved).
        _ => Ok(DispatchOutcome::StillRunning),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ToolResult, ToolUse};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    struct FakeMessages(Mutex<Vec<NewMessage>>);
    #[async_trait]
    impl MessageStore for FakeMessages {
        async fn find_unsummarized(&self, _task_id: &str) -> Result<Vec<crate::model::Message>> {
            Ok(vec![])
        }
        async fn create(&self, new_message: NewMessage) -> Result<crate::model::Message> {
            self.0.lock().push(new_message.clone());
            Ok(crate::model::Message {
                id: "m".into(),
                role: new_message.role,
                content: new_message.content,
                created_at: Utc::now(),
                summary_id: None,
                synthetic: false,
            })
        }
        async fn attach_summary(
            &self,
            _task_id: &str,
            _summary_id: &str,
            _message_ids: &[String],
        ) -> Result<()> {
            Ok(())
        }
    }

    struct FakeTasks(Mutex<Task>);
    #[async_trait]
    impl TaskStore for FakeTasks {
        async fn find_by_id(&self, _id: &str) -> Result<Option<Task>> {
            Ok(Some(self.0.lock().clone()))
        }
        async fn update(&self, _id: &str, patch: TaskPatch) -> Result<Task> {
            let mut t = self.0.lock();
            if let Some(s) = patch.status {
                t.status = s;
            }
            if let Some(c) = patch.completed_at {
                t.completed_at = Some(c);
            }
            if let Some(e) = patch.error {
                t.error = Some(e);
            }
            Ok(t.clone())
        }
        async fn create(&self, _dto: CreateTaskDto) -> Result<Task> {
            unimplemented!()
        }
    }

    struct FakeTaskService(Mutex<Vec<CreateTaskDto>>);
    #[async_trait]
    impl TaskService for FakeTaskService {
        async fn create_task(&self, dto: CreateTaskDto) -> Result<Task> {
            self.0.lock().push(dto);
            Ok(Task {
                id: "child".into(),
                status: crate::model::TaskStatus::Pending,
                model: Value::Null,
                completed_at: None,
                error: None,
            })
        }
    }

    struct FixedComputerHandler(bool);
    #[async_trait]
    impl ComputerToolHandler for FixedComputerHandler {
        async fn handle_computer_tool_use(&self, block: &ToolUse) -> ToolResult {
            ToolResult::text(block.id.clone(), "result", self.0)
        }
    }

    fn task() -> Task {
        Task {
            id: "t1".into(),
            status: crate::model::TaskStatus::Running,
            model: json!({"provider": "openai", "name": "gpt-4.1"}),
            completed_at: None,
            error: None,
        }
    }

    fn tool_use_block(id: &str, name: &str, input: Value) -> ContentBlock {
        ContentBlock::ToolUse(ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        })
    }

    #[tokio::test]
    async fn set_status_completed_transitions_task() {
        let cfg = ProcessorConfig::default();
        let messages = FakeMessages(Mutex::new(vec![]));
        let tasks = FakeTasks(Mutex::new(task()));
        let task_service = FakeTaskService(Mutex::new(vec![]));
        let handler = FixedComputerHandler(false);
        let ephemeral = EphemeralStore::new();

        let blocks = vec![
            ContentBlock::text("done"),
            tool_use_block(
                "1",
                "set_task_status",
                json!({"status": "completed", "description": "done"}),
            ),
        ];

        let outcome = dispatch(
            &cfg,
            &messages,
            &tasks,
            &task_service,
            &handler,
            &ephemeral,
            &task(),
            &blocks,
        )
        .await
        .unwrap();

        assert_eq!(outcome, DispatchOutcome::Terminated);
        assert_eq!(tasks.0.lock().status, crate::model::TaskStatus::Completed);
        assert!(tasks.0.lock().completed_at.is_some());
        assert_eq!(messages.0.lock().len(), 1);
    }

    #[tokio::test]
    async fn set_status_failed_marks_error_but_does_not_transition() {
        let cfg = ProcessorConfig::default();
        let messages = FakeMessages(Mutex::new(vec![]));
        let tasks = FakeTasks(Mutex::new(task()));
        let task_service = FakeTaskService(Mutex::new(vec![]));
        let handler = FixedComputerHandler(false);
        let ephemeral = EphemeralStore::new();

        let blocks = vec![tool_use_block(
            "1",
            "set_task_status",
            json!({"status": "failed", "description": "could not do it"}),
        )];

        let outcome = dispatch(
            &cfg,
            &messages,
            &tasks,
            &task_service,
            &handler,
            &ephemeral,
            &task(),
            &blocks,
        )
        .await
        .unwrap();

        assert_eq!(outcome, DispatchOutcome::StillRunning);
        assert_eq!(tasks.0.lock().status, crate::model::TaskStatus::Running);
    }

    #[tokio::test]
    async fn computer_tool_degrades_after_threshold_and_skips_remaining_blocks() {
        let cfg = ProcessorConfig::default();
        let messages = FakeMessages(Mutex::new(vec![]));
        let tasks = FakeTasks(Mutex::new(task()));
        let task_service = FakeTaskService(Mutex::new(vec![]));
        let handler = FixedComputerHandler(true);
        let ephemeral = EphemeralStore::new();
        ephemeral.increment_computer_tool_failures("t1"); // one prior failure

        let blocks = vec![
            tool_use_block("1", "computer_click", json!({})),
            // this block must never be dispatched once degradation triggers
            tool_use_block(
                "2",
                "set_task_status",
                json!({"status": "completed", "description": "done"}),
            ),
        ];

        let outcome = dispatch(
            &cfg,
            &messages,
            &tasks,
            &task_service,
            &handler,
            &ephemeral,
            &task(),
            &blocks,
        )
        .await
        .unwrap();

        assert_eq!(outcome, DispatchOutcome::Terminated);
        assert_eq!(tasks.0.lock().status, crate::model::TaskStatus::NeedsHelp);
        assert!(ephemeral.is_computer_tools_disabled("t1"));
    }

    #[tokio::test]
    async fn create_task_uppercases_and_delegates() {
        let cfg = ProcessorConfig::default();
        let messages = FakeMessages(Mutex::new(vec![]));
        let tasks = FakeTasks(Mutex::new(task()));
        let task_service = FakeTaskService(Mutex::new(vec![]));
        let handler = FixedComputerHandler(false);
        let ephemeral = EphemeralStore::new();

        let blocks = vec![tool_use_block(
            "1",
            "create_task",
            json!({"type": "follow_up", "priority": "high", "description": "check mail"}),
        )];

        dispatch(
            &cfg,
            &messages,
            &tasks,
            &task_service,
            &handler,
            &ephemeral,
            &task(),
            &blocks,
        )
        .await
        .unwrap();

        let created = task_service.0.lock();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].task_type.as_deref(), Some("FOLLOW_UP"));
        assert_eq!(created[0].priority.as_deref(), Some("HIGH"));
        assert_eq!(created[0].created_by, CreatedBy::Assistant);
    }
}
