//! Iteration Loop (`spec.md` §4.8). One iteration drains one LLM turn,
//! persists messages, runs the dispatcher, updates task status, and
//! schedules the next turn non-blockingly. Grounded on
//! `gateway/src/runtime/turn.rs::run_turn`'s single-pass-then-yield shape.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::assembler;
use crate::dispatcher::{self, DispatchOutcome};
use crate::error::ProcessorError;
use crate::events::ProcessorEvent;
use crate::model::{NewMessage, Role, TaskPatch, TaskStatus};
use crate::retry::{self, ErrorClass, RetryDecision};
use crate::summarizer;
use crate::AgentProcessor;

/// What the loop driver should do after one iteration.
pub(crate) enum IterationOutcome {
    ScheduleNext,
    RetryAfter(Duration),
    Stop,
}

/// Run the loop for one task until it stops (terminal status, failure,
/// retries exhausted, or the singleton no longer owns the task).
pub(crate) async fn run_loop(processor: Arc<AgentProcessor>, task_id: String, root: CancellationToken) {
    loop {
        let iter_token = root.child_token();
        let outcome = run_one_iteration(&processor, &task_id, iter_token).await;
        match outcome {
            IterationOutcome::ScheduleNext => {
                // Yield so lifecycle events delivered concurrently get a
                // chance to run between iterations (spec.md §4.8/§5).
                tokio::task::yield_now().await;
            }
            IterationOutcome::RetryAfter(delay) => {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = root.cancelled() => { break; }
                }
            }
            IterationOutcome::Stop => break,
        }
    }
}

async fn run_one_iteration(
    processor: &Arc<AgentProcessor>,
    task_id: &str,
    cancel: CancellationToken,
) -> IterationOutcome {
    ProcessorEvent::IterationStarted {
        task_id: task_id.to_string(),
    }
    .emit();

    // Step 1: fetch task; stop if not RUNNING (P3: no provider call, no
    // persisted messages).
    let task = match processor.task_store.find_by_id(task_id).await {
        Ok(Some(t)) => t,
        Ok(None) => {
            processor.singleton.clear_if_current(task_id);
            processor.ephemeral.clear(task_id);
            return IterationOutcome::Stop;
        }
        Err(e) => {
            tracing::error!(task_id, error = %e, "task lookup failed");
            processor.singleton.clear_if_current(task_id);
            processor.ephemeral.clear(task_id);
            return IterationOutcome::Stop;
        }
    };

    if task.status != TaskStatus::Running {
        processor.singleton.clear_if_current(task_id);
        processor.ephemeral.clear(task_id);
        return IterationOutcome::Stop;
    }

    // Step 3: assemble conversation.
    let computer_tools_disabled = processor.ephemeral.is_computer_tools_disabled(task_id);
    let conversation = match assembler::assemble(
        processor.message_store.as_ref(),
        processor.summary_store.as_ref(),
        task_id,
        computer_tools_disabled,
    )
    .await
    {
        Ok(c) => c,
        Err(e) => {
            return fail_task(processor, task_id, &e).await;
        }
    };

    // Step 4: resolve model descriptor.
    let descriptor = crate::descriptor::resolve(&task.model);

    // Step 5: resolve provider.
    let provider = match processor.providers.resolve(descriptor.provider) {
        Some(p) => p,
        None => {
            let _ = processor
                .task_store
                .update(
                    task_id,
                    TaskPatch::failed(format!("no service for provider {}", descriptor.provider)),
                )
                .await;
            terminal(processor, task_id, "failed");
            return IterationOutcome::Stop;
        }
    };

    // Step 6: invoke generate_message with tools enabled.
    let result = provider
        .generate_message(
            "", // system prompt assembly is an out-of-scope collaborator concern
            &conversation,
            &descriptor.name,
            true,
            cancel.clone(),
        )
        .await;

    if !processor.singleton.owns(task_id) {
        // A concurrent onCancel/stopProcessing already wound this task
        // down (spec.md §8 scenario 6) — do not overwrite task status or
        // schedule another iteration.
        return IterationOutcome::Stop;
    }

    let response = match result {
        Ok(r) => r,
        Err(e) => return handle_iteration_error(processor, task_id, e).await,
    };

    // Step 7: zero content blocks is a failure.
    if response.content_blocks.is_empty() {
        return fail_task(processor, task_id, &ProcessorError::EmptyResponse).await;
    }

    // Step 8: persist assistant message.
    let persisted = processor
        .message_store
        .create(NewMessage {
            task_id: task_id.to_string(),
            role: Role::Assistant,
            content: response.content_blocks.clone(),
        })
        .await;
    if let Err(e) = persisted {
        return fail_task(processor, task_id, &e).await;
    }

    // Step 9: summarization policy (failures are swallowed inside).
    if let Err(e) = summarizer::maybe_summarize(
        &processor.config,
        processor.message_store.as_ref(),
        processor.summary_store.as_ref(),
        provider.as_ref(),
        task_id,
        &descriptor.name,
        descriptor.context_window,
        &conversation,
        response.token_usage.total_tokens,
        cancel.clone(),
    )
    .await
    {
        tracing::warn!(task_id, error = %e, "summarizer returned an error unexpectedly");
    }

    // Step 10: dispatch tool use blocks.
    let dispatch_result = dispatcher::dispatch(
        &processor.config,
        processor.message_store.as_ref(),
        processor.task_store.as_ref(),
        processor.task_service.as_ref(),
        processor.computer_tool_handler.as_ref(),
        &processor.ephemeral,
        &task,
        &response.content_blocks,
    )
    .await;

    match dispatch_result {
        Ok(DispatchOutcome::Terminated) => {
            processor.ephemeral.clear(task_id);
            processor.singleton.clear_if_current(task_id);
            IterationOutcome::Stop
        }
        Ok(DispatchOutcome::StillRunning) => {
            ProcessorEvent::IterationFinished {
                task_id: task_id.to_string(),
                still_running: true,
            }
            .emit();
            if processor.singleton.owns(task_id) {
                IterationOutcome::ScheduleNext
            } else {
                IterationOutcome::Stop
            }
        }
        Err(e) => fail_task(processor, task_id, &e).await,
    }
}

async fn fail_task(
    processor: &Arc<AgentProcessor>,
    task_id: &str,
    err: &ProcessorError,
) -> IterationOutcome {
    let message = retry::failed_error_message(&processor.config, err);
    let _ = processor
        .task_store
        .update(task_id, TaskPatch::failed(message))
        .await;
    terminal(processor, task_id, "failed");
    IterationOutcome::Stop
}

fn terminal(processor: &Arc<AgentProcessor>, task_id: &str, status: &str) {
    processor.ephemeral.clear(task_id);
    processor.singleton.clear_if_current(task_id);
    ProcessorEvent::TaskTerminal {
        task_id: task_id.to_string(),
        status: status.to_string(),
    }
    .emit();
}

async fn handle_iteration_error(
    processor: &Arc<AgentProcessor>,
    task_id: &str,
    err: ProcessorError,
) -> IterationOutcome {
    match retry::classify(&err) {
        ErrorClass::Interrupt => {
            let retry_count = processor.ephemeral.increment_retry(task_id);
            match retry::decide_retry(&processor.config, retry_count) {
                RetryDecision::RetryAfter(delay) => {
                    ProcessorEvent::InterruptRetryScheduled {
                        task_id: task_id.to_string(),
                        retry_count,
                        delay_ms: delay.as_millis() as u64,
                    }
                    .emit();
                    IterationOutcome::RetryAfter(delay)
                }
                RetryDecision::Exhausted => {
                    ProcessorEvent::InterruptRetriesExhausted {
                        task_id: task_id.to_string(),
                        retry_count,
                    }
                    .emit();
                    let _ = processor
                        .task_store
                        .update(
                            task_id,
                            TaskPatch::needs_help(retry::exhausted_error_message(&processor.config)),
                        )
                        .await;
                    terminal(processor, task_id, "needs_help");
                    IterationOutcome::Stop
                }
            }
        }
        ErrorClass::Other => fail_task(processor, task_id, &err).await,
    }
}
