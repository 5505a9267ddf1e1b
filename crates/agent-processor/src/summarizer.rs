//! Summarizer (`spec.md` §4.5). Decides when to compress history, drives a
//! second LLM call with a summarization system prompt, and attaches the
//! resulting summary to the messages it covered. Grounded on
//! `gateway/src/runtime/compact.rs`'s trigger-then-compact shape.
//!
//! Summarization failures are logged and swallowed (`spec.md` §4.5/§7) —
//! they never propagate to the iteration loop.

use tokio_util::sync::CancellationToken;

use crate::collaborators::{MessageStore, Provider, SummaryStore};
use crate::config::ProcessorConfig;
use crate::error::Result;
use crate::events::ProcessorEvent;
use crate::model::{ContentBlock, Message, NewSummary};

const SUMMARIZATION_SYSTEM_PROMPT: &str =
    "You are compressing the conversation so far into a concise summary \
     that preserves all task-relevant state, decisions, and outstanding \
     steps. Respond with the summary only.";

const SUMMARIZE_INSTRUCTION: &str =
    "Summarize the conversation above. Preserve task-relevant state and \
     outstanding steps.";

/// `true` once `total_tokens` crosses the configured fraction of the
/// model's context window (falling back to `cfg.context_window_fallback`
/// when the descriptor carries none).
pub fn should_summarize(cfg: &ProcessorConfig, context_window: Option<u32>, total_tokens: u32) -> bool {
    let window = context_window.unwrap_or(cfg.context_window_fallback) as f64;
    let threshold = window * cfg.summarization_trigger_ratio;
    (total_tokens as f64) >= threshold
}

pub fn threshold(cfg: &ProcessorConfig, context_window: Option<u32>) -> u64 {
    let window = context_window.unwrap_or(cfg.context_window_fallback) as f64;
    (window * cfg.summarization_trigger_ratio) as u64
}

/// Run the summarization policy for one turn. `turn_messages` is the exact
/// conversation assembled for the turn (`spec.md` §4.4), *not* including the
/// assistant response that was just persisted — that is what "the same
/// message list" in §4.5 step 1 refers to, and what gets `attachSummary`'d.
#[allow(clippy::too_many_arguments)]
pub async fn maybe_summarize(
    cfg: &ProcessorConfig,
    message_store: &dyn MessageStore,
    summary_store: &dyn SummaryStore,
    provider: &dyn Provider,
    task_id: &str,
    model_name: &str,
    context_window: Option<u32>,
    turn_messages: &[Message],
    total_tokens: u32,
    cancel: CancellationToken,
) -> Result<()> {
    if !should_summarize(cfg, context_window, total_tokens) {
        return Ok(());
    }

    ProcessorEvent::SummarizationAttempted {
        task_id: task_id.to_string(),
        total_tokens,
        threshold: threshold(cfg, context_window),
    }
    .emit();

    let mut messages = turn_messages.to_vec();
    messages.push(Message::synthetic_user_text(SUMMARIZE_INSTRUCTION));

    let response = match provider
        .generate_message(
            SUMMARIZATION_SYSTEM_PROMPT,
            &messages,
            model_name,
            false,
            cancel,
        )
        .await
    {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(task_id, error = %e, "summarization failed, swallowing");
            ProcessorEvent::SummarizationFailed {
                task_id: task_id.to_string(),
                error: e.to_string(),
            }
            .emit();
            return Ok(());
        }
    };

    let body = response
        .content_blocks
        .iter()
        .filter_map(ContentBlock::as_text)
        .collect::<Vec<_>>()
        .join("\n");

    let summary = match summary_store
        .create(NewSummary {
            task_id: task_id.to_string(),
            content: body,
        })
        .await
    {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(task_id, error = %e, "summary persistence failed, swallowing");
            ProcessorEvent::SummarizationFailed {
                task_id: task_id.to_string(),
                error: e.to_string(),
            }
            .emit();
            return Ok(());
        }
    };

    let message_ids: Vec<String> = turn_messages
        .iter()
        .filter(|m| !m.synthetic)
        .map(|m| m.id.clone())
        .collect();

    if let Err(e) = message_store
        .attach_summary(task_id, &summary.id, &message_ids)
        .await
    {
        tracing::warn!(task_id, error = %e, "attach_summary failed, swallowing");
        ProcessorEvent::SummarizationFailed {
            task_id: task_id.to_string(),
            error: e.to_string(),
        }
        .emit();
        return Ok(());
    }

    ProcessorEvent::SummarizationSucceeded {
        task_id: task_id.to_string(),
        summary_id: summary.id,
        covered_messages: message_ids.len(),
    }
    .emit();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_threshold_does_not_trigger() {
        let cfg = ProcessorConfig::default();
        assert!(!should_summarize(&cfg, Some(200_000), 100_000));
    }

    #[test]
    fn at_or_above_threshold_triggers() {
        let cfg = ProcessorConfig::default();
        assert!(should_summarize(&cfg, Some(200_000), 150_000));
        assert!(should_summarize(&cfg, Some(200_000), 160_000));
    }

    #[test]
    fn missing_context_window_uses_fallback() {
        let cfg = ProcessorConfig::default();
        // fallback 200000 * 0.75 = 150000
        assert!(!should_summarize(&cfg, None, 149_999));
        assert!(should_summarize(&cfg, None, 150_000));
    }
}
