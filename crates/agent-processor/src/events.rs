//! Structured processor events (tag = "event", emitted as a single
//! `tracing::info!` with a JSON field) in the teacher's own structured-event
//! idiom. This is the ambient-observability supplement SPEC_FULL.md §9
//! calls for — the distilled spec only says "log" in a couple of places;
//! the teacher logs every state transition structurally.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum ProcessorEvent {
    IterationStarted {
        task_id: String,
    },
    IterationFinished {
        task_id: String,
        still_running: bool,
    },
    SummarizationAttempted {
        task_id: String,
        total_tokens: u32,
        threshold: u64,
    },
    SummarizationSucceeded {
        task_id: String,
        summary_id: String,
        covered_messages: usize,
    },
    SummarizationFailed {
        task_id: String,
        error: String,
    },
    ComputerToolFailure {
        task_id: String,
        consecutive_failures: u32,
    },
    ComputerToolDegraded {
        task_id: String,
    },
    InterruptRetryScheduled {
        task_id: String,
        retry_count: u32,
        delay_ms: u64,
    },
    InterruptRetriesExhausted {
        task_id: String,
        retry_count: u32,
    },
    TaskTerminal {
        task_id: String,
        status: String,
    },
}

impl ProcessorEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(processor_event = %json, "sa_agent_processor_event");
    }
}
