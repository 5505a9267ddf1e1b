//! Agent Processor — the single-tenant iterative control loop that drives
//! a desktop-automation task to completion by repeatedly consulting an LLM
//! and executing the tool calls it emits. See `SPEC_FULL.md` for the full
//! requirements this crate implements; `DESIGN.md` for the grounding ledger.

pub mod assembler;
pub mod collaborators;
pub mod config;
pub mod descriptor;
pub mod dispatcher;
pub mod error;
pub mod events;
mod iteration;
pub mod lifecycle;
pub mod model;
pub mod provider;
pub mod retry;
pub mod summarizer;

use std::sync::Arc;

use tracing::instrument;

use collaborators::{ComputerToolHandler, InputCapture, MessageStore, SummaryStore, TaskService, TaskStore};
use config::ProcessorConfig;
use lifecycle::{EphemeralStore, ProcessorSingleton, StartOutcome};
use provider::ProviderRegistry;

/// Ties the iteration loop, provider registry, stores, and lifecycle state
/// into one processor instance (`spec.md` §2 control-flow paragraph).
pub struct AgentProcessor {
    pub config: ProcessorConfig,
    pub task_store: Arc<dyn TaskStore>,
    pub message_store: Arc<dyn MessageStore>,
    pub summary_store: Arc<dyn SummaryStore>,
    pub providers: ProviderRegistry,
    pub input_capture: Arc<dyn InputCapture>,
    pub computer_tool_handler: Arc<dyn ComputerToolHandler>,
    pub task_service: Arc<dyn TaskService>,
    pub singleton: ProcessorSingleton,
    pub ephemeral: EphemeralStore,
}

/// Everything an `AgentProcessor` needs from its host, gathered so
/// construction reads as one call (teacher convention: see
/// `sa_providers::registry::ProviderRegistry::from_config`).
pub struct AgentProcessorDeps {
    pub config: ProcessorConfig,
    pub task_store: Arc<dyn TaskStore>,
    pub message_store: Arc<dyn MessageStore>,
    pub summary_store: Arc<dyn SummaryStore>,
    pub providers: ProviderRegistry,
    pub input_capture: Arc<dyn InputCapture>,
    pub computer_tool_handler: Arc<dyn ComputerToolHandler>,
    pub task_service: Arc<dyn TaskService>,
}

impl AgentProcessor {
    pub fn new(deps: AgentProcessorDeps) -> Arc<Self> {
        Arc::new(Self {
            config: deps.config,
            task_store: deps.task_store,
            message_store: deps.message_store,
            summary_store: deps.summary_store,
            providers: deps.providers,
            input_capture: deps.input_capture,
            computer_tool_handler: deps.computer_tool_handler,
            task_service: deps.task_service,
            singleton: ProcessorSingleton::new(),
            ephemeral: EphemeralStore::new(),
        })
    }

    /// `spec.md` §4.1 `processTask`. If already processing some task, logs
    /// and returns — no queueing.
    #[instrument(skip(self))]
    pub fn process_task(self: &Arc<Self>, task_id: String) {
        let (outcome, token) = self.singleton.try_start(&task_id);
        match outcome {
            StartOutcome::AlreadyProcessing => {
                tracing::info!(task_id, "processor already busy, dropping request");
            }
            StartOutcome::Started => {
                let token = token.expect("try_start returns a token when it starts a run");
                let processor = self.clone();
                tokio::spawn(async move {
                    iteration::run_loop(processor, task_id, token).await;
                });
            }
        }
    }

    /// `spec.md` §4.1 `onTakeover`. Unconditionally starts input capture;
    /// triggers cancellation only if this task is the one currently running.
    #[instrument(skip(self))]
    pub async fn on_takeover(&self, task_id: &str) {
        self.singleton.takeover(task_id);
        self.input_capture.start(task_id).await;
    }

    /// `spec.md` §4.1 `onResume`.
    #[instrument(skip(self))]
    pub fn on_resume(self: &Arc<Self>, task_id: &str) {
        if let Some(token) = self.singleton.resume(task_id) {
            let processor = self.clone();
            let task_id = task_id.to_string();
            tokio::spawn(async move {
                iteration::run_loop(processor, task_id, token).await;
            });
        }
    }

    /// `spec.md` §4.1 `onCancel`.
    #[instrument(skip(self))]
    pub async fn on_cancel(&self, task_id: &str) {
        if self.singleton.cancel(task_id) {
            self.input_capture.stop().await;
        }
    }

    /// `spec.md` §4.1 `stopProcessing`. Idempotent.
    #[instrument(skip(self))]
    pub async fn stop_processing(&self) {
        self.singleton.stop();
        self.input_capture.stop().await;
    }
}
