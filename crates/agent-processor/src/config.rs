//! Tunable thresholds. `spec.md` hard-codes these as constants; the teacher
//! never hard-codes a threshold it could instead expose on a config struct.
//! Defaults reproduce the spec's literals exactly.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Used when a model descriptor carries no `contextWindow` (`spec.md` §4.5).
    pub context_window_fallback: u32,
    /// Fraction of the context window that triggers summarization (`spec.md` §4.5).
    pub summarization_trigger_ratio: f64,
    /// Consecutive computer-tool failures before degrading (`spec.md` §4.6).
    pub computer_tool_failure_threshold: u32,
    /// Bounded Interrupt retries before escalating to NEEDS_HELP (`spec.md` §4.7).
    pub max_interrupt_retries: u32,
    /// Delay between Interrupt retries, in milliseconds (`spec.md` §4.7).
    pub interrupt_retry_delay_ms: u64,
    /// Cap applied to any user-visible `error` field (`spec.md` §3/§7).
    pub error_message_cap: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            context_window_fallback: 200_000,
            summarization_trigger_ratio: 0.75,
            computer_tool_failure_threshold: 2,
            max_interrupt_retries: 3,
            interrupt_retry_delay_ms: 500,
            error_message_cap: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_literals() {
        let cfg = ProcessorConfig::default();
        assert_eq!(cfg.context_window_fallback, 200_000);
        assert!((cfg.summarization_trigger_ratio - 0.75).abs() < f64::EPSILON);
        assert_eq!(cfg.computer_tool_failure_threshold, 2);
        assert_eq!(cfg.max_interrupt_retries, 3);
        assert_eq!(cfg.interrupt_retry_delay_ms, 500);
        assert_eq!(cfg.error_message_cap, 500);
    }

    #[test]
    fn deserializes_partial_overrides_with_defaults() {
        let cfg: ProcessorConfig = serde_json::from_str(r#"{"max_interrupt_retries":5}"#).unwrap();
        assert_eq!(cfg.max_interrupt_retries, 5);
        assert_eq!(cfg.computer_tool_failure_threshold, 2);
    }
}
