//! Interrupt/Retry Controller (`spec.md` §4.7). Classification is a pure
//! function; scheduling/state-mutation lives in `iteration.rs` and
//! `lifecycle.rs` so this module stays unit-testable without async
//! plumbing. Grounded on `gateway/src/runtime/cancel.rs`'s
//! cancellation-vs-error distinction.

use std::time::Duration;

use crate::config::ProcessorConfig;
use crate::error::ProcessorError;
use crate::model::cap_error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Interrupt,
    Other,
}

pub fn classify(err: &ProcessorError) -> ErrorClass {
    if err.is_interrupt() {
        ErrorClass::Interrupt
    } else {
        ErrorClass::Other
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    Exhausted,
}

/// `retry_count` is the count *after* incrementing for this failure.
pub fn decide_retry(cfg: &ProcessorConfig, retry_count: u32) -> RetryDecision {
    if retry_count <= cfg.max_interrupt_retries {
        RetryDecision::RetryAfter(Duration::from_millis(cfg.interrupt_retry_delay_ms))
    } else {
        RetryDecision::Exhausted
    }
}

/// The capped, human-readable error stored on FAILED tasks (`spec.md` §7).
pub fn failed_error_message(cfg: &ProcessorConfig, err: &ProcessorError) -> String {
    let raw = err.to_string();
    if raw.is_empty() {
        "Processing error".to_string()
    } else {
        cap_error(&raw, cfg.error_message_cap)
    }
}

pub fn exhausted_error_message(cfg: &ProcessorConfig) -> String {
    format!(
        "Exceeded {} consecutive interrupt retries without making progress",
        cfg.max_interrupt_retries
    )
}
