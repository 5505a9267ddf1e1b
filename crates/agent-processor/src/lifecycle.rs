//! Lifecycle Controller (`spec.md` §4.1) plus the per-task ephemeral state
//! and processor singleton state from §3/§5. Grounded on
//! `gateway/src/runtime/session_lock.rs` (single-owner guarded state) and
//! `gateway/src/runtime/cancel.rs` (cancellation handle lifecycle): a
//! single mutex guards everything the spec says must be single-writer.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Per-task ephemeral state (`spec.md` §3): created lazily on first use,
/// deleted when a terminal status is reached or processing stops.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskEphemeral {
    pub retry_count: u32,
    pub computer_tool_failures: u32,
    pub computer_tools_disabled: bool,
}

/// Owns the ephemeral maps, guarded by a single mutex (`spec.md` §5:
/// "treat as guarded by a single mutex or an equivalent single-writer
/// discipline").
#[derive(Default)]
pub struct EphemeralStore {
    inner: Mutex<HashMap<String, TaskEphemeral>>,
}

impl EphemeralStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_retry(&self, task_id: &str) -> u32 {
        let mut map = self.inner.lock();
        let entry = map.entry(task_id.to_string()).or_default();
        entry.retry_count += 1;
        entry.retry_count
    }

    pub fn increment_computer_tool_failures(&self, task_id: &str) -> u32 {
        let mut map = self.inner.lock();
        let entry = map.entry(task_id.to_string()).or_default();
        entry.computer_tool_failures += 1;
        entry.computer_tool_failures
    }

    pub fn is_computer_tools_disabled(&self, task_id: &str) -> bool {
        self.inner
            .lock()
            .get(task_id)
            .map(|e| e.computer_tools_disabled)
            .unwrap_or(false)
    }

    pub fn set_computer_tools_disabled(&self, task_id: &str, disabled: bool) {
        let mut map = self.inner.lock();
        map.entry(task_id.to_string()).or_default().computer_tools_disabled = disabled;
    }

    pub fn clear(&self, task_id: &str) {
        self.inner.lock().remove(task_id);
    }
}

/// Processor singleton state (`spec.md` §3). Invariant P1:
/// `is_processing ⇔ current_task_id.is_some() ⇔ cancellation.is_some()`.
#[derive(Default)]
struct SingletonInner {
    current_task_id: Option<String>,
    is_processing: bool,
    cancellation: Option<CancellationToken>,
}

impl SingletonInner {
    fn invariant_holds(&self) -> bool {
        self.is_processing == self.current_task_id.is_some()
            && self.is_processing == self.cancellation.is_some()
    }
}

#[derive(Default)]
pub struct ProcessorSingleton {
    inner: Mutex<SingletonInner>,
}

/// Outcome of attempting to start processing a task via [`ProcessorSingleton::try_start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A fresh run was started; the returned token is the iteration loop's
    /// root cancellation handle.
    Started,
    /// The processor is already busy (`spec.md` §4.1: "log and return, no
    /// queueing").
    AlreadyProcessing,
}

impl ProcessorSingleton {
    pub fn new() -> Self {
        Self::default()
    }

    /// `spec.md` §4.1 `processTask`. Returns the fresh root cancellation
    /// token when a run was actually started.
    pub fn try_start(&self, task_id: &str) -> (StartOutcome, Option<CancellationToken>) {
        let mut s = self.inner.lock();
        if s.is_processing {
            return (StartOutcome::AlreadyProcessing, None);
        }
        let token = CancellationToken::new();
        s.is_processing = true;
        s.current_task_id = Some(task_id.to_string());
        s.cancellation = Some(token.clone());
        debug_assert!(s.invariant_holds());
        (StartOutcome::Started, Some(token))
    }

    /// `spec.md` §4.1 `onTakeover`. Triggers cancellation iff the processor
    /// currently owns `task_id`; does not clear `is_processing`. Input
    /// capture is started unconditionally by the caller regardless of the
    /// return value.
    pub fn takeover(&self, task_id: &str) -> bool {
        let s = self.inner.lock();
        if s.current_task_id.as_deref() == Some(task_id) {
            if let Some(token) = &s.cancellation {
                token.cancel();
            }
            true
        } else {
            false
        }
    }

    /// `spec.md` §4.1 `onResume`. Only re-arms when the processor still
    /// holds `task_id` and is marked processing. Returns the fresh root
    /// token for the new run, if any.
    pub fn resume(&self, task_id: &str) -> Option<CancellationToken> {
        let mut s = self.inner.lock();
        if s.is_processing && s.current_task_id.as_deref() == Some(task_id) {
            let token = CancellationToken::new();
            s.cancellation = Some(token.clone());
            debug_assert!(s.invariant_holds());
            Some(token)
        } else {
            None
        }
    }

    /// `spec.md` §4.1 `onCancel`. No-ops when `task_id` is not the
    /// processor's current task (an implementation decision recorded in
    /// `DESIGN.md` — the spec only describes the single-tenant case).
    pub fn cancel(&self, task_id: &str) -> bool {
        let mut s = self.inner.lock();
        if s.current_task_id.as_deref() != Some(task_id) {
            return false;
        }
        if let Some(token) = s.cancellation.take() {
            token.cancel();
        }
        s.is_processing = false;
        s.current_task_id = None;
        debug_assert!(s.invariant_holds());
        true
    }

    /// `spec.md` §4.1 `stopProcessing`. Idempotent; clears unconditionally.
    pub fn stop(&self) {
        let mut s = self.inner.lock();
        if let Some(token) = s.cancellation.take() {
            token.cancel();
        }
        s.is_processing = false;
        s.current_task_id = None;
        debug_assert!(s.invariant_holds());
    }

    /// Clears singleton state only if `task_id` is still the current task
    /// — used by the iteration loop when it observes a non-RUNNING status
    /// or reaches a terminal transition, so a stale iteration can't clobber
    /// state a newer `resume` already reset.
    pub fn clear_if_current(&self, task_id: &str) {
        let mut s = self.inner.lock();
        if s.current_task_id.as_deref() == Some(task_id) {
            if let Some(token) = s.cancellation.take() {
                token.cancel();
            }
            s.is_processing = false;
            s.current_task_id = None;
            debug_assert!(s.invariant_holds());
        }
    }

    pub fn is_processing(&self) -> bool {
        self.inner.lock().is_processing
    }

    /// `true` iff the processor is currently processing exactly `task_id`.
    /// Used to detect a concurrent `onCancel`/`stopProcessing` that wound
    /// the run down while an await point (e.g. a provider call) was
    /// in-flight (`spec.md` §8 scenario 6).
    pub fn owns(&self, task_id: &str) -> bool {
        let s = self.inner.lock();
        s.is_processing && s.current_task_id.as_deref() == Some(task_id)
    }

    pub fn current_task_id(&self) -> Option<String> {
        self.inner.lock().current_task_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_start_while_processing_is_rejected() {
        let s = ProcessorSingleton::new();
        let (outcome1, token1) = s.try_start("t1");
        assert_eq!(outcome1, StartOutcome::Started);
        assert!(token1.is_some());

        let (outcome2, token2) = s.try_start("t2");
        assert_eq!(outcome2, StartOutcome::AlreadyProcessing);
        assert!(token2.is_none());
        assert_eq!(s.current_task_id().as_deref(), Some("t1"));
    }

    #[test]
    fn takeover_cancels_token_without_clearing_processing() {
        let s = ProcessorSingleton::new();
        let (_, token) = s.try_start("t1");
        let token = token.unwrap();
        assert!(s.takeover("t1"));
        assert!(token.is_cancelled());
        assert!(s.is_processing());
    }

    #[test]
    fn takeover_for_other_task_is_noop() {
        let s = ProcessorSingleton::new();
        let (_, token) = s.try_start("t1");
        let token = token.unwrap();
        assert!(!s.takeover("other"));
        assert!(!token.is_cancelled());
    }

    #[test]
    fn resume_reallocates_fresh_token() {
        let s = ProcessorSingleton::new();
        let (_, token) = s.try_start("t1");
        let token = token.unwrap();
        token.cancel();
        let new_token = s.resume("t1").expect("resume should re-arm");
        assert!(!new_token.is_cancelled());
    }

    #[test]
    fn resume_for_non_current_task_does_nothing() {
        let s = ProcessorSingleton::new();
        s.try_start("t1");
        assert!(s.resume("other").is_none());
    }

    #[test]
    fn cancel_clears_singleton_state() {
        let s = ProcessorSingleton::new();
        let (_, token) = s.try_start("t1");
        let token = token.unwrap();
        assert!(s.cancel("t1"));
        assert!(token.is_cancelled());
        assert!(!s.is_processing());
        assert!(s.current_task_id().is_none());
    }

    #[test]
    fn stop_is_idempotent() {
        let s = ProcessorSingleton::new();
        s.try_start("t1");
        s.stop();
        s.stop();
        assert!(!s.is_processing());
    }

    #[test]
    fn ephemeral_state_lazily_created_and_cleared() {
        let eph = EphemeralStore::new();
        assert!(!eph.is_computer_tools_disabled("t1"));
        eph.increment_computer_tool_failures("t1");
        eph.increment_computer_tool_failures("t1");
        eph.set_computer_tools_disabled("t1", true);
        assert!(eph.is_computer_tools_disabled("t1"));
        eph.clear("t1");
        assert!(!eph.is_computer_tools_disabled("t1"));
    }
}
