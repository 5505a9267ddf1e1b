//! Error kinds, matching `spec.md` §7's disposition table. One `thiserror`
//! enum, one `Result<T>` alias — the teacher's convention for a crate-local
//! error type.

/// Name an upstream provider raises on cooperative cancellation, per
/// `spec.md` §4.2/§4.7. Non-Rust-native provider adapters that can't express
/// [`ProcessorError::Interrupt`] directly may instead return a generic error
/// whose message equals this string; `crate::retry::classify` still
/// recognizes it.
pub const INTERRUPT_SIGNAL: &str = "BytebotAgentInterrupt";

#[derive(thiserror::Error, Debug)]
pub enum ProcessorError {
    /// Cooperative-abort surfaced by a provider honoring cancellation.
    #[error("{INTERRUPT_SIGNAL}")]
    Interrupt,

    #[error("no service for provider {0}")]
    NoProviderForTag(String),

    #[error("provider call failed: {0}")]
    ProviderCallFailed(String),

    #[error("No content blocks returned from model")]
    EmptyResponse,

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ProcessorError>;

impl ProcessorError {
    /// `true` when this error should be treated as an [`Self::Interrupt`]
    /// for retry purposes — either the typed variant, or a message that
    /// equals the interrupt signal (`spec.md` §4.7: "name equals
    /// `BytebotAgentInterrupt` or identical message").
    pub fn is_interrupt(&self) -> bool {
        match self {
            ProcessorError::Interrupt => true,
            other => other.to_string() == INTERRUPT_SIGNAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupt_variant_is_interrupt() {
        assert!(ProcessorError::Interrupt.is_interrupt());
    }

    #[test]
    fn other_with_matching_message_is_interrupt() {
        let err = ProcessorError::Other(INTERRUPT_SIGNAL.to_string());
        assert!(err.is_interrupt());
    }

    #[test]
    fn other_with_different_message_is_not_interrupt() {
        let err = ProcessorError::Other("network reset".to_string());
        assert!(!err.is_interrupt());
    }
}
