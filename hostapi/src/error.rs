//! Callable-side error type.

/// Error returned by host callables and the registry.
///
/// These surface to the embedder through the bridge's error type; the guest
/// never sees them directly.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HostError {
    /// Registration named a function the vocabulary does not contain.
    #[error("unknown host function: {0:?}")]
    UnknownFunction(String),

    /// A callable received the wrong number of arguments.
    #[error("expected {expected} arguments, got {actual}")]
    Arity { expected: usize, actual: usize },

    /// A callable received an argument of an unexpected type.
    #[error("argument {index} has unexpected type {actual}")]
    ArgumentType { index: usize, actual: &'static str },

    /// A handle passed to a scope operation did not resolve.
    #[error("invalid handle {0:#018x}")]
    InvalidHandle(u64),

    /// Callable-specific failure.
    #[error("{0}")]
    Failed(String),
}

impl HostError {
    /// Shorthand for a callable-specific failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = HostError::UnknownFunction("dom.create".into());
        assert!(format!("{}", err).contains("dom.create"));

        let err = HostError::Arity {
            expected: 2,
            actual: 0,
        };
        assert_eq!(format!("{}", err), "expected 2 arguments, got 0");

        let err = HostError::InvalidHandle(0x0000_0003_0000_0000);
        assert!(format!("{}", err).contains("0x0000000300000000"));
    }

    #[test]
    fn test_failed_shorthand() {
        let err = HostError::failed("backend unavailable");
        assert!(matches!(err, HostError::Failed(msg) if msg == "backend unavailable"));
    }
}
