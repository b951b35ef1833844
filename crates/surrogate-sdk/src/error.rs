//! Error types shared by the synthesizer and by invocation handlers

/// Result type for synthesis and proxy dispatch
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Errors raised while synthesizing a proxy type or dispatching through one
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProxyError {
    /// The prototype is not a visible interface / non-sealed class, or is an
    /// open generic definition
    #[error("Prototype shape error: {0}")]
    PrototypeShape(String),

    /// A supporting member the synthesized type relies on is missing or has
    /// the wrong shape
    #[error("Missing contract: {0}")]
    MissingContract(String),

    /// A handler or hook failed, or a base call had no implementation to run
    #[error("Invocation error: {0}")]
    Invocation(String),

    /// Unboxing or argument conversion failed
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected type name
        expected: String,
        /// Actual type name
        got: String,
    },

    /// Wrong argument count, bad index, or ambiguous overload
    #[error("Argument error: {0}")]
    ArgumentError(String),

    /// No member with the requested name / shape exists on the type
    #[error("Member not found: {0}")]
    MemberNotFound(String),

    /// A generic argument does not satisfy the declared constraints
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Synthesis options could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ProxyError {
    /// Shorthand for a `TypeMismatch`
    pub fn mismatch(expected: impl Into<String>, got: impl Into<String>) -> Self {
        ProxyError::TypeMismatch {
            expected: expected.into(),
            got: got.into(),
        }
    }
}

impl From<String> for ProxyError {
    fn from(s: String) -> Self {
        ProxyError::Invocation(s)
    }
}

impl From<&str> for ProxyError {
    fn from(s: &str) -> Self {
        ProxyError::Invocation(s.to_string())
    }
}
