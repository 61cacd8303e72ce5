//! Error taxonomy shared across the engine and its collaborators.
//!
//! Categories map one-to-one onto caller-visible behavior: contract
//! violations and malformed documents always surface, sandbox timeouts are
//! distinguishable from generic sandbox failures, and orchestration aborts
//! carry the playbook and step that triggered them.

use thiserror::Error;

/// Which sandbox phase exceeded its budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxPhase {
    /// Running the payload text so it can register its entry point.
    Register,
    /// Invoking the registered entry point with the frozen inputs.
    Invoke,
}

impl std::fmt::Display for SandboxPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SandboxPhase::Register => write!(f, "registration"),
            SandboxPhase::Invoke => write!(f, "invocation"),
        }
    }
}

/// Failure while tokenizing, parsing, or evaluating an authored expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    /// A character outside the grammar, with its byte position.
    #[error("unexpected character '{character}' at position {position}")]
    UnexpectedCharacter { character: char, position: usize },

    /// The expression ended where a token was still required.
    #[error("unexpected end of expression")]
    UnexpectedEnd,

    /// A well-formed token in a position the grammar does not allow.
    #[error("unexpected token '{token}' at position {position}")]
    UnexpectedToken { token: String, position: usize },

    /// Expression nested beyond the parser's depth limit.
    #[error("expression nesting is too deep")]
    NestingTooDeep,

    /// A field reference naming no supplied intake field.
    #[error("unknown intake field '{0}'")]
    UnknownField(String),

    /// A field reference resolving to a non-numeric or non-finite value.
    #[error("intake field '{0}' is not a finite number")]
    NonNumericField(String),

    /// Division by zero anywhere in the expression.
    #[error("division by zero")]
    DivisionByZero,

    /// Arithmetic overflowed into a non-finite value.
    #[error("expression result is not finite")]
    NonFiniteResult,

    /// A condition outside the single-comparison grammar.
    #[error("malformed condition '{condition}': {detail}")]
    MalformedCondition { condition: String, detail: String },

    /// Comparison across differently typed operands.
    #[error("cannot compare {left} with {right}")]
    ComparisonTypeMismatch { left: String, right: String },
}

/// Engine-level failure surfaced to callers.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The caller passed the wrong shape; always a programmer error.
    #[error("contract violation: {0}")]
    Contract(String),

    /// A sandbox phase exceeded its wall-clock budget.
    #[error("sandbox timed out after {budget_ms} ms during payload {phase}")]
    SandboxTimeout { phase: SandboxPhase, budget_ms: u64 },

    /// Any other failure inside the payload, including a non-mapping return.
    #[error("sandbox execution failed: {0}")]
    Sandbox(String),

    /// Malformed arithmetic or condition text.
    #[error(transparent)]
    Expression(#[from] ExpressionError),

    /// Supplied intake failed the playbook schema; carries every violation.
    #[error("intake validation failed: {}", violations.join("; "))]
    IntakeValidation { violations: Vec<String> },

    /// A step with `on_error: abort` failed; no later step was attempted.
    #[error("playbook '{playbook}' aborted at step '{step}': {reason}")]
    Aborted {
        playbook: String,
        step: String,
        reason: String,
    },

    /// No playbook document exists for the requested id.
    #[error("playbook '{0}' not found")]
    PlaybookNotFound(String),

    /// A playbook document missing required top-level fields.
    #[error("malformed playbook '{id}': {detail}")]
    MalformedPlaybook { id: String, detail: String },

    /// No model exists for the requested id.
    #[error("model '{0}' not found")]
    ModelNotFound(String),

    /// A model whose manifest or payload could not be read or parsed.
    #[error("malformed model '{id}': {detail}")]
    MalformedModel { id: String, detail: String },
}
