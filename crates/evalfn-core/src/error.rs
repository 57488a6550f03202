//! Error taxonomy for the evaluation runtime.
//!
//! Every variant carries a stable `code()` that is written into error
//! envelopes. Input-side failures render as ordinary failure responses; the
//! internal kinds (`is_internal()`) mark deployment or handler defects.

use serde_json::{json, Value};

use crate::schema::{SchemaKind, Violation};

/// Errors produced while handling an invocation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HandlerError {
    /// The command selector is present but not one of the known commands.
    #[error("Unknown command '{command}'.")]
    UnknownCommand { command: String },

    /// The request body is missing or is not valid JSON.
    #[error("{message}")]
    Parse {
        message: String,
        detail: Option<Value>,
    },

    /// A request payload does not conform to its schema.
    #[error("Failed to validate body against the {} schema.", .kind.label())]
    SchemaValidationFailure {
        kind: SchemaKind,
        violations: Vec<Violation>,
    },

    /// A schema could not be fetched, parsed or compiled.
    #[error("schema unavailable: {} ({reason})", .kind.label())]
    SchemaUnavailable { kind: SchemaKind, reason: String },

    /// The externally supplied grading or preview logic failed.
    #[error("{message}")]
    GradingFunction {
        message: String,
        detail: Option<Value>,
    },

    /// A healthcheck suite could not be loaded or run at all.
    #[error("test suite '{suite}' could not be executed: {reason}")]
    TestSuiteExecution { suite: String, reason: String },

    /// The requested documentation is not available.
    #[error("{} documentation is not available.", .kind)]
    DocsNotFound { kind: String },

    /// A constructed response envelope violated its own response schema.
    #[error("response violates the {} schema", .kind.label())]
    ResponseSchemaViolation {
        kind: SchemaKind,
        violations: Vec<Violation>,
    },
}

impl HandlerError {
    /// Stable machine-readable tag for the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownCommand { .. } => "UNKNOWN_COMMAND",
            Self::Parse { .. } => "PARSE_ERROR",
            Self::SchemaValidationFailure { .. } => "SCHEMA_VALIDATION_FAILURE",
            Self::SchemaUnavailable { .. } => "SCHEMA_UNAVAILABLE",
            Self::GradingFunction { .. } => "GRADING_FUNCTION_ERROR",
            Self::TestSuiteExecution { .. } => "TEST_SUITE_EXECUTION_ERROR",
            Self::DocsNotFound { .. } => "DOCS_NOT_FOUND",
            Self::ResponseSchemaViolation { .. } => "RESPONSE_SCHEMA_VIOLATION",
        }
    }

    /// Internal errors terminate the invocation and are never re-validated.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::SchemaUnavailable { .. }
                | Self::TestSuiteExecution { .. }
                | Self::ResponseSchemaViolation { .. }
        )
    }

    /// Structured detail written next to the message, if any.
    pub fn detail(&self) -> Option<Value> {
        match self {
            Self::UnknownCommand { .. } | Self::DocsNotFound { .. } => None,
            Self::Parse { detail, .. } | Self::GradingFunction { detail, .. } => detail.clone(),
            Self::SchemaValidationFailure { violations, .. } => Some(json!({
                "error_thrown": violations.first(),
                "violations": violations,
            })),
            Self::SchemaUnavailable { reason, .. } => Some(json!({ "reason": reason })),
            Self::TestSuiteExecution { suite, reason } => Some(json!({
                "suite": suite,
                "reason": reason,
            })),
            Self::ResponseSchemaViolation { violations, .. } => {
                Some(json!({ "violations": violations }))
            }
        }
    }

    pub(crate) fn parse(message: impl Into<String>, detail: Option<Value>) -> Self {
        Self::Parse {
            message: message.into(),
            detail,
        }
    }

    pub(crate) fn unavailable(kind: SchemaKind, reason: impl Into<String>) -> Self {
        Self::SchemaUnavailable {
            kind,
            reason: reason.into(),
        }
    }
}

/// Result type for runtime operations.
pub type HandlerResult<T> = Result<T, HandlerError>;
