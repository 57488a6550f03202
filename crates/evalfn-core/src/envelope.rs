//! Response envelopes.
//!
//! Success: `{"command": "eval", "status": "success", "result": {...}}`
//! Failure: `{"status": "failure", "error": {"code", "message", "detail"?}}`
//!
//! Every envelope is validated against the response schema of its command
//! before it leaves the runtime. A non-conforming envelope is a defect in
//! the handler that produced it and is surfaced as
//! `ResponseSchemaViolation`, never repaired.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

use crate::command::Command;
use crate::error::{HandlerError, HandlerResult};
use crate::schema::{SchemaKind, SchemaValidator, ValidationResult, Violation};

/// Envelope status indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Failure,
}

/// The `error` member of a failure envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl From<&HandlerError> for ErrorBody {
    fn from(err: &HandlerError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            detail: err.detail(),
        }
    }
}

/// Status/result/error envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<&'static str>,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Envelope {
    pub fn success(command: Command, result: Value) -> Self {
        Self {
            command: Some(command.name()),
            status: Status::Success,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(err: &HandlerError) -> Self {
        Self {
            command: None,
            status: Status::Failure,
            result: None,
            error: Some(ErrorBody::from(err)),
        }
    }
}

/// Proxy-style response returned verbatim for docs commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocsResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    #[serde(rename = "isBase64Encoded")]
    pub is_base64_encoded: bool,
}

/// Failure that escaped envelope validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InternalFailure {
    pub status: Status,
    pub internal: bool,
    pub error: ErrorBody,
}

/// What a handler hands to the envelope builder.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A result object to wrap in a success envelope.
    Result(Value),
    /// A docs response, returned as-is.
    Docs(DocsResponse),
}

/// Final response of one invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Envelope(Envelope),
    Docs(DocsResponse),
    /// Internal error; not schema-validated.
    Internal(InternalFailure),
}

impl Response {
    /// Render an internal error.
    pub fn internal(err: &HandlerError) -> Self {
        Self::Internal(InternalFailure {
            status: Status::Failure,
            internal: true,
            error: ErrorBody::from(err),
        })
    }

    pub fn is_success(&self) -> bool {
        match self {
            Self::Envelope(e) => e.status == Status::Success,
            Self::Docs(_) => true,
            Self::Internal(_) => false,
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }

    /// The response as a JSON value.
    pub fn to_value(&self) -> Value {
        // Every map in a response has string keys, so this cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Serialize a response part; a failure is reported against `kind`.
pub(crate) fn to_json<T: Serialize>(value: &T, kind: SchemaKind) -> HandlerResult<Value> {
    serde_json::to_value(value).map_err(|e| HandlerError::ResponseSchemaViolation {
        kind,
        violations: vec![Violation::new("", "", e.to_string())],
    })
}

/// Wraps handler outcomes into validated envelopes.
#[derive(Debug, Clone)]
pub struct EnvelopeBuilder {
    validator: SchemaValidator,
}

impl EnvelopeBuilder {
    pub fn new(validator: SchemaValidator) -> Self {
        Self { validator }
    }

    /// Build the response for `command` (`None` when routing failed).
    ///
    /// Internal errors in `outcome` are returned unchanged as `Err`; so are
    /// a missing response schema and a schema violation of the built
    /// envelope.
    pub async fn build(
        &self,
        command: Option<Command>,
        outcome: HandlerResult<Payload>,
    ) -> HandlerResult<Response> {
        let envelope = match outcome {
            Ok(Payload::Docs(docs)) => return Ok(Response::Docs(docs)),
            Ok(Payload::Result(result)) => match command {
                Some(command) => Envelope::success(command, result),
                None => {
                    return Err(HandlerError::ResponseSchemaViolation {
                        kind: SchemaKind::EvalResponse,
                        violations: vec![Violation::new(
                            "/command",
                            "",
                            "success envelope without a command",
                        )],
                    })
                }
            },
            Err(err) if err.is_internal() => return Err(err),
            Err(err) => Envelope::failure(&err),
        };

        let kind = command
            .map(Command::response_schema)
            .unwrap_or(SchemaKind::EvalResponse);
        let rendered = to_json(&envelope, kind)?;

        match self.validator.validate(&rendered, kind).await? {
            ValidationResult::Valid => Ok(Response::Envelope(envelope)),
            ValidationResult::Invalid(violations) => {
                error!(
                    kind = %kind,
                    violations = ?violations,
                    envelope = %rendered,
                    "response envelope violates its schema"
                );
                Err(HandlerError::ResponseSchemaViolation { kind, violations })
            }
        }
    }
}
