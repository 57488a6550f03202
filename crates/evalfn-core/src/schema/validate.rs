//! Payload validation against registry schemas.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Schema, SchemaKind, SchemaRegistry};
use crate::error::{HandlerError, HandlerResult};

/// One schema violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// JSON pointer into the payload.
    pub instance_path: String,
    /// JSON pointer into the schema keyword that failed.
    pub schema_path: String,
    pub message: String,
}

impl Violation {
    pub fn new(
        instance_path: impl Into<String>,
        schema_path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            instance_path: instance_path.into(),
            schema_path: schema_path.into(),
            message: message.into(),
        }
    }
}

/// Outcome of validating one payload. `Invalid` is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid,
    Invalid(Vec<Violation>),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::Valid => &[],
            Self::Invalid(v) => v,
        }
    }

    /// Turn an invalid result into a request-side validation failure.
    pub fn into_request_result(self, kind: SchemaKind) -> HandlerResult<()> {
        match self {
            Self::Valid => Ok(()),
            Self::Invalid(violations) => {
                Err(HandlerError::SchemaValidationFailure { kind, violations })
            }
        }
    }
}

/// Validate `payload` against an already loaded schema.
///
/// Violations are ordered by instance path, then schema path, so repeated
/// calls produce identical results.
pub fn validate_against(schema: &Schema, payload: &Value) -> ValidationResult {
    let validator = schema.validator();
    if validator.is_valid(payload) {
        return ValidationResult::Valid;
    }

    let mut violations: Vec<Violation> = validator
        .iter_errors(payload)
        .map(|e| {
            Violation::new(
                e.instance_path.to_string(),
                e.schema_path.to_string(),
                e.to_string(),
            )
        })
        .collect();

    if violations.is_empty() {
        // is_valid and iter_errors disagree only on validator bugs; keep the
        // result non-empty regardless.
        violations.push(Violation::new("", "", "payload does not match schema"));
    }

    violations.sort_by(|a, b| {
        (a.instance_path.as_str(), a.schema_path.as_str())
            .cmp(&(b.instance_path.as_str(), b.schema_path.as_str()))
    });
    violations.dedup();
    ValidationResult::Invalid(violations)
}

/// Validates payloads against the schemas held by a registry.
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    registry: SchemaRegistry,
}

impl SchemaValidator {
    pub fn new(registry: SchemaRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Validate `payload` against the schema for `kind`.
    ///
    /// Only a missing schema is an error; an invalid payload is a data result.
    pub async fn validate(
        &self,
        payload: &Value,
        kind: SchemaKind,
    ) -> HandlerResult<ValidationResult> {
        let schema = self.registry.get(kind).await?;
        Ok(validate_against(&schema, payload))
    }
}
