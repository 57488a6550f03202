//! Built-in suites run by every healthcheck.
//!
//! The schema-compliance suites pin the behaviour of the request and
//! response schemas the runtime is deployed with: a body or envelope known
//! to be (in)valid must still be classified that way. A schema that cannot
//! be loaded makes the whole suite unrunnable. The smoke suite checks that
//! the deployment ships both documentation pages.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::capability::{DocsProvider, TestCase, TestSuite};
use crate::command::DocsKind;
use crate::schema::validate::validate_against;
use crate::schema::{SchemaKind, SchemaValidator};

struct Fixture {
    name: &'static str,
    kind: SchemaKind,
    payload: Value,
    valid: bool,
}

impl Fixture {
    fn valid(name: &'static str, kind: SchemaKind, payload: Value) -> Self {
        Self {
            name,
            kind,
            payload,
            valid: true,
        }
    }

    fn invalid(name: &'static str, kind: SchemaKind, payload: Value) -> Self {
        Self {
            name,
            kind,
            payload,
            valid: false,
        }
    }
}

/// Checks a fixed set of payloads against the registry's schemas.
pub struct SchemaComplianceSuite {
    name: &'static str,
    validator: SchemaValidator,
    fixtures: fn() -> Vec<Fixture>,
}

impl SchemaComplianceSuite {
    /// Request body fixtures.
    pub fn requests(validator: SchemaValidator) -> Self {
        Self {
            name: "requests",
            validator,
            fixtures: request_fixtures,
        }
    }

    /// Response envelope fixtures.
    pub fn responses(validator: SchemaValidator) -> Self {
        Self {
            name: "responses",
            validator,
            fixtures: response_fixtures,
        }
    }
}

#[async_trait]
impl TestSuite for SchemaComplianceSuite {
    fn name(&self) -> &str {
        self.name
    }

    async fn load(&self) -> Result<Vec<TestCase>, String> {
        let mut cases = Vec::new();

        for fixture in (self.fixtures)() {
            let schema = self
                .validator
                .registry()
                .get(fixture.kind)
                .await
                .map_err(|e| e.to_string())?;

            let Fixture {
                name,
                kind,
                payload,
                valid,
            } = fixture;

            cases.push(TestCase::new(name, move || {
                let result = validate_against(&schema, &payload);
                if result.is_valid() == valid {
                    return Ok(());
                }
                let expected = if valid { "valid" } else { "invalid" };
                match result.violations().first() {
                    Some(v) => anyhow::bail!(
                        "expected {payload} to be {expected} against the {} schema, got: {} at '{}'",
                        kind.label(),
                        v.message,
                        v.instance_path
                    ),
                    None => anyhow::bail!(
                        "expected {payload} to be {expected} against the {} schema",
                        kind.label()
                    ),
                }
            }));
        }

        Ok(cases)
    }
}

/// Checks that every documentation page can be served.
pub struct SmokeSuite {
    docs: Arc<dyn DocsProvider>,
}

impl SmokeSuite {
    pub fn new(docs: Arc<dyn DocsProvider>) -> Self {
        Self { docs }
    }
}

#[async_trait]
impl TestSuite for SmokeSuite {
    fn name(&self) -> &str {
        "smoke"
    }

    async fn load(&self) -> Result<Vec<TestCase>, String> {
        let cases = [DocsKind::Dev, DocsKind::User]
            .into_iter()
            .map(|kind| {
                let docs = Arc::clone(&self.docs);
                TestCase::new(format!("load_{kind}_docs"), move || match docs.load(kind) {
                    Some(content) if !content.is_empty() => Ok(()),
                    Some(_) => anyhow::bail!("{kind} documentation is empty"),
                    None => anyhow::bail!("{kind} documentation is missing"),
                })
            })
            .collect();
        Ok(cases)
    }
}

/// The suites every healthcheck runs before user suites.
pub fn builtin_suites(
    validator: &SchemaValidator,
    docs: Arc<dyn DocsProvider>,
) -> Vec<Arc<dyn TestSuite>> {
    vec![
        Arc::new(SmokeSuite::new(docs)),
        Arc::new(SchemaComplianceSuite::requests(validator.clone())),
        Arc::new(SchemaComplianceSuite::responses(validator.clone())),
    ]
}

fn request_fixtures() -> Vec<Fixture> {
    use SchemaKind::{EvalRequest, PreviewRequest};

    vec![
        Fixture::invalid("empty_request_body", EvalRequest, json!({})),
        Fixture::invalid(
            "missing_response",
            EvalRequest,
            json!({"answer": "example", "params": {}}),
        ),
        Fixture::invalid(
            "null_response_for_eval",
            EvalRequest,
            json!({"response": null, "answer": "example", "params": {}}),
        ),
        Fixture::invalid(
            "null_response_for_preview",
            PreviewRequest,
            json!({"response": null, "params": {}}),
        ),
        Fixture::invalid(
            "missing_answer_in_eval",
            EvalRequest,
            json!({"response": "example", "params": {}}),
        ),
        Fixture::valid(
            "missing_answer_in_preview",
            PreviewRequest,
            json!({"response": "example", "params": {}}),
        ),
        Fixture::invalid(
            "including_answer_in_preview",
            PreviewRequest,
            json!({"response": "example", "answer": "anything", "params": {}}),
        ),
        Fixture::invalid(
            "null_answer",
            EvalRequest,
            json!({"response": "example", "answer": null, "params": {}}),
        ),
        Fixture::invalid(
            "bad_params",
            EvalRequest,
            json!({"response": "example", "answer": "example", "params": 2}),
        ),
        Fixture::invalid(
            "extra_fields",
            EvalRequest,
            json!({"response": "example", "answer": "example", "params": {}, "is_correct": true}),
        ),
        Fixture::valid(
            "valid_request_body",
            EvalRequest,
            json!({"response": "", "answer": ""}),
        ),
    ]
}

fn response_fixtures() -> Vec<Fixture> {
    use SchemaKind::{EvalResponse, HealthResponse, PreviewResponse};

    vec![
        Fixture::invalid("empty_response_body", EvalResponse, json!({})),
        Fixture::invalid(
            "extra_fields",
            EvalResponse,
            json!({"command": "eval", "status": "success", "result": {}, "feedback": "x"}),
        ),
        Fixture::invalid(
            "bad_eval_command",
            EvalResponse,
            json!({"command": "not_eval", "status": "success", "result": {}}),
        ),
        Fixture::invalid(
            "bad_preview_command",
            PreviewResponse,
            json!({"command": "not_preview", "status": "success", "result": {"preview": "x"}}),
        ),
        Fixture::invalid(
            "bad_result_wrong_type",
            EvalResponse,
            json!({"command": "eval", "status": "success", "result": "an object"}),
        ),
        Fixture::invalid(
            "health_result_missing_tests_passed",
            HealthResponse,
            json!({"command": "healthcheck", "status": "success", "result": {"tests": []}}),
        ),
        Fixture::invalid(
            "bad_error_wrong_type",
            EvalResponse,
            json!({"status": "failure", "error": "an object"}),
        ),
        Fixture::invalid(
            "bad_error_missing_message",
            EvalResponse,
            json!({"status": "failure", "error": {"code": "PARSE_ERROR", "detail": {}}}),
        ),
        Fixture::invalid(
            "missing_command",
            EvalResponse,
            json!({"status": "success", "result": {"is_correct": true}}),
        ),
        Fixture::invalid(
            "missing_result",
            EvalResponse,
            json!({"command": "eval", "status": "success"}),
        ),
        Fixture::invalid(
            "result_and_error",
            EvalResponse,
            json!({
                "command": "eval",
                "status": "success",
                "result": {},
                "error": {"code": "PARSE_ERROR", "message": "m"},
            }),
        ),
        Fixture::valid(
            "valid_error_response",
            EvalResponse,
            json!({
                "status": "failure",
                "error": {"code": "PARSE_ERROR", "message": "Something went wrong."},
            }),
        ),
        Fixture::valid(
            "valid_eval_response",
            EvalResponse,
            json!({"command": "eval", "status": "success", "result": {"is_correct": true}}),
        ),
        Fixture::valid(
            "valid_preview_response",
            PreviewResponse,
            json!({"command": "preview", "status": "success", "result": {"preview": "anything"}}),
        ),
        Fixture::valid(
            "valid_healthcheck_response",
            HealthResponse,
            json!({
                "command": "healthcheck",
                "status": "success",
                "result": {
                    "tests_passed": true,
                    "tests": [{"name": "t", "suite": "requests", "status": "passed", "time": 12}],
                },
            }),
        ),
    ]
}
