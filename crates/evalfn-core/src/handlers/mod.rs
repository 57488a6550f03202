//! Operation handlers.
//!
//! Each command is served by a handler that follows the same three steps:
//! decode and validate its input, execute, and shape the output into a
//! [`Payload`] for the envelope builder. The runtime picks the handler with
//! an exhaustive match on [`Command`](crate::command::Command).

mod cases;
mod docs;
mod eval;
mod healthcheck;
mod preview;

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use async_trait::async_trait;
use serde_json::Value;

use crate::capability::EvaluationError;
use crate::envelope::Payload;
use crate::error::HandlerResult;
use crate::request::Request;
use crate::schema::{SchemaKind, SchemaValidator};

pub use docs::DocsHandler;
pub use eval::{EvalHandler, EvalInput};
pub use healthcheck::{HealthcheckHandler, TestOutcome, TestStatus, TestSuiteResult};
pub use preview::{PreviewHandler, PreviewInput};

pub(crate) const EVALUATION_FAILED: &str =
    "An exception was raised while executing the evaluation function.";

#[async_trait]
pub trait OperationHandler: Send + Sync {
    type Input: Send;
    type Output: Send;

    async fn validate_input(&self, request: &Request) -> HandlerResult<Self::Input>;

    async fn execute(&self, input: Self::Input) -> HandlerResult<Self::Output>;

    fn build_output(&self, output: Self::Output) -> HandlerResult<Payload>;

    /// Run all three steps, stopping at the first error.
    async fn handle(&self, request: &Request) -> HandlerResult<Payload> {
        let input = self.validate_input(request).await?;
        let output = self.execute(input).await?;
        self.build_output(output)
    }
}

/// Parse the request body and check it against `kind`.
pub(crate) async fn validated_body(
    validator: &SchemaValidator,
    request: &Request,
    kind: SchemaKind,
) -> HandlerResult<Value> {
    let body = request.parse_body()?;
    validator
        .validate(&body, kind)
        .await?
        .into_request_result(kind)?;
    Ok(body)
}

/// Call into user code, turning a panic into an evaluation failure.
pub(crate) fn guarded<T>(
    call: impl FnOnce() -> Result<T, EvaluationError>,
) -> Result<T, EvaluationError> {
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => result,
        Err(payload) => Err(EvaluationError::Failed(panic_message(payload.as_ref()))),
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with a non-string payload".to_string()
    }
}
