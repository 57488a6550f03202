use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::{cases, guarded, validated_body, OperationHandler, EVALUATION_FAILED};
use crate::capability::{EvaluationError, EvaluationFunction, Params};
use crate::envelope::Payload;
use crate::error::{HandlerError, HandlerResult};
use crate::request::Request;
use crate::schema::{SchemaKind, SchemaValidator};

/// Validated arguments of an evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalInput {
    pub response: Value,
    pub answer: Value,
    pub params: Params,
}

impl EvalInput {
    fn from_body(body: Value) -> Self {
        let mut body = match body {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let params = match body.remove("params") {
            Some(Value::Object(params)) => params,
            _ => Params::new(),
        };
        Self {
            response: body.remove("response").unwrap_or(Value::Null),
            answer: body.remove("answer").unwrap_or(Value::Null),
            params,
        }
    }

    fn cases(&self) -> Option<&[Value]> {
        self.params
            .get("cases")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .filter(|cases| !cases.is_empty())
    }
}

/// Grades a response with the injected evaluation function.
pub struct EvalHandler {
    validator: SchemaValidator,
    function: Arc<dyn EvaluationFunction>,
}

impl EvalHandler {
    pub fn new(validator: SchemaValidator, function: Arc<dyn EvaluationFunction>) -> Self {
        Self {
            validator,
            function,
        }
    }
}

#[async_trait]
impl OperationHandler for EvalHandler {
    type Input = EvalInput;
    type Output = Value;

    async fn validate_input(&self, request: &Request) -> HandlerResult<EvalInput> {
        let body = validated_body(&self.validator, request, SchemaKind::EvalRequest).await?;
        Ok(EvalInput::from_body(body))
    }

    async fn execute(&self, input: EvalInput) -> HandlerResult<Value> {
        let function = Arc::clone(&self.function);
        let joined =
            tokio::task::spawn_blocking(move || evaluate(function.as_ref(), &input)).await;

        match joined {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(err)) => {
                warn!(error = %err, "evaluation function failed");
                let (message, detail) = err.to_error_fields();
                Err(HandlerError::GradingFunction { message, detail })
            }
            Err(join_err) => {
                warn!(error = %join_err, "evaluation worker did not complete");
                Err(HandlerError::GradingFunction {
                    message: EVALUATION_FAILED.to_string(),
                    detail: Some(Value::String(join_err.to_string())),
                })
            }
        }
    }

    fn build_output(&self, output: Value) -> HandlerResult<Payload> {
        Ok(Payload::Result(output))
    }
}

fn evaluate(function: &dyn EvaluationFunction, input: &EvalInput) -> Result<Value, EvaluationError> {
    let result = guarded(|| function.evaluate(&input.response, &input.answer, &input.params))?;

    let mut result = match result {
        Value::Object(map) => map,
        other => {
            return Err(
                EvaluationError::reported("The evaluation function did not return an object.")
                    .with_detail(json!({ "returned": other })),
            )
        }
    };

    if let Some(cases) = input.cases() {
        debug!(cases = cases.len(), "matching feedback cases");
        cases::resolve(function, &input.response, &input.params, cases).apply(&mut result);
    }

    Ok(Value::Object(result))
}
