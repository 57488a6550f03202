use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::warn;

use super::{guarded, validated_body, OperationHandler, EVALUATION_FAILED};
use crate::capability::{EvaluationError, Params, PreviewFunction};
use crate::envelope::Payload;
use crate::error::{HandlerError, HandlerResult};
use crate::request::Request;
use crate::schema::{SchemaKind, SchemaValidator};

#[derive(Debug, Clone, PartialEq)]
pub struct PreviewInput {
    pub response: Value,
    pub params: Params,
}

/// Renders a response with the injected preview function.
pub struct PreviewHandler {
    validator: SchemaValidator,
    function: Arc<dyn PreviewFunction>,
}

impl PreviewHandler {
    pub fn new(validator: SchemaValidator, function: Arc<dyn PreviewFunction>) -> Self {
        Self {
            validator,
            function,
        }
    }
}

#[async_trait]
impl OperationHandler for PreviewHandler {
    type Input = PreviewInput;
    type Output = Value;

    async fn validate_input(&self, request: &Request) -> HandlerResult<PreviewInput> {
        let body = validated_body(&self.validator, request, SchemaKind::PreviewRequest).await?;
        let mut body = match body {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Ok(PreviewInput {
            response: body.remove("response").unwrap_or(Value::Null),
            params: match body.remove("params") {
                Some(Value::Object(params)) => params,
                _ => Params::new(),
            },
        })
    }

    async fn execute(&self, input: PreviewInput) -> HandlerResult<Value> {
        let function = Arc::clone(&self.function);
        let joined = tokio::task::spawn_blocking(move || {
            guarded(|| function.preview(&input.response, &input.params)).and_then(|v| {
                if v.is_object() {
                    Ok(v)
                } else {
                    Err(
                        EvaluationError::reported("The preview function did not return an object.")
                            .with_detail(json!({ "returned": v })),
                    )
                }
            })
        })
        .await;

        match joined {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(err)) => {
                warn!(error = %err, "preview function failed");
                let (message, detail) = err.to_error_fields();
                Err(HandlerError::GradingFunction { message, detail })
            }
            Err(join_err) => {
                warn!(error = %join_err, "preview worker did not complete");
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
