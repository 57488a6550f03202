//! Invocation entry point.
//!
//! ```text
//! event -> Request -> route -> handler -> EnvelopeBuilder -> JSON response
//! ```
//!
//! [`EvaluationRuntime`] is cheap to clone and is meant to live for the
//! whole process so that later invocations reuse the warm schema cache.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{error, field, info, info_span, Instrument, Span};

use crate::capability::{Capabilities, TestSuite};
use crate::command::{route, Command};
use crate::config::RuntimeConfig;
use crate::envelope::{EnvelopeBuilder, Payload, Response};
use crate::error::{HandlerError, HandlerResult};
use crate::handlers::{
    DocsHandler, EvalHandler, HealthcheckHandler, OperationHandler, PreviewHandler,
};
use crate::request::Request;
use crate::schema::{SchemaRegistry, SchemaValidator};
use crate::selftest::builtin_suites;

#[derive(Clone)]
pub struct EvaluationRuntime {
    validator: SchemaValidator,
    envelopes: EnvelopeBuilder,
    capabilities: Capabilities,
    builtin: Vec<Arc<dyn TestSuite>>,
}

impl EvaluationRuntime {
    pub fn new(registry: SchemaRegistry, capabilities: Capabilities) -> Self {
        let validator = SchemaValidator::new(registry);
        Self {
            envelopes: EnvelopeBuilder::new(validator.clone()),
            builtin: builtin_suites(&validator, Arc::clone(&capabilities.docs)),
            validator,
            capabilities,
        }
    }

    /// Runtime configured from the process environment.
    pub fn from_env(capabilities: Capabilities) -> HandlerResult<Self> {
        let registry = SchemaRegistry::new(&RuntimeConfig::from_env())?;
        Ok(Self::new(registry, capabilities))
    }

    /// Replace the built-in healthcheck suites.
    pub fn with_builtin_suites(mut self, suites: Vec<Arc<dyn TestSuite>>) -> Self {
        self.builtin = suites;
        self
    }

    pub fn registry(&self) -> &SchemaRegistry {
        self.validator.registry()
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Handle one raw event and render the response.
    pub async fn invoke(&self, event: Value) -> Value {
        self.respond(event).await.to_value()
    }

    /// Handle one raw event.
    pub async fn respond(&self, event: Value) -> Response {
        let request = Request::from_event(event);
        let span = info_span!(
            "invoke",
            request_id = %request.request_id,
            command = field::Empty,
        );
        self.respond_to(request).instrument(span).await
    }

    async fn respond_to(&self, request: Request) -> Response {
        let routed = route(&request);
        let command = routed.as_ref().ok().copied();
        if let Some(command) = command {
            Span::current().record("command", command.name());
        }

        let outcome = match routed {
            Ok(command) => self.dispatch(command, &request).await,
            Err(err) => Err(err),
        };

        self.finish(command, outcome).await
    }

    /// Render a failure raised before an event reached the runtime, such as
    /// a host-side decoding error. The envelope is validated like any other.
    pub async fn reject(&self, err: HandlerError) -> Response {
        self.finish(None, Err(err)).await
    }

    async fn finish(&self, command: Option<Command>, outcome: HandlerResult<Payload>) -> Response {
        if let Err(err) = &outcome {
            if !err.is_internal() {
                info!(code = err.code(), error = %err, "request rejected");
            }
        }

        match self.envelopes.build(command, outcome).await {
            Ok(response) => response,
            Err(err) => {
                error!(code = err.code(), error = %err, detail = ?err.detail(), "invocation failed");
                Response::internal(&err)
            }
        }
    }

    async fn dispatch(&self, command: Command, request: &Request) -> HandlerResult<Payload> {
        match command {
            Command::Eval => {
                EvalHandler::new(
                    self.validator.clone(),
                    Arc::clone(&self.capabilities.evaluation),
                )
                .handle(request)
                .await
            }
            Command::Preview => {
                PreviewHandler::new(
                    self.validator.clone(),
                    Arc::clone(&self.capabilities.preview),
                )
                .handle(request)
                .await
            }
            Command::Healthcheck => {
                let suites = self
                    .builtin
                    .iter()
                    .chain(&self.capabilities.tests)
                    .cloned()
                    .collect();
                HealthcheckHandler::new(suites).handle(request).await
            }
            Command::Docs(kind) => {
                DocsHandler::new(kind, Arc::clone(&self.capabilities.docs))
                    .handle(request)
                    .await
            }
        }
    }
}

impl fmt::Debug for EvaluationRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationRuntime")
            .field("registry", self.registry())
            .field("capabilities", &self.capabilities)
            .field(
                "builtin",
                &self.builtin.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
