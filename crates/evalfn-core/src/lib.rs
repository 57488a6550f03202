//! Request dispatch and validation core for evaluation functions.
//!
//! An evaluation function is a serverless deployment that grades student
//! responses. This crate is the part around the grading logic: it decodes
//! the invocation event, routes the `command` header to an operation,
//! validates request bodies and response envelopes against JSON Schemas,
//! and returns a status/result/error envelope.
//!
//! ```no_run
//! use evalfn_core::{Capabilities, EvaluationRuntime, ExactMatch};
//!
//! # async fn run() -> Result<(), evalfn_core::HandlerError> {
//! let runtime = EvaluationRuntime::from_env(Capabilities::new(ExactMatch))?;
//! let response = runtime
//!     .invoke(serde_json::json!({
//!         "headers": {"command": "eval"},
//!         "body": {"response": "42", "answer": "42"},
//!     }))
//!     .await;
//! assert_eq!(response["result"]["is_correct"], true);
//! # Ok(())
//! # }
//! ```

pub mod capability;
pub mod command;
pub mod config;
pub mod envelope;
pub mod error;
pub mod handlers;
pub mod request;
pub mod runtime;
pub mod schema;
pub mod selftest;

pub use capability::{
    Capabilities, DocsProvider, EchoPreview, EvaluationError, EvaluationFunction, ExactMatch,
    FsDocs, InlineDocs, NoDocs, Params, PreviewFunction, StaticSuite, TestCase, TestSuite,
};
pub use command::{route, Command, DocsKind};
pub use config::{RuntimeConfig, SchemaSources};
pub use envelope::{
    DocsResponse, Envelope, EnvelopeBuilder, ErrorBody, InternalFailure, Payload, Response, Status,
};
pub use error::{HandlerError, HandlerResult};
pub use request::Request;
pub use runtime::EvaluationRuntime;
pub use schema::{
    PreloadReport, Schema, SchemaKind, SchemaRegistry, SchemaSource, SchemaValidator,
    ValidationResult, Violation,
};
