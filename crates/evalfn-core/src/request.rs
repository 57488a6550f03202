//! Inbound invocation events.
//!
//! An event is the JSON object handed over by the hosting runtime:
//!
//! ```json
//! {
//!   "headers": { "command": "eval" },
//!   "body": "{\"response\": \"x\", \"answer\": \"x\"}",
//!   "requestContext": { "requestId": "..." }
//! }
//! ```
//!
//! The body may be an object or a JSON-encoded string. Parsing the body is
//! deferred until a handler asks for it, so commands that ignore the body
//! (`healthcheck`, `docs`) never fail on a malformed one.

use serde_json::{json, Map, Value};

use crate::error::{HandlerError, HandlerResult};

const NO_BODY: &str = "No data supplied in request body.";
const BAD_JSON: &str = "Request body is not valid JSON.";

/// A single inbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Raw command selector from `headers.command`; `None` when absent.
    pub command: Option<String>,

    /// Raw body as received.
    pub body: Option<Value>,

    /// Identifier used to correlate logs for this invocation.
    pub request_id: String,

    /// Remaining top-level event fields (invoker identity, context).
    pub metadata: Map<String, Value>,
}

impl Request {
    /// Build a request from a raw event.
    pub fn from_event(event: Value) -> Self {
        let mut fields = match event {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("event".to_string(), other);
                map
            }
        };

        let command = fields
            .get("headers")
            .and_then(|h| h.get("command"))
            .map(|c| match c {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            });

        let body = fields.remove("body").filter(|b| !b.is_null());

        let request_id = fields
            .get("requestContext")
            .and_then(|c| c.get("requestId"))
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Self {
            command,
            body,
            request_id,
            metadata: fields,
        }
    }

    /// Convenience constructor for an already-decoded body.
    pub fn new(command: Option<&str>, body: Value) -> Self {
        let mut event = json!({ "body": body });
        if let Some(command) = command {
            event["headers"] = json!({ "command": command });
        }
        Self::from_event(event)
    }

    /// Decode the body into a JSON value.
    ///
    /// Object bodies are returned as-is; string bodies are parsed as JSON.
    pub fn parse_body(&self) -> HandlerResult<Value> {
        match &self.body {
            None => Err(HandlerError::parse(NO_BODY, None)),
            Some(Value::String(raw)) => serde_json::from_str(raw).map_err(|e| {
                HandlerError::parse(
                    BAD_JSON,
                    Some(json!({
                        "message": decode_message(&e),
                        "location": { "line": e.line(), "column": e.column() },
                    })),
                )
            }),
            Some(other) => Ok(other.clone()),
        }
    }
}

/// serde_json appends " at line X column Y"; the location is reported
/// separately so the message is trimmed to its first clause.
fn decode_message(err: &serde_json::Error) -> String {
    let text = err.to_string();
    match text.rfind(" at line ") {
        Some(idx) => text[..idx].to_string(),
        None => text,
    }
}
