//! Schema copies shipped with the workspace under `schemas/`.

use serde_json::Value;

use super::SchemaKind;

const EVAL_REQUEST: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../schemas/request/eval.json"
));
const EVAL_RESPONSE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../schemas/response/eval.json"
));
const PREVIEW_REQUEST: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../schemas/request/preview.json"
));
const PREVIEW_RESPONSE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../schemas/response/preview.json"
));
const HEALTH_RESPONSE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../schemas/response/healthcheck.json"
));

/// Parse the bundled document for `kind`.
pub fn bundled_document(kind: SchemaKind) -> Result<Value, String> {
    let raw = match kind {
        SchemaKind::EvalRequest => EVAL_REQUEST,
        SchemaKind::EvalResponse => EVAL_RESPONSE,
        SchemaKind::PreviewRequest => PREVIEW_REQUEST,
        SchemaKind::PreviewResponse => PREVIEW_RESPONSE,
        SchemaKind::HealthResponse => HEALTH_RESPONSE,
    };
    serde_json::from_str(raw).map_err(|e| format!("bundled {} schema is not valid JSON: {e}", kind))
}
