//! JSON Schema handling: kinds, sources, the process-wide registry and the
//! validator built on top of it.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

mod bundled;
mod fetch;
pub mod registry;
pub mod validate;

pub use bundled::bundled_document;
pub use registry::{PreloadReport, SchemaRegistry};
pub use validate::{SchemaValidator, ValidationResult, Violation};

/// The request and response shapes the runtime validates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaKind {
    EvalRequest,
    EvalResponse,
    PreviewRequest,
    PreviewResponse,
    HealthResponse,
}

impl SchemaKind {
    /// All kinds, in preload order.
    pub const ALL: [SchemaKind; 5] = [
        SchemaKind::EvalRequest,
        SchemaKind::EvalResponse,
        SchemaKind::PreviewRequest,
        SchemaKind::PreviewResponse,
        SchemaKind::HealthResponse,
    ];

    /// Environment variable naming an explicit source for this kind.
    pub fn env_var(self) -> &'static str {
        match self {
            Self::EvalRequest => "EVAL_REQUEST_SCHEMA_URL",
            Self::EvalResponse => "EVAL_RESPONSE_SCHEMA_URL",
            Self::PreviewRequest => "PREVIEW_REQUEST_SCHEMA_URL",
            Self::PreviewResponse => "PREVIEW_RESPONSE_SCHEMA_URL",
            Self::HealthResponse => "HEALTH_RESPONSE_SCHEMA_URL",
        }
    }

    /// Location of this kind relative to a schema directory.
    pub fn relative_path(self) -> &'static str {
        match self {
            Self::EvalRequest => "request/eval.json",
            Self::EvalResponse => "response/eval.json",
            Self::PreviewRequest => "request/preview.json",
            Self::PreviewResponse => "response/preview.json",
            Self::HealthResponse => "response/healthcheck.json",
        }
    }

    /// Human-readable label used in error messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::EvalRequest => "evaluation request",
            Self::EvalResponse => "evaluation response",
            Self::PreviewRequest => "preview request",
            Self::PreviewResponse => "preview response",
            Self::HealthResponse => "healthcheck response",
        }
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.relative_path())
    }
}

/// Where a schema document is loaded from.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaSource {
    /// Fetched over HTTP(S).
    Url(url::Url),
    /// Read from the local filesystem.
    Path(PathBuf),
    /// Already in memory (bundled copies, tests).
    Inline(Arc<Value>),
}

impl SchemaSource {
    /// Interpret a configured value: `http(s)` URLs are fetched, `file://`
    /// URLs and anything else are treated as filesystem paths.
    pub fn parse(value: &str) -> Self {
        match url::Url::parse(value) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Self::Url(url),
            Ok(url) if url.scheme() == "file" => match url.to_file_path() {
                Ok(path) => Self::Path(path),
                Err(()) => Self::Path(PathBuf::from(url.path())),
            },
            _ => Self::Path(PathBuf::from(value)),
        }
    }

    /// Short description for logs and reports.
    pub fn describe(&self) -> String {
        match self {
            Self::Url(url) => url.to_string(),
            Self::Path(path) => path.display().to_string(),
            Self::Inline(_) => "<inline>".to_string(),
        }
    }
}

/// A loaded, compiled schema. Immutable once cached.
pub struct Schema {
    /// Which shape this schema constrains.
    pub kind: SchemaKind,

    /// Where the document came from.
    pub source: SchemaSource,

    /// The parsed document.
    pub document: Value,

    /// When the document was fetched and compiled.
    pub loaded_at: DateTime<Utc>,

    validator: jsonschema::Validator,
}

impl Schema {
    /// Compile a parsed document into a Draft 7 validator.
    pub fn compile(
        kind: SchemaKind,
        source: SchemaSource,
        document: Value,
    ) -> Result<Self, String> {
        let validator = jsonschema::options()
            .with_draft(jsonschema::Draft::Draft7)
            .build(&document)
            .map_err(|e| format!("failed to compile schema: {}", e))?;

        Ok(Self {
            kind,
            source,
            document,
            loaded_at: Utc::now(),
            validator,
        })
    }

    pub(crate) fn validator(&self) -> &jsonschema::Validator {
        &self.validator
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("kind", &self.kind)
            .field("source", &self.source)
            .field("loaded_at", &self.loaded_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_parse_distinguishes_urls_and_paths() {
        assert!(matches!(
            SchemaSource::parse("https://example.com/request/eval.json"),
            SchemaSource::Url(_)
        ));
        assert_eq!(
            SchemaSource::parse("file:///opt/schemas/request/eval.json"),
            SchemaSource::Path(PathBuf::from("/opt/schemas/request/eval.json"))
        );
        assert_eq!(
            SchemaSource::parse("schemas/request/eval.json"),
            SchemaSource::Path(PathBuf::from("schemas/request/eval.json"))
        );
    }

    #[test]
    fn test_compile_rejects_invalid_schema() {
        let doc = serde_json::json!({ "type": 12 });
        let err = Schema::compile(
            SchemaKind::EvalRequest,
            SchemaSource::Inline(Arc::new(doc.clone())),
            doc,
        )
        .unwrap_err();
        assert!(err.starts_with("failed to compile schema"));
    }

    #[test]
    fn test_every_kind_has_distinct_env_var_and_path() {
        let mut vars: Vec<_> = SchemaKind::ALL.iter().map(|k| k.env_var()).collect();
        let mut paths: Vec<_> = SchemaKind::ALL.iter().map(|k| k.relative_path()).collect();
        vars.sort();
        vars.dedup();
        paths.sort();
        paths.dedup();
        assert_eq!(vars.len(), SchemaKind::ALL.len());
        assert_eq!(paths.len(), SchemaKind::ALL.len());
    }
}
