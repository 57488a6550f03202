//! Capabilities supplied by the hosting layer.
//!
//! The runtime never implements grading logic, self-tests or documentation
//! itself; it consumes them through these traits. Reference implementations
//! cover the common cases (exact-match grading, echo preview, file-backed
//! docs) and let the CLI run without a custom host.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::command::DocsKind;

/// Evaluation parameters (`params` in the request body).
pub type Params = Map<String, Value>;

/// Failure raised by user-supplied evaluation or preview logic.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    /// A failure the function reports deliberately; message and detail are
    /// passed through to the caller unchanged.
    #[error("{message}")]
    Reported {
        message: String,
        detail: Option<Value>,
    },

    /// Any other failure.
    #[error("{0}")]
    Failed(String),
}

impl EvaluationError {
    pub fn reported(message: impl Into<String>) -> Self {
        Self::Reported {
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(self, detail: Value) -> Self {
        match self {
            Self::Reported { message, .. } => Self::Reported {
                message,
                detail: Some(detail),
            },
            Self::Failed(message) => Self::Reported {
                message,
                detail: Some(detail),
            },
        }
    }

    /// Error-dict form used in envelopes and case warnings.
    pub(crate) fn to_error_fields(&self) -> (String, Option<Value>) {
        match self {
            Self::Reported { message, detail } => (message.clone(), detail.clone()),
            Self::Failed(text) => (
                crate::handlers::EVALUATION_FAILED.to_string(),
                Some(Value::String(text.clone())),
            ),
        }
    }
}

impl From<anyhow::Error> for EvaluationError {
    fn from(err: anyhow::Error) -> Self {
        Self::Failed(format!("{err:#}"))
    }
}

/// The grading function: `(response, answer, params) -> result object`.
pub trait EvaluationFunction: Send + Sync + 'static {
    fn evaluate(
        &self,
        response: &Value,
        answer: &Value,
        params: &Params,
    ) -> Result<Value, EvaluationError>;
}

impl<F> EvaluationFunction for F
where
    F: Fn(&Value, &Value, &Params) -> Result<Value, EvaluationError> + Send + Sync + 'static,
{
    fn evaluate(
        &self,
        response: &Value,
        answer: &Value,
        params: &Params,
    ) -> Result<Value, EvaluationError> {
        self(response, answer, params)
    }
}

/// The preview function: `(response, params) -> result object`.
pub trait PreviewFunction: Send + Sync + 'static {
    fn preview(&self, response: &Value, params: &Params) -> Result<Value, EvaluationError>;
}

impl<F> PreviewFunction for F
where
    F: Fn(&Value, &Params) -> Result<Value, EvaluationError> + Send + Sync + 'static,
{
    fn preview(&self, response: &Value, params: &Params) -> Result<Value, EvaluationError> {
        self(response, params)
    }
}

/// Grades a response as correct when it equals the answer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatch;

impl EvaluationFunction for ExactMatch {
    fn evaluate(
        &self,
        response: &Value,
        answer: &Value,
        _params: &Params,
    ) -> Result<Value, EvaluationError> {
        Ok(json!({ "is_correct": response == answer }))
    }
}

/// Previews a response by echoing it back.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoPreview;

impl PreviewFunction for EchoPreview {
    fn preview(&self, response: &Value, _params: &Params) -> Result<Value, EvaluationError> {
        Ok(json!({ "preview": response }))
    }
}

type CheckFn = dyn Fn() -> anyhow::Result<()> + Send + Sync;

/// A single named self-test.
#[derive(Clone)]
pub struct TestCase {
    name: String,
    check: Arc<CheckFn>,
}

impl TestCase {
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the check. Panics propagate to the caller, which runs tests on a
    /// blocking worker to contain them.
    pub fn run(&self) -> anyhow::Result<()> {
        (self.check)()
    }
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase").field("name", &self.name).finish()
    }
}

/// A discoverable group of self-tests.
#[async_trait]
pub trait TestSuite: Send + Sync {
    fn name(&self) -> &str;

    /// Produce the suite's test cases. An error means the suite cannot run
    /// at all, as opposed to individual tests failing.
    async fn load(&self) -> Result<Vec<TestCase>, String>;
}

/// A suite with a fixed list of cases.
#[derive(Debug, Clone)]
pub struct StaticSuite {
    name: String,
    cases: Vec<TestCase>,
}

impl StaticSuite {
    pub fn new(name: impl Into<String>, cases: Vec<TestCase>) -> Self {
        Self {
            name: name.into(),
            cases,
        }
    }
}

#[async_trait]
impl TestSuite for StaticSuite {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self) -> Result<Vec<TestCase>, String> {
        Ok(self.cases.clone())
    }
}

/// Source of the static documentation pages.
pub trait DocsProvider: Send + Sync + 'static {
    /// Raw content of the page, or `None` when it does not exist.
    fn load(&self, kind: DocsKind) -> Option<Vec<u8>>;
}

/// No documentation available.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDocs;

impl DocsProvider for NoDocs {
    fn load(&self, _kind: DocsKind) -> Option<Vec<u8>> {
        None
    }
}

/// Documentation read from `<dir>/user.md` and `<dir>/dev.md`.
#[derive(Debug, Clone)]
pub struct FsDocs {
    dir: PathBuf,
}

impl FsDocs {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, kind: DocsKind) -> PathBuf {
        self.dir.join(format!("{kind}.md"))
    }
}

impl DocsProvider for FsDocs {
    fn load(&self, kind: DocsKind) -> Option<Vec<u8>> {
        let path = self.path_for(kind);
        match std::fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "docs page not readable");
                None
            }
        }
    }
}

/// Documentation compiled into the host binary.
#[derive(Debug, Clone, Default)]
pub struct InlineDocs {
    pub user: Option<String>,
    pub dev: Option<String>,
}

impl DocsProvider for InlineDocs {
    fn load(&self, kind: DocsKind) -> Option<Vec<u8>> {
        let page = match kind {
            DocsKind::User => &self.user,
            DocsKind::Dev => &self.dev,
        };
        page.as_ref().map(|text| text.as_bytes().to_vec())
    }
}

/// Everything the hosting layer plugs into the runtime.
#[derive(Clone)]
pub struct Capabilities {
    pub evaluation: Arc<dyn EvaluationFunction>,
    pub preview: Arc<dyn PreviewFunction>,
    pub tests: Vec<Arc<dyn TestSuite>>,
    pub docs: Arc<dyn DocsProvider>,
}

impl Capabilities {
    /// Capabilities around `evaluation`, with echo preview, no user tests
    /// and no documentation.
    pub fn new(evaluation: impl EvaluationFunction) -> Self {
        Self {
            evaluation: Arc::new(evaluation),
            preview: Arc::new(EchoPreview),
            tests: Vec::new(),
            docs: Arc::new(NoDocs),
        }
    }

    pub fn with_preview(mut self, preview: impl PreviewFunction) -> Self {
        self.preview = Arc::new(preview);
        self
    }

    pub fn with_test_suite(mut self, suite: impl TestSuite + 'static) -> Self {
        self.tests.push(Arc::new(suite));
        self
    }

    pub fn with_docs(mut self, docs: impl DocsProvider) -> Self {
        self.docs = Arc::new(docs);
        self
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::new(ExactMatch)
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("tests", &self.tests.iter().map(|t| t.name()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        let f = ExactMatch;
        let params = Params::new();
        assert_eq!(
            f.evaluate(&json!("x"), &json!("x"), &params).unwrap(),
            json!({"is_correct": true})
        );
        assert_eq!(
            f.evaluate(&json!(1), &json!("1"), &params).unwrap(),
            json!({"is_correct": false})
        );
    }

    #[test]
    fn test_closures_are_evaluation_functions() {
        let f = |_: &Value, _: &Value, p: &Params| -> Result<Value, EvaluationError> {
            Ok(json!({ "is_correct": p.contains_key("strict") }))
        };
        let mut params = Params::new();
        params.insert("strict".into(), json!(true));
        assert_eq!(
            f.evaluate(&json!(1), &json!(1), &params).unwrap()["is_correct"],
            true
        );
    }

    #[test]
    fn test_error_fields() {
        let (message, detail) = EvaluationError::Failed("division by zero".into()).to_error_fields();
        assert_eq!(
            message,
            "An exception was raised while executing the evaluation function."
        );
        assert_eq!(detail, Some(json!("division by zero")));

        let (message, detail) = EvaluationError::reported("Unparseable expression")
            .with_detail(json!({"position": 4}))
            .to_error_fields();
        assert_eq!(message, "Unparseable expression");
        assert_eq!(detail, Some(json!({"position": 4})));
    }

    #[test]
    fn test_anyhow_conversion_keeps_context() {
        let err: EvaluationError = anyhow::anyhow!("inner").context("outer").into();
        assert_eq!(err, EvaluationError::Failed("outer: inner".into()));
    }

    #[test]
    fn test_fs_docs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("user.md"), "# User docs\n").unwrap();
        let docs = FsDocs::new(dir.path());
        assert_eq!(docs.load(DocsKind::User), Some(b"# User docs\n".to_vec()));
        assert_eq!(docs.load(DocsKind::Dev), None);
    }

    #[tokio::test]
    async fn test_static_suite_returns_cases() {
        let suite = StaticSuite::new(
            "user",
            vec![
                TestCase::new("passes", || Ok(())),
                TestCase::new("fails", || anyhow::bail!("nope")),
            ],
        );
        let cases = suite.load().await.unwrap();
        assert_eq!(cases.len(), 2);
        assert!(cases[0].run().is_ok());
        assert_eq!(cases[1].run().unwrap_err().to_string(), "nope");
    }
}
