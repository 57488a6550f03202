use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::OperationHandler;
use crate::capability::DocsProvider;
use crate::command::DocsKind;
use crate::envelope::{DocsResponse, Payload};
use crate::error::{HandlerError, HandlerResult};
use crate::request::Request;

const CONTENT_TYPE: &str = "application/octet-stream";

/// Serves one documentation page verbatim.
pub struct DocsHandler {
    kind: DocsKind,
    docs: Arc<dyn DocsProvider>,
}

impl DocsHandler {
    pub fn new(kind: DocsKind, docs: Arc<dyn DocsProvider>) -> Self {
        Self { kind, docs }
    }
}

#[async_trait]
impl OperationHandler for DocsHandler {
    type Input = DocsKind;
    type Output = Vec<u8>;

    async fn validate_input(&self, _request: &Request) -> HandlerResult<DocsKind> {
        Ok(self.kind)
    }

    async fn execute(&self, kind: DocsKind) -> HandlerResult<Vec<u8>> {
        self.docs.load(kind).ok_or_else(|| HandlerError::DocsNotFound {
            kind: kind.to_string(),
        })
    }

    fn build_output(&self, content: Vec<u8>) -> HandlerResult<Payload> {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), CONTENT_TYPE.to_string());
        Ok(Payload::Docs(DocsResponse {
            status_code: 200,
            headers,
            body: STANDARD.encode(content),
            is_base64_encoded: true,
        }))
    }
}
