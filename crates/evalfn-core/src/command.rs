//! Command selection.
//!
//! | selector | command |
//! |----------|---------|
//! | absent | `Eval` |
//! | `eval`, `grade` | `Eval` (`grade` is a legacy alias; responses say `eval`) |
//! | `preview` | `Preview` |
//! | `healthcheck` | `Healthcheck` |
//! | `docs`, `docs-dev` | `Docs(Dev)` |
//! | `docs-user` | `Docs(User)` |
//!
//! Anything else, including an empty string, is `UnknownCommand`. The
//! default only applies when the selector is missing entirely.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{HandlerError, HandlerResult};
use crate::request::Request;
use crate::schema::SchemaKind;

/// Which documentation page is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocsKind {
    User,
    Dev,
}

impl fmt::Display for DocsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Dev => f.write_str("dev"),
        }
    }
}

/// The closed set of operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Eval,
    Preview,
    Healthcheck,
    Docs(DocsKind),
}

impl Command {
    /// Canonical name written into response envelopes.
    pub fn name(self) -> &'static str {
        match self {
            Self::Eval => "eval",
            Self::Preview => "preview",
            Self::Healthcheck => "healthcheck",
            Self::Docs(DocsKind::Dev) => "docs-dev",
            Self::Docs(DocsKind::User) => "docs-user",
        }
    }

    /// Parse a present selector.
    pub fn from_selector(selector: &str) -> HandlerResult<Self> {
        match selector {
            "eval" | "grade" => Ok(Self::Eval),
            "preview" => Ok(Self::Preview),
            "healthcheck" => Ok(Self::Healthcheck),
            "docs" | "docs-dev" => Ok(Self::Docs(DocsKind::Dev)),
            "docs-user" => Ok(Self::Docs(DocsKind::User)),
            other => Err(HandlerError::UnknownCommand {
                command: other.to_string(),
            }),
        }
    }

    /// Schema the request body must satisfy, if the command reads one.
    pub fn request_schema(self) -> Option<SchemaKind> {
        match self {
            Self::Eval => Some(SchemaKind::EvalRequest),
            Self::Preview => Some(SchemaKind::PreviewRequest),
            Self::Healthcheck | Self::Docs(_) => None,
        }
    }

    /// Schema a response envelope for this command must satisfy.
    ///
    /// Docs has no envelope schema of its own; its error envelopes use the
    /// evaluation response schema, which admits the bare error form.
    pub fn response_schema(self) -> SchemaKind {
        match self {
            Self::Eval | Self::Docs(_) => SchemaKind::EvalResponse,
            Self::Preview => SchemaKind::PreviewResponse,
            Self::Healthcheck => SchemaKind::HealthResponse,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stateless mapping from a request's selector to a command.
pub fn route(request: &Request) -> HandlerResult<Command> {
    match request.command.as_deref() {
        None => Ok(Command::Eval),
        Some(selector) => Command::from_selector(selector),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(command: Option<&str>) -> Request {
        Request::new(command, json!({}))
    }

    #[test]
    fn test_absent_selector_defaults_to_eval() {
        assert_eq!(route(&request(None)).unwrap(), Command::Eval);
    }

    #[test]
    fn test_grade_is_alias_for_eval() {
        assert_eq!(route(&request(Some("grade"))).unwrap(), Command::Eval);
        assert_eq!(route(&request(Some("eval"))).unwrap().name(), "eval");
        assert_eq!(route(&request(Some("grade"))).unwrap().name(), "eval");
    }

    #[test]
    fn test_known_selectors() {
        assert_eq!(route(&request(Some("preview"))).unwrap(), Command::Preview);
        assert_eq!(
            route(&request(Some("healthcheck"))).unwrap(),
            Command::Healthcheck
        );
        assert_eq!(
            route(&request(Some("docs"))).unwrap(),
            Command::Docs(DocsKind::Dev)
        );
        assert_eq!(
            route(&request(Some("docs-user"))).unwrap(),
            Command::Docs(DocsKind::User)
        );
    }

    #[test]
    fn test_present_but_invalid_selector_is_rejected() {
        for selector in ["not a command", "", "EVAL", "docs-admin"] {
            let err = route(&request(Some(selector))).unwrap_err();
            assert!(
                matches!(&err, HandlerError::UnknownCommand { command } if command == selector),
                "{selector:?} should be unknown"
            );
        }
    }

    #[test]
    fn test_non_string_selector_is_unknown() {
        let req = Request::from_event(json!({"headers": {"command": 3}, "body": {}}));
        assert!(matches!(
            route(&req),
            Err(HandlerError::UnknownCommand { command }) if command == "3"
        ));
    }

    #[test]
    fn test_schema_selection() {
        assert_eq!(Command::Eval.request_schema(), Some(SchemaKind::EvalRequest));
        assert_eq!(Command::Healthcheck.request_schema(), None);
        assert_eq!(
            Command::Healthcheck.response_schema(),
            SchemaKind::HealthResponse
        );
        assert_eq!(
            Command::Docs(DocsKind::User).response_schema(),
            SchemaKind::EvalResponse
        );
    }
}
