//! Runtime configuration.
//!
//! Sources are resolved per schema kind: an explicit `*_SCHEMA_URL` variable
//! wins, then `SCHEMA_DIR/<relative path>`, then (only when enabled) the
//! bundled copy. A kind with no source fails with `SchemaUnavailable` on
//! first use.
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `EVAL_REQUEST_SCHEMA_URL` | Eval request schema (URL or path) |
//! | `EVAL_RESPONSE_SCHEMA_URL` | Eval response schema |
//! | `PREVIEW_REQUEST_SCHEMA_URL` | Preview request schema |
//! | `PREVIEW_RESPONSE_SCHEMA_URL` | Preview response schema |
//! | `HEALTH_RESPONSE_SCHEMA_URL` | Healthcheck response schema |
//! | `SCHEMA_DIR` | Directory holding `request/*.json` and `response/*.json` |
//! | `EVALFN_BUNDLED_SCHEMAS` | Fall back to bundled schemas (`1`/`true`) |
//! | `EVALFN_SCHEMA_TIMEOUT_SECS` | Bound on a single schema load (default: 10) |
//! | `EVALFN_SCHEMA_MAX_RETRIES` | Retries for transient HTTP failures (default: 2, at most 10) |

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::schema::{bundled_document, SchemaKind, SchemaSource};

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MAX_RETRIES: u32 = 2;
const MAX_RETRIES_LIMIT: u32 = 10;

/// Per-kind schema sources.
#[derive(Debug, Clone, Default)]
pub struct SchemaSources {
    sources: BTreeMap<SchemaKind, SchemaSource>,
}

impl SchemaSources {
    /// No sources configured.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every kind resolved under `dir`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let sources = SchemaKind::ALL
            .into_iter()
            .map(|kind| (kind, SchemaSource::Path(dir.join(kind.relative_path()))))
            .collect();
        Self { sources }
    }

    /// Every kind served from the copies compiled into the binary.
    pub fn bundled() -> Self {
        let mut sources = Self::empty();
        sources.fill_bundled();
        sources
    }

    /// Resolve sources from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve sources from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let schema_dir = lookup("SCHEMA_DIR").filter(|v| !v.trim().is_empty());
        let mut sources = BTreeMap::new();

        for kind in SchemaKind::ALL {
            let explicit = lookup(kind.env_var()).filter(|v| !v.trim().is_empty());
            let source = match (explicit, &schema_dir) {
                (Some(value), _) => Some(SchemaSource::parse(value.trim())),
                (None, Some(dir)) => Some(SchemaSource::Path(
                    PathBuf::from(dir).join(kind.relative_path()),
                )),
                (None, None) => None,
            };
            if let Some(source) = source {
                sources.insert(kind, source);
            }
        }

        let mut resolved = Self { sources };
        if lookup("EVALFN_BUNDLED_SCHEMAS").is_some_and(|v| is_truthy(&v)) {
            resolved.fill_bundled();
        }
        resolved
    }

    /// Override the source for one kind.
    pub fn with_source(mut self, kind: SchemaKind, source: SchemaSource) -> Self {
        self.sources.insert(kind, source);
        self
    }

    /// Fill every kind that has no source with its bundled copy.
    pub fn with_bundled_fallback(mut self) -> Self {
        self.fill_bundled();
        self
    }

    pub fn get(&self, kind: SchemaKind) -> Option<&SchemaSource> {
        self.sources.get(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SchemaKind, &SchemaSource)> {
        self.sources.iter().map(|(k, v)| (*k, v))
    }

    fn fill_bundled(&mut self) {
        for kind in SchemaKind::ALL {
            if self.sources.contains_key(&kind) {
                continue;
            }
            // Bundled documents are checked by unit tests; a parse failure
            // simply leaves the kind unconfigured.
            if let Ok(doc) = bundled_document(kind) {
                self.sources
                    .insert(kind, SchemaSource::Inline(Arc::new(doc)));
            }
        }
    }
}

/// Configuration for the schema registry and runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Where each schema kind is loaded from.
    pub schemas: SchemaSources,

    /// Upper bound on loading one schema, retries included.
    pub schema_timeout: Duration,

    /// Retries for transient HTTP failures while fetching a schema.
    pub max_retries: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            schemas: SchemaSources::empty(),
            schema_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl RuntimeConfig {
    /// Create config from environment variables (see module docs).
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            schemas: SchemaSources::from_lookup(&lookup),
            schema_timeout: lookup("EVALFN_SCHEMA_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            max_retries: lookup("EVALFN_SCHEMA_MAX_RETRIES")
                .and_then(|v| v.parse::<u32>().ok())
                .map_or(DEFAULT_MAX_RETRIES, |n| n.min(MAX_RETRIES_LIMIT)),
        }
    }

    /// Set the schema sources.
    pub fn with_schemas(mut self, schemas: SchemaSources) -> Self {
        self.schemas = schemas;
        self
    }

    /// Set the schema load timeout.
    pub fn with_schema_timeout(mut self, timeout: Duration) -> Self {
        self.schema_timeout = timeout;
        self
    }

    /// Set the transient-failure retry budget (at most 10).
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries.min(MAX_RETRIES_LIMIT);
        self
    }
}

fn is_truthy(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_explicit_url_wins_over_schema_dir() {
        let sources = SchemaSources::from_lookup(lookup(&[
            ("SCHEMA_DIR", "/opt/schemas"),
            ("EVAL_REQUEST_SCHEMA_URL", "https://schemas.example.com/request/eval.json"),
        ]));

        assert!(matches!(
            sources.get(SchemaKind::EvalRequest),
            Some(SchemaSource::Url(u)) if u.host_str() == Some("schemas.example.com")
        ));
        assert_eq!(
            sources.get(SchemaKind::HealthResponse),
            Some(&SchemaSource::Path(PathBuf::from(
                "/opt/schemas/response/healthcheck.json"
            )))
        );
    }

    #[test]
    fn test_unconfigured_kinds_stay_empty() {
        let sources = SchemaSources::from_lookup(lookup(&[(
            "EVAL_RESPONSE_SCHEMA_URL",
            "/tmp/eval-response.json",
        )]));
        assert!(sources.get(SchemaKind::EvalResponse).is_some());
        assert!(sources.get(SchemaKind::EvalRequest).is_none());
        assert_eq!(sources.iter().count(), 1);
    }

    #[test]
    fn test_bundled_fallback_only_fills_gaps() {
        let sources = SchemaSources::from_lookup(lookup(&[
            ("EVALFN_BUNDLED_SCHEMAS", "true"),
            ("EVAL_REQUEST_SCHEMA_URL", "/tmp/custom.json"),
        ]));
        assert_eq!(
            sources.get(SchemaKind::EvalRequest),
            Some(&SchemaSource::Path(PathBuf::from("/tmp/custom.json")))
        );
        assert!(matches!(
            sources.get(SchemaKind::PreviewResponse),
            Some(SchemaSource::Inline(_))
        ));
    }

    #[test]
    fn test_runtime_config_defaults_and_overrides() {
        let cfg = RuntimeConfig::from_lookup(lookup(&[]));
        assert_eq!(cfg.schema_timeout, Duration::from_secs(10));
        assert_eq!(cfg.max_retries, 2);

        let cfg = RuntimeConfig::from_lookup(lookup(&[
            ("EVALFN_SCHEMA_TIMEOUT_SECS", "3"),
            ("EVALFN_SCHEMA_MAX_RETRIES", "0"),
        ]));
        assert_eq!(cfg.schema_timeout, Duration::from_secs(3));
        assert_eq!(cfg.max_retries, 0);
    }

    #[test]
    fn test_retry_budget_is_capped() {
        let cfg = RuntimeConfig::from_lookup(lookup(&[("EVALFN_SCHEMA_MAX_RETRIES", "4000")]));
        assert_eq!(cfg.max_retries, 10);
        assert_eq!(RuntimeConfig::default().with_max_retries(u32::MAX).max_retries, 10);
    }
}
