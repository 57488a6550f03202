//! Process-wide schema registry.
//!
//! Schemas are loaded lazily on first use and cached for the lifetime of the
//! registry. Concurrent callers asking for the same kind share a single
//! in-flight load: `moka` runs the first caller's init future and parks the
//! others on it. Failed loads are not cached, so a later call retries.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::fetch::DocumentLoader;
use super::{Schema, SchemaKind};
use crate::config::{RuntimeConfig, SchemaSources};
use crate::error::{HandlerError, HandlerResult};

/// Cloneable handle to the shared schema cache.
#[derive(Clone)]
pub struct SchemaRegistry {
    inner: Arc<Inner>,
}

struct Inner {
    sources: SchemaSources,
    loader: DocumentLoader,
    timeout: Duration,
    cache: Cache<SchemaKind, Arc<Schema>>,
}

/// Availability of one schema kind after a preload.
#[derive(Debug, Clone, Serialize)]
pub struct PreloadEntry {
    pub kind: SchemaKind,
    pub source: Option<String>,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of loading every schema kind.
#[derive(Debug, Clone, Serialize)]
pub struct PreloadReport {
    pub entries: Vec<PreloadEntry>,
}

impl PreloadReport {
    /// True when every kind loaded.
    pub fn all_available(&self) -> bool {
        self.entries.iter().all(|e| e.available)
    }
}

impl SchemaRegistry {
    pub fn new(config: &RuntimeConfig) -> HandlerResult<Self> {
        let loader = DocumentLoader::new(config.schema_timeout, config.max_retries)
            .map_err(|reason| HandlerError::unavailable(SchemaKind::EvalRequest, reason))?;

        Ok(Self {
            inner: Arc::new(Inner {
                sources: config.schemas.clone(),
                loader,
                timeout: config.schema_timeout,
                cache: Cache::builder()
                    .max_capacity(SchemaKind::ALL.len() as u64)
                    .build(),
            }),
        })
    }

    /// Registry backed by the bundled schema copies.
    pub fn bundled() -> HandlerResult<Self> {
        Self::new(&RuntimeConfig::default().with_schemas(SchemaSources::bundled()))
    }

    /// Return the cached schema for `kind`, loading it on first use.
    pub async fn get(&self, kind: SchemaKind) -> HandlerResult<Arc<Schema>> {
        let inner = Arc::clone(&self.inner);
        self.inner
            .cache
            .try_get_with(kind, async move { inner.load(kind).await })
            .await
            .map_err(|e| e.as_ref().clone())
    }

    /// Load every kind and report which ones are usable.
    pub async fn preload(&self) -> PreloadReport {
        let mut entries = Vec::with_capacity(SchemaKind::ALL.len());

        for kind in SchemaKind::ALL {
            let source = self.inner.sources.get(kind).map(|s| s.describe());
            match self.get(kind).await {
                Ok(_) => entries.push(PreloadEntry {
                    kind,
                    source,
                    available: true,
                    error: None,
                }),
                Err(e) => entries.push(PreloadEntry {
                    kind,
                    source,
                    available: false,
                    error: Some(e.to_string()),
                }),
            }
        }

        PreloadReport { entries }
    }

    /// Kinds currently held in the cache.
    pub async fn cached_kinds(&self) -> Vec<SchemaKind> {
        self.inner.cache.run_pending_tasks().await;
        let mut kinds: Vec<_> = self.inner.cache.iter().map(|(k, _)| *k).collect();
        kinds.sort();
        kinds
    }

    pub fn sources(&self) -> &SchemaSources {
        &self.inner.sources
    }
}

impl Inner {
    async fn load(&self, kind: SchemaKind) -> HandlerResult<Arc<Schema>> {
        let source = self.sources.get(kind).cloned().ok_or_else(|| {
            HandlerError::unavailable(
                kind,
                format!(
                    "no source configured (set {} or SCHEMA_DIR)",
                    kind.env_var()
                ),
            )
        })?;

        debug!(kind = %kind, source = %source.describe(), "loading schema");

        let document = match tokio::time::timeout(self.timeout, self.loader.load(&source)).await
        {
            Ok(Ok(doc)) => doc,
            Ok(Err(reason)) => {
                warn!(kind = %kind, error = %reason, "schema load failed");
                return Err(HandlerError::unavailable(kind, reason));
            }
            Err(_) => {
                warn!(kind = %kind, timeout_ms = self.timeout.as_millis(), "schema load timed out");
                return Err(HandlerError::unavailable(
                    kind,
                    format!("timed out after {:?} loading {}", self.timeout, source.describe()),
                ));
            }
        };

        let schema = Schema::compile(kind, source, document)
            .map_err(|reason| HandlerError::unavailable(kind, reason))?;

        info!(kind = %kind, source = %schema.source.describe(), "schema cached");
        Ok(Arc::new(schema))
    }
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("sources", &self.inner.sources)
            .field("timeout", &self.inner.timeout)
            .finish_non_exhaustive()
    }
}
