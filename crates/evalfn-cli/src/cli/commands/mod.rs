use std::time::Duration;

use anyhow::Context;
use evalfn_core::{
    Capabilities, EvaluationRuntime, ExactMatch, FsDocs, Response, RuntimeConfig, SchemaRegistry,
    SchemaSources,
};
use serde_json::Value;

use super::args::GlobalArgs;
use crate::exit_codes::{EXIT_FAILURE, EXIT_INTERNAL_ERROR, EXIT_SUCCESS};

pub mod dispatch;
pub mod healthcheck;
pub mod invoke;
pub mod schemas;
pub mod serve;

/// Runtime config from the environment with command-line overrides applied.
pub(crate) fn runtime_config(global: &GlobalArgs) -> RuntimeConfig {
    let mut config = RuntimeConfig::from_env();

    if let Some(dir) = &global.schema_dir {
        let dir = dir.display().to_string();
        config.schemas = SchemaSources::from_lookup(|key| {
            if key == "SCHEMA_DIR" {
                Some(dir.clone())
            } else {
                std::env::var(key).ok()
            }
        });
    }
    if global.bundled_schemas {
        config.schemas = config.schemas.with_bundled_fallback();
    }
    if let Some(secs) = global.schema_timeout_secs {
        config = config.with_schema_timeout(Duration::from_secs(secs));
    }
    config
}

/// The runtime served by this binary: exact-match grading, echo preview,
/// docs read from `--docs-dir`.
pub(crate) fn build_runtime(global: &GlobalArgs) -> anyhow::Result<EvaluationRuntime> {
    let config = runtime_config(global);
    tracing::debug!(sources = ?config.schemas, timeout = ?config.schema_timeout, "runtime config");

    let registry = SchemaRegistry::new(&config).context("failed to create schema registry")?;
    let capabilities = Capabilities::new(ExactMatch).with_docs(FsDocs::new(&global.docs_dir));
    Ok(EvaluationRuntime::new(registry, capabilities))
}

pub(crate) fn exit_code_for(response: &Response) -> i32 {
    if response.is_internal() {
        EXIT_INTERNAL_ERROR
    } else if response.is_success() {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    }
}

pub(crate) fn render(value: &Value, pretty: bool) -> anyhow::Result<String> {
    let text = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    text.context("failed to serialize response")
}
