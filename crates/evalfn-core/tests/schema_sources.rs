//! Schema loading from HTTP, disk and the environment.

use std::time::Duration;

use evalfn_core::schema::bundled_document;
use evalfn_core::{
    Capabilities, EvaluationRuntime, ExactMatch, RuntimeConfig, SchemaKind, SchemaRegistry,
    SchemaSource, SchemaSources,
};
use serde_json::json;
use serial_test::serial;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate, Times};

fn url_sources(server: &MockServer) -> SchemaSources {
    SchemaKind::ALL
        .into_iter()
        .fold(SchemaSources::empty(), |sources, kind| {
            sources.with_source(
                kind,
                SchemaSource::parse(&format!("{}/{}", server.uri(), kind.relative_path())),
            )
        })
}

async fn mount_schema(
    server: &MockServer,
    kind: SchemaKind,
    delay: Duration,
    expected: impl Into<Times>,
) {
    Mock::given(method("GET"))
        .and(path(format!("/{}", kind.relative_path())))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(bundled_document(kind).unwrap())
                .set_delay(delay),
        )
        .expect(expected)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_concurrent_gets_fetch_once() {
    let server = MockServer::start().await;
    mount_schema(
        &server,
        SchemaKind::EvalRequest,
        Duration::from_millis(300),
        1,
    )
    .await;

    let registry =
        SchemaRegistry::new(&RuntimeConfig::default().with_schemas(url_sources(&server))).unwrap();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let registry = registry.clone();
            tokio::spawn(async move { registry.get(SchemaKind::EvalRequest).await })
        })
        .collect();

    let mut loaded = Vec::new();
    for handle in handles {
        loaded.push(handle.await.unwrap().unwrap());
    }
    assert!(loaded
        .windows(2)
        .all(|pair| std::sync::Arc::ptr_eq(&pair[0], &pair[1])));

    // Warm cache: no further requests.
    registry.get(SchemaKind::EvalRequest).await.unwrap();
    server.verify().await;
}

#[tokio::test]
async fn test_slow_source_times_out() {
    let server = MockServer::start().await;
    mount_schema(
        &server,
        SchemaKind::EvalRequest,
        Duration::from_secs(5),
        1..,
    )
    .await;

    let config = RuntimeConfig::default()
        .with_schemas(url_sources(&server))
        .with_schema_timeout(Duration::from_millis(200));
    let registry = SchemaRegistry::new(&config).unwrap();

    let started = std::time::Instant::now();
    let err = registry.get(SchemaKind::EvalRequest).await.unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(err.code(), "SCHEMA_UNAVAILABLE");
    assert!(err.is_internal());
}

#[tokio::test]
async fn test_missing_remote_schema_is_internal_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let registry =
        SchemaRegistry::new(&RuntimeConfig::default().with_schemas(url_sources(&server))).unwrap();
    let rt = EvaluationRuntime::new(registry, Capabilities::new(ExactMatch));

    let response = rt
        .invoke(json!({"body": {"response": "a", "answer": "a"}}))
        .await;
    assert_eq!(response["status"], "failure");
    assert_eq!(response["internal"], true);
    assert_eq!(response["error"]["code"], "SCHEMA_UNAVAILABLE");
    assert!(response["error"]["detail"]["reason"]
        .as_str()
        .unwrap()
        .contains("HTTP 404"));
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/request/eval.json"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_schema(&server, SchemaKind::EvalRequest, Duration::ZERO, 1).await;

    let registry =
        SchemaRegistry::new(&RuntimeConfig::default().with_schemas(url_sources(&server))).unwrap();
    let schema = registry.get(SchemaKind::EvalRequest).await.unwrap();
    assert_eq!(schema.kind, SchemaKind::EvalRequest);
}

fn write_schema_dir(dir: &std::path::Path) {
    for kind in SchemaKind::ALL {
        let path = dir.join(kind.relative_path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            serde_json::to_vec_pretty(&bundled_document(kind).unwrap()).unwrap(),
        )
        .unwrap();
    }
}

const ENV_VARS: [&str; 8] = [
    "SCHEMA_DIR",
    "EVAL_REQUEST_SCHEMA_URL",
    "EVAL_RESPONSE_SCHEMA_URL",
    "PREVIEW_REQUEST_SCHEMA_URL",
    "PREVIEW_RESPONSE_SCHEMA_URL",
    "HEALTH_RESPONSE_SCHEMA_URL",
    "EVALFN_BUNDLED_SCHEMAS",
    "EVALFN_SCHEMA_TIMEOUT_SECS",
];

fn clear_env() {
    for var in ENV_VARS {
        std::env::remove_var(var);
    }
}

#[tokio::test]
#[serial]
async fn test_schema_dir_from_env() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    write_schema_dir(dir.path());
    std::env::set_var("SCHEMA_DIR", dir.path());

    let rt = EvaluationRuntime::from_env(Capabilities::new(ExactMatch)).unwrap();
    let response = rt
        .invoke(json!({"body": {"response": "a", "answer": "a"}}))
        .await;
    assert_eq!(response["result"]["is_correct"], true);
    assert!(rt.registry().preload().await.all_available());

    clear_env();
}

#[tokio::test]
#[serial]
async fn test_explicit_variable_overrides_schema_dir() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    write_schema_dir(dir.path());

    // A stricter eval request schema: answers must be strings.
    let strict = dir.path().join("strict-eval.json");
    let mut doc = bundled_document(SchemaKind::EvalRequest).unwrap();
    doc["properties"]["answer"] = json!({"type": "string"});
    std::fs::write(&strict, serde_json::to_vec(&doc).unwrap()).unwrap();

    std::env::set_var("SCHEMA_DIR", dir.path());
    std::env::set_var(
        "EVAL_REQUEST_SCHEMA_URL",
        format!("file://{}", strict.display()),
    );
    std::env::set_var("EVALFN_SCHEMA_TIMEOUT_SECS", "3");

    let config = RuntimeConfig::from_env();
    assert_eq!(config.schema_timeout, Duration::from_secs(3));
    assert_eq!(
        config.schemas.get(SchemaKind::EvalRequest),
        Some(&SchemaSource::Path(strict.clone()))
    );

    let rt = EvaluationRuntime::new(
        SchemaRegistry::new(&config).unwrap(),
        Capabilities::new(ExactMatch),
    );
    let response = rt
        .invoke(json!({"body": {"response": "a", "answer": 1}}))
        .await;
    assert_eq!(response["error"]["code"], "SCHEMA_VALIDATION_FAILURE");

    clear_env();
}

#[tokio::test]
#[serial]
async fn test_unconfigured_environment() {
    clear_env();

    let rt = EvaluationRuntime::from_env(Capabilities::default()).unwrap();
    let response = rt
        .invoke(json!({"body": {"response": "a", "answer": "a"}}))
        .await;
    assert_eq!(response["internal"], true);
    assert_eq!(response["error"]["code"], "SCHEMA_UNAVAILABLE");

    std::env::set_var("EVALFN_BUNDLED_SCHEMAS", "true");
    let rt = EvaluationRuntime::from_env(Capabilities::default()).unwrap();
    let response = rt
        .invoke(json!({"body": {"response": "a", "answer": "a"}}))
        .await;
    assert_eq!(response["status"], "success");

    clear_env();
}
