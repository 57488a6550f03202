use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::tempdir;

const SCHEMA_VARS: [&str; 8] = [
    "SCHEMA_DIR",
    "EVAL_REQUEST_SCHEMA_URL",
    "EVAL_RESPONSE_SCHEMA_URL",
    "PREVIEW_REQUEST_SCHEMA_URL",
    "PREVIEW_RESPONSE_SCHEMA_URL",
    "HEALTH_RESPONSE_SCHEMA_URL",
    "EVALFN_BUNDLED_SCHEMAS",
    "EVALFN_DOCS_DIR",
];

fn evalfn() -> Command {
    let mut cmd = Command::cargo_bin("evalfn").unwrap();
    for var in SCHEMA_VARS {
        cmd.env_remove(var);
    }
    cmd.env("RUST_LOG", "warn");
    cmd
}

fn stdout_json(output: &std::process::Output) -> Value {
    let text = String::from_utf8(output.stdout.clone()).unwrap();
    serde_json::from_str(text.trim()).expect("stdout is not a single JSON document")
}

#[test]
fn invoke_eval_from_stdin() {
    let output = evalfn()
        .args(["invoke", "--bundled-schemas"])
        .write_stdin(r#"{"headers": {"command": "eval"}, "body": {"response": "42", "answer": "42"}}"#)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    let response = stdout_json(&output);
    assert_eq!(response["command"], "eval");
    assert_eq!(response["result"]["is_correct"], true);
}

#[test]
fn invoke_event_file() {
    let dir = tempdir().unwrap();
    let event = dir.path().join("event.json");
    fs::write(
        &event,
        r#"{"headers": {"command": "preview"}, "body": {"response": "x"}}"#,
    )
    .unwrap();

    let output = evalfn()
        .args(["invoke", "--bundled-schemas", "--event"])
        .arg(&event)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout_json(&output)["result"]["preview"], "x");
}

#[test]
fn unknown_command_exits_with_failure() {
    evalfn()
        .args(["invoke", "--bundled-schemas"])
        .write_stdin(r#"{"headers": {"command": "grade-all"}, "body": {}}"#)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("UNKNOWN_COMMAND"))
        .stdout(predicate::str::contains("Unknown command 'grade-all'."));
}

#[test]
fn missing_schemas_are_internal() {
    evalfn()
        .args(["invoke"])
        .write_stdin(r#"{"body": {"response": "a", "answer": "a"}}"#)
        .assert()
        .code(2)
        .stdout(predicate::str::contains("SCHEMA_UNAVAILABLE"))
        .stdout(predicate::str::contains("\"internal\":true"));
}

#[test]
fn malformed_event_is_a_setup_error() {
    evalfn()
        .args(["invoke", "--bundled-schemas"])
        .write_stdin("{not json")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("event is not valid JSON"));
}

#[test]
fn serve_answers_every_line() {
    let input = concat!(
        r#"{"body": {"response": 1, "answer": 1}}"#,
        "\n\n",
        "garbage\n",
        r#"{"headers": {"command": "docs-user"}}"#,
        "\n",
    );
    let output = evalfn()
        .args(["serve", "--bundled-schemas"])
        .write_stdin(input)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    let lines: Vec<Value> = String::from_utf8(output.stdout)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["status"], "success");
    assert_eq!(lines[1]["error"]["code"], "PARSE_ERROR");
    assert_eq!(lines[2]["error"]["code"], "DOCS_NOT_FOUND");
}

#[test]
fn serve_validates_rejections_like_other_responses() {
    let output = evalfn()
        .args(["serve"])
        .write_stdin("garbage\n")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    let line: Value = serde_json::from_str(String::from_utf8(output.stdout).unwrap().trim()).unwrap();
    assert_eq!(line["internal"], true);
    assert_eq!(line["error"]["code"], "SCHEMA_UNAVAILABLE");
}

#[test]
fn docs_are_served_from_docs_dir() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("dev.md"), "dev notes").unwrap();

    let output = evalfn()
        .args(["invoke", "--bundled-schemas", "--docs-dir"])
        .arg(dir.path())
        .write_stdin(r#"{"headers": {"command": "docs"}}"#)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    let response = stdout_json(&output);
    assert_eq!(response["statusCode"], 200);
    assert_eq!(response["isBase64Encoded"], true);
    assert_eq!(response["body"], "ZGV2IG5vdGVz");
}

#[test]
fn schemas_report_lists_every_kind() {
    let output = evalfn()
        .args(["schemas", "--json", "--bundled-schemas"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    let report = stdout_json(&output);
    let entries = report["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 5);
    assert!(entries.iter().all(|e| e["available"] == true));
}

#[test]
fn schemas_report_flags_missing_files() {
    let dir = tempdir().unwrap();
    evalfn()
        .args(["schemas", "--schema-dir"])
        .arg(dir.path())
        .assert()
        .code(2)
        .stdout(predicate::str::contains("unavailable"));
}

#[test]
fn healthcheck_passes_with_bundled_schemas() {
    let docs = tempdir().unwrap();
    fs::write(docs.path().join("user.md"), "user").unwrap();
    fs::write(docs.path().join("dev.md"), "dev").unwrap();

    let output = evalfn()
        .args(["healthcheck", "--bundled-schemas", "--docs-dir"])
        .arg(docs.path())
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    let response = stdout_json(&output);
    assert_eq!(response["command"], "healthcheck");
    assert_eq!(response["result"]["tests_passed"], true);
}

#[test]
fn healthcheck_fails_without_docs() {
    let docs = tempdir().unwrap();
    let output = evalfn()
        .args(["healthcheck", "--bundled-schemas", "--docs-dir"])
        .arg(docs.path())
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let response = stdout_json(&output);
    assert_eq!(response["status"], "success");
    assert_eq!(response["result"]["tests_passed"], false);
}

#[test]
fn logs_stay_off_stdout() {
    let output = evalfn()
        .env("RUST_LOG", "debug")
        .args(["invoke", "--bundled-schemas", "--log-format", "json"])
        .write_stdin(r#"{"body": {"response": 1, "answer": 2}}"#)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout_json(&output)["result"]["is_correct"], false);
    assert!(!output.stderr.is_empty());
}
