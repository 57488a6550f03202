use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{panic_message, OperationHandler};
use crate::capability::{TestCase, TestSuite};
use crate::envelope::{to_json, Payload};
use crate::error::{HandlerError, HandlerResult};
use crate::request::Request;
use crate::schema::SchemaKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    /// The check returned an error.
    Failed,
    /// The check panicked.
    Errored,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub name: String,
    pub suite: String,
    pub status: TestStatus,
    /// Wall time in microseconds; absent when the test errored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Aggregate of every executed test, in execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub tests_passed: bool,
    pub tests: Vec<TestOutcome>,
}

impl TestSuiteResult {
    pub fn failed(&self) -> impl Iterator<Item = &TestOutcome> {
        self.tests.iter().filter(|t| t.status != TestStatus::Passed)
    }
}

/// Runs the built-in and user-supplied test suites.
pub struct HealthcheckHandler {
    suites: Vec<Arc<dyn TestSuite>>,
}

impl HealthcheckHandler {
    pub fn new(suites: Vec<Arc<dyn TestSuite>>) -> Self {
        Self { suites }
    }
}

#[async_trait]
impl OperationHandler for HealthcheckHandler {
    type Input = ();
    type Output = TestSuiteResult;

    // The body is ignored.
    async fn validate_input(&self, _request: &Request) -> HandlerResult<()> {
        Ok(())
    }

    async fn execute(&self, _input: ()) -> HandlerResult<TestSuiteResult> {
        let mut tests = Vec::new();

        for suite in &self.suites {
            let cases = suite
                .load()
                .await
                .map_err(|reason| HandlerError::TestSuiteExecution {
                    suite: suite.name().to_string(),
                    reason,
                })?;

            debug!(suite = suite.name(), tests = cases.len(), "running test suite");
            for case in cases {
                tests.push(run_case(suite.name(), case).await);
            }
        }

        let result = TestSuiteResult {
            tests_passed: tests.iter().all(|t| t.status == TestStatus::Passed),
            tests,
        };
        info!(
            passed = result.tests_passed,
            total = result.tests.len(),
            failed = result.failed().count(),
            "healthcheck finished"
        );
        Ok(result)
    }

    fn build_output(&self, output: TestSuiteResult) -> HandlerResult<Payload> {
        to_json(&output, SchemaKind::HealthResponse).map(Payload::Result)
    }
}

async fn run_case(suite: &str, case: TestCase) -> TestOutcome {
    let name = case.name().to_string();
    let joined = tokio::task::spawn_blocking(move || {
        let started = Instant::now();
        let outcome = case.run();
        (outcome, started.elapsed())
    })
    .await;

    let (status, time, message) = match joined {
        Ok((Ok(()), elapsed)) => (TestStatus::Passed, Some(micros(elapsed)), None),
        Ok((Err(err), elapsed)) => (
            TestStatus::Failed,
            Some(micros(elapsed)),
            Some(format!("{err:#}")),
        ),
        Err(join_err) => {
            let message = if join_err.is_panic() {
                panic_message(join_err.into_panic().as_ref())
            } else {
                join_err.to_string()
            };
            (TestStatus::Errored, None, Some(message))
        }
    };

    debug!(suite, test = %name, status = ?status, "test finished");
    TestOutcome {
        name,
        suite: suite.to_string(),
        status,
        time,
        message,
    }
}

fn micros(elapsed: std::time::Duration) -> u64 {
    u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX)
}
