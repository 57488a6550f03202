//! Line-oriented host loop.
//!
//! Each stdin line is one event; each event produces exactly one stdout
//! line. The runtime, and with it the schema cache, lives for the whole
//! session.

use anyhow::Context;
use evalfn_core::HandlerError;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use super::build_runtime;
use crate::cli::args::GlobalArgs;
use crate::exit_codes::EXIT_SUCCESS;

pub async fn run(global: &GlobalArgs) -> anyhow::Result<i32> {
    let runtime = build_runtime(global)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut handled = 0usize;

    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Value>(&line) {
            Ok(event) => runtime.respond(event).await,
            Err(e) => {
                warn!(error = %e, "skipping event that is not valid JSON");
                runtime.reject(unreadable_event(&e)).await
            }
        };

        let mut out = serde_json::to_vec(&response).context("failed to serialize response")?;
        out.push(b'\n');
        stdout.write_all(&out).await.context("failed to write stdout")?;
        stdout.flush().await.context("failed to flush stdout")?;
        handled += 1;
    }

    info!(events = handled, "input closed");
    Ok(EXIT_SUCCESS)
}

fn unreadable_event(err: &serde_json::Error) -> HandlerError {
    HandlerError::Parse {
        message: "Event is not valid JSON.".to_string(),
        detail: Some(json!({
            "message": err.to_string(),
            "location": {"line": err.line(), "column": err.column()},
        })),
    }
}
