use std::path::Path;

use anyhow::Context;
use serde_json::Value;
use tokio::io::AsyncReadExt;

use super::{build_runtime, exit_code_for, render};
use crate::cli::args::{GlobalArgs, InvokeArgs};

pub async fn run(global: &GlobalArgs, args: InvokeArgs) -> anyhow::Result<i32> {
    let raw = match args.event.as_deref() {
        Some(path) if path != Path::new("-") => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read event from {}", path.display()))?,
        _ => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("failed to read event from stdin")?;
            buf
        }
    };
    let event: Value = serde_json::from_str(&raw).context("event is not valid JSON")?;

    let runtime = build_runtime(global)?;
    let response = runtime.respond(event).await;

    println!("{}", render(&response.to_value(), args.pretty)?);
    Ok(exit_code_for(&response))
}
