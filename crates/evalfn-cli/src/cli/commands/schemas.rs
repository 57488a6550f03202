use anyhow::Context;

use super::build_runtime;
use crate::cli::args::{GlobalArgs, SchemasArgs};
use crate::exit_codes::{EXIT_INTERNAL_ERROR, EXIT_SUCCESS};

pub async fn run(global: &GlobalArgs, args: SchemasArgs) -> anyhow::Result<i32> {
    let runtime = build_runtime(global)?;
    let report = runtime.registry().preload().await;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("failed to serialize report")?
        );
    } else {
        for entry in &report.entries {
            let status = if entry.available { "ok" } else { "unavailable" };
            println!(
                "{:<26} {:<12} {}",
                entry.kind.label(),
                status,
                entry.source.as_deref().unwrap_or("-")
            );
            if let Some(err) = &entry.error {
                println!("{:<26} {}", "", err);
            }
        }
    }

    Ok(if report.all_available() {
        EXIT_SUCCESS
    } else {
        EXIT_INTERNAL_ERROR
    })
}
