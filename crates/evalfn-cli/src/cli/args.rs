use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "evalfn",
    version,
    about = "Run evaluation function invocations: command routing, schema validation and response envelopes"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Handle one invocation event and print the response
    Invoke(InvokeArgs),
    /// Handle newline-delimited events from stdin, one response per line
    Serve,
    /// Load every configured schema and report availability
    Schemas(SchemasArgs),
    /// Run the healthcheck suites
    Healthcheck(HealthcheckArgs),
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalArgs {
    /// Directory holding request/*.json and response/*.json schemas
    #[arg(long, global = true)]
    pub schema_dir: Option<PathBuf>,

    /// Directory holding user.md and dev.md
    #[arg(long, global = true, default_value = "docs", env = "EVALFN_DOCS_DIR")]
    pub docs_dir: PathBuf,

    /// Serve the bundled schemas for kinds without a configured source
    #[arg(long, global = true)]
    pub bundled_schemas: bool,

    /// Upper bound in seconds on loading one schema
    #[arg(long, global = true)]
    pub schema_timeout_secs: Option<u64>,

    /// Log output format (logs go to stderr)
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text, env = "EVALFN_LOG_FORMAT")]
    pub log_format: LogFormat,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(clap::Args, Clone, Debug)]
pub struct InvokeArgs {
    /// Event file; reads stdin when omitted or "-"
    #[arg(long, short = 'e')]
    pub event: Option<PathBuf>,

    /// Pretty-print the response
    #[arg(long)]
    pub pretty: bool,
}

#[derive(clap::Args, Clone, Debug)]
pub struct SchemasArgs {
    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(clap::Args, Clone, Debug)]
pub struct HealthcheckArgs {
    /// Pretty-print the response
    #[arg(long)]
    pub pretty: bool,
}
