use super::super::args::*;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let global = cli.global;
    match cli.cmd {
        Command::Invoke(args) => super::invoke::run(&global, args).await,
        Command::Serve => super::serve::run(&global).await,
        Command::Schemas(args) => super::schemas::run(&global, args).await,
        Command::Healthcheck(args) => super::healthcheck::run(&global, args).await,
    }
}
