use analyzer::{cli, metrics};
use anyhow::Result;
use common::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let invocation = match cli::parse_args(std::env::args()) {
        Ok(invocation) => invocation,
        Err(message) => {
            eprintln!("{message}");
            std::process::exit(2);
        }
    };
    let config = Config::load(cli::config_path(&invocation))?;

    let _otel_guard = common::observability::init("analyzer", &config.general.log_level)?;
    metrics::describe();

    cli::run_command(&config, invocation.command).await
}
