mod cmd;
mod util;

use std::path::PathBuf;

use argp::FromArgs;
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

#[derive(FromArgs, PartialEq, Debug)]
/// Clio README generation jobs.
struct TopLevel {
    #[argp(subcommand)]
    command: SubCommand,
    #[argp(option, short = 'c', global)]
    /// config file (default: config.yml)
    config: Option<PathBuf>,
}

#[derive(FromArgs, PartialEq, Debug)]
#[argp(subcommand)]
enum SubCommand {
    Tick(cmd::tick::Args),
    Enqueue(cmd::enqueue::Args),
    Show(cmd::show::Args),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: TopLevel = argp::parse_args_or_exit(argp::DEFAULT);
    let config = args.config.unwrap_or_else(|| PathBuf::from("config.yml"));
    let result = match args.command {
        SubCommand::Tick(c_args) => cmd::tick::run(&config, c_args).await,
        SubCommand::Enqueue(c_args) => cmd::enqueue::run(&config, c_args).await,
        SubCommand::Show(c_args) => cmd::show::run(&config, c_args).await,
    };
    if let Err(e) = result {
        eprintln!("Failed: {e:?}");
        std::process::exit(1);
    }
}
