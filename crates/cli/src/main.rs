mod cli;
mod config;
mod scan;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    //  Logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,gguf_inspect=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Cli::parse();

    match args.command {
        cli::Commands::Info(a) => cli::info::execute(args.global, a).await,
        cli::Commands::Tensors(a) => cli::tensors::execute(args.global, a).await,
        cli::Commands::Layers(a) => cli::layers::execute(args.global, a).await,
        cli::Commands::Scan(a) => cli::scan::execute(args.global, a).await,
        cli::Commands::Config(c) => cli::config_cmd::execute(c).await,
    }
}
