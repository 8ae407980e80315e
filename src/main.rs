use anyhow::Result;
use clap::Parser;
use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

use stash::cli::Cli;
use stash::config::Config;
use stash::dispatcher;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so --json output stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.no_color || !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    let config = Config::load()?;
    dispatcher::dispatch_command(cli, config).await
}
