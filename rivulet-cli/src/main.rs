//! Rivulet CLI - Command-line interface
//!
//! Serves a local directory as a torrent over a simulated swarm, or prints
//! the piece layout such a torrent would have.

mod commands;

use clap::Parser;
use rivulet_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "rivulet")]
#[command(about = "Selective streaming of partially downloaded torrents")]
struct Cli {
    /// Console log level; the log file always records everything
    #[arg(long, global = true, value_enum, default_value_t = CliLogLevel::Info)]
    log_level: CliLogLevel,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_tracing_level(), None)?;

    commands::handle_command(cli.command).await?;

    Ok(())
}
