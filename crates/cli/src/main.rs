mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use netbuild_lib::consts::LATEST_LINK;

use crate::cmd::{cmd_run, cmd_status, cmd_verify};
use crate::output::OutputFormat;

/// netbuild - daily netboot image builds
#[derive(Parser)]
#[command(name = "netbuild")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Configuration file (default: $NETBUILD_CONFIG or $XDG_CONFIG_HOME/netbuild/config.toml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build and publish images for every configured architecture
  Run {
    /// Publish under this date instead of today (YYYY-MM-DD)
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Show published snapshots per architecture
  Status {
    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Check a snapshot against its sha256sum.txt
  Verify {
    /// Architecture name, e.g. x86_64
    arch: String,

    /// Snapshot date (YYYY-MM-DD) or "latest"
    #[arg(default_value = LATEST_LINK)]
    date: String,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "info" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let config = cli.config.as_deref();
  match cli.command {
    Commands::Run { date, output } => cmd_run(config, date, output),
    Commands::Status { output } => cmd_status(config, output),
    Commands::Verify { arch, date, output } => cmd_verify(config, &arch, &date, output),
  }
}
