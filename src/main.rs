mod app;
mod auth;
mod cache;
mod commands;
mod config;
mod error;
mod finsupp;
mod logging;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "finsupp")]
#[command(about = "Manage FinSupp accounts and transactions from the terminal")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/finsupp/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Also print logs to stderr
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: commands::Command,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;

  let _log_guard = logging::init(config.log_level.as_deref(), args.verbose)?;

  let app = app::App::new(&config)?;
  app.run(args.command).await?;

  Ok(())
}
