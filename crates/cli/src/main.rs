//! indextrack CLI - start and follow backend indexing jobs

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use indextrack::config::Config;

mod commands;
mod logging;

use commands::{
  ProjectArg, cmd_clear, cmd_config_init, cmd_config_show, cmd_id, cmd_list, cmd_resume, cmd_start, cmd_status,
};
use logging::init_logging;

#[derive(Parser)]
#[command(name = "indextrack")]
#[command(about = "Start backend indexing jobs and track them to completion")]
#[command(after_help = "\
QUICK START:
  indextrack config init          # Write a default config
  indextrack start \"Acme Mail\"    # Launch a job and follow it
  indextrack status \"Acme Mail\"   # Show the persisted state

RECOVERY:
  indextrack list                 # All tracked projects
  indextrack resume \"Acme Mail\"   # Follow a job left running by an earlier process")]
struct Cli {
  /// Config file (default: user config directory)
  #[arg(long, global = true, value_name = "PATH")]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

/// Subcommands for `indextrack config`
#[derive(Subcommand)]
pub enum ConfigCommand {
  /// Print the effective configuration
  Show,
  /// Write a default config file to the user config directory
  Init {
    /// Overwrite an existing file
    #[arg(long)]
    force: bool,
  },
}

#[derive(Subcommand)]
enum Commands {
  /// Launch an indexing job and follow it until it finishes
  Start {
    /// Project name as shown to users
    name: String,
    /// Print events as JSON lines
    #[arg(long)]
    json: bool,
  },
  /// Keep tracking a job whose state is still `indexing`
  Resume {
    #[command(flatten)]
    project: ProjectArg,
    /// Print events as JSON lines
    #[arg(long)]
    json: bool,
  },
  /// Show the tracked state of a project
  Status {
    #[command(flatten)]
    project: ProjectArg,
    /// Ask the backend instead of the local store
    #[arg(long)]
    remote: bool,
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },
  /// List every tracked project
  List {
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },
  /// Delete the tracked state of a project
  Clear {
    #[command(flatten)]
    project: ProjectArg,
  },
  /// Print the project id a name normalizes to
  Id {
    name: String,
  },
  /// Configuration management
  Config {
    #[command(subcommand)]
    command: ConfigCommand,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  let config = Config::load(cli.config.as_deref());
  let _guard = init_logging(&config.logging);

  match cli.command {
    Commands::Start { name, json } => cmd_start(&config, &name, json).await,
    Commands::Resume { project, json } => cmd_resume(&config, &project, json).await,
    Commands::Status { project, remote, json } => cmd_status(&config, &project, remote, json).await,
    Commands::List { json } => cmd_list(json).await,
    Commands::Clear { project } => cmd_clear(&project).await,
    Commands::Id { name } => cmd_id(&name),
    Commands::Config { command } => match command {
      ConfigCommand::Show => cmd_config_show(&config),
      ConfigCommand::Init { force } => cmd_config_init(force),
    },
  }
}
