mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{BuildArgs, ListKind, TargetArgs, cmd_build, cmd_graph, cmd_info, cmd_list, cmd_plan};
use output::{OutputFormat, print_error};

/// crossbuild - dependency-ordered builds of native libraries for many targets
#[derive(Parser)]
#[command(name = "xb")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Stream tool output instead of writing per-operation logs (-v), and log more (-vv)
  #[arg(short, long, global = true, action = ArgAction::Count)]
  verbose: u8,

  /// Root of the working tree (SOURCE, ARCHIVE, BUILD_<config>...)
  #[arg(short = 'w', long, global = true, default_value = "BUILD", env = "CROSSBUILD_WORKING_DIR")]
  working_dir: PathBuf,

  /// JSON file of extra component recipes
  #[arg(long, global = true, env = "CROSSBUILD_CATALOGUE")]
  catalogue: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build a component and its dependencies
  Build(BuildArgs),

  /// Show the resolved order and the operations of every node without running them
  Plan {
    #[command(flatten)]
    target: TargetArgs,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Print the resolved dependency graph in DOT
  Graph {
    #[command(flatten)]
    target: TargetArgs,
  },

  /// Show the host, its library prefix and the tools found
  Info {
    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// List known components or configurations
  List {
    #[arg(value_enum)]
    kind: ListKind,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },
}

fn init_logging(verbose: u8) {
  let default = match verbose {
    0 => "warn",
    1 => "info",
    _ => "debug",
  };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
  let catalogue = cli.catalogue.as_ref();
  match &cli.command {
    Commands::Build(args) => {
      let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
      let status = rt.block_on(cmd_build(args, &cli.working_dir, catalogue, cli.verbose > 0))?;
      match status {
        cmd::BuildStatus::Success => Ok(ExitCode::SUCCESS),
        cmd::BuildStatus::Stopped => {
          print_error("Stopping build due to errors");
          Ok(ExitCode::FAILURE)
        }
      }
    }
    Commands::Plan { target, output } => {
      cmd_plan(target, &cli.working_dir, catalogue, *output)?;
      Ok(ExitCode::SUCCESS)
    }
    Commands::Graph { target } => {
      cmd_graph(target, &cli.working_dir, catalogue)?;
      Ok(ExitCode::SUCCESS)
    }
    Commands::Info { output } => {
      cmd_info(&cli.working_dir, *output)?;
      Ok(ExitCode::SUCCESS)
    }
    Commands::List { kind, output } => {
      cmd_list(*kind, &cli.working_dir, catalogue, *output)?;
      Ok(ExitCode::SUCCESS)
    }
  }
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_logging(cli.verbose);

  match run(cli) {
    Ok(code) => code,
    Err(err) => {
      print_error(&format!("{err:#}"));
      ExitCode::FAILURE
    }
  }
}
