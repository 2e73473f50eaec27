//! Implementation of the `xb build` command.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Args;
use tracing::info;

use crossbuild_lib::builder::{BuildError, Builder};
use crossbuild_lib::consts::REMOTE_PREFIX_ENV_VAR;
use crossbuild_lib::execute::OpOutcome;
use crossbuild_lib::execute::command::SystemRunner;

use super::{TargetArgs, base_options, load_context};
use crate::output::{ConsoleProgress, print_stat, print_success, print_warning};

#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
  #[command(flatten)]
  pub target: TargetArgs,

  /// Library directory relative to the install prefix (default: detected)
  #[arg(long)]
  pub libprefix: Option<String>,

  /// Directory holding patches applied to archive sources
  #[arg(long)]
  pub patches_dir: Option<PathBuf>,

  /// Do not fetch, extract or patch sources
  #[arg(long)]
  pub skip_source_prepare: bool,

  /// Check and install host packages even if done before
  #[arg(long, conflicts_with = "dont_install_packages")]
  pub force_install_packages: bool,

  /// Assume host packages are installed; never check or install them
  #[arg(long)]
  pub dont_install_packages: bool,

  /// Remove intermediate build files once everything is installed
  #[arg(long)]
  pub clean_at_end: bool,

  /// Parallel jobs passed to make and friends
  #[arg(short, long)]
  pub jobs: Option<usize>,

  /// Base url of archives without an explicit url
  #[arg(long, env = REMOTE_PREFIX_ENV_VAR)]
  pub remote_prefix: Option<String>,
}

/// Outcome of the build command, for the exit code.
pub enum BuildStatus {
  Success,
  /// An external tool failed; the log has been printed.
  Stopped,
}

pub async fn cmd_build(
  args: &BuildArgs,
  working_dir: &Path,
  catalogue: Option<&PathBuf>,
  verbose: bool,
) -> Result<BuildStatus> {
  let mut options = base_options(working_dir)?;
  args.target.apply(&mut options);
  options.verbose = verbose;
  options.libprefix = args.libprefix.clone();
  if let Some(dir) = &args.patches_dir {
    options.patches_dir = dir.clone();
  }
  options.skip_source_prepare = args.skip_source_prepare;
  options.force_install_packages = args.force_install_packages;
  options.dont_install_packages = args.dont_install_packages;
  options.clean_at_end = args.clean_at_end;
  if let Some(jobs) = args.jobs {
    options.jobs = jobs.max(1);
  }
  if let Some(prefix) = &args.remote_prefix {
    options.remote_prefix = prefix.clone();
  }

  let ctx = load_context(options, catalogue)?;
  let runner = SystemRunner::new();
  let progress = ConsoleProgress::new();
  let started = Instant::now();

  let summary = match Builder::new(&ctx, &runner, &progress).run().await {
    Ok(summary) => summary,
    Err(err @ BuildError::Execute(_)) if err.is_stop_build() => {
      info!(error = %err, "build stopped");
      return Ok(BuildStatus::Stopped);
    }
    Err(err) => return Err(err.into()),
  };

  for (config, outcome) in &summary.packages.configs {
    if let OpOutcome::Warning(message) = outcome {
      print_warning(&format!("{config}: {message}"));
    }
  }

  let elapsed = Duration::from_secs(started.elapsed().as_secs());
  println!();
  print_success(&format!("Built {} ({})", ctx.options.target, ctx.options.config));
  print_stat("Nodes", &summary.selected.len().to_string());
  print_stat("Satisfied by packages", &summary.packages.satisfied.len().to_string());
  print_stat("Operations run", &summary.report.executed_ops().len().to_string());
  print_stat("Commands spawned", &summary.report.invocations.to_string());
  print_stat("Elapsed", &humantime::format_duration(elapsed).to_string());

  Ok(BuildStatus::Success)
}
