//! Implementation of the `xb graph` command: the resolved graph in DOT.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crossbuild_lib::builder::Builder;
use crossbuild_lib::execute::command::SystemRunner;
use crossbuild_lib::execute::progress::SilentProgress;

use super::{TargetArgs, base_options, load_context};

pub fn cmd_graph(target: &TargetArgs, working_dir: &Path, catalogue: Option<&PathBuf>) -> Result<()> {
  let mut options = base_options(working_dir)?;
  target.apply(&mut options);
  let ctx = load_context(options, catalogue)?;

  let runner = SystemRunner::new();
  let resolution = Builder::new(&ctx, &runner, &SilentProgress)
    .resolve()
    .context("Failed to resolve dependencies")?;
  print!("{}", resolution.to_dot());
  Ok(())
}
