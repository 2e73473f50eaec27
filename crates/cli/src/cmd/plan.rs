//! Implementation of the `xb plan` command.
//!
//! Resolves and instantiates the requested build, then prints the node order
//! and every operation each node would run. Nothing is executed and host
//! packages are not consulted.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use owo_colors::{OwoColorize, Stream};
use serde::Serialize;

use crossbuild_lib::builder::Builder;
use crossbuild_lib::execute::command::SystemRunner;
use crossbuild_lib::execute::progress::SilentProgress;
use crossbuild_lib::step::{Operation, Step};

use super::{TargetArgs, base_options, load_context};
use crate::output::{OutputFormat, print_info, print_json, print_stat};

#[derive(Serialize)]
struct PlannedOp {
  name: String,
  marker: Option<String>,
  actions: Vec<String>,
}

#[derive(Serialize)]
struct PlannedNode {
  config: String,
  component: String,
  deps: Vec<String>,
  source_dir: String,
  build_dir: String,
  source: Vec<PlannedOp>,
  build: Vec<PlannedOp>,
}

fn planned_ops(ops: &[Operation]) -> Vec<PlannedOp> {
  ops
    .iter()
    .map(|op| PlannedOp {
      name: op.name.clone(),
      marker: op.marker.as_ref().map(|m| m.path().display().to_string()),
      actions: op.describe(),
    })
    .collect()
}

fn planned_node(step: &Step) -> PlannedNode {
  PlannedNode {
    config: step.key.config.clone(),
    component: step.key.component.clone(),
    deps: step.deps.iter().map(ToString::to_string).collect(),
    source_dir: step.layout.source_dir.display().to_string(),
    build_dir: step.layout.build_dir.display().to_string(),
    source: planned_ops(&step.source.ops),
    build: planned_ops(&step.build.ops),
  }
}

fn print_ops(title: &str, ops: &[PlannedOp]) {
  if ops.is_empty() {
    return;
  }
  println!("  {}:", title.if_supports_color(Stream::Stdout, |s| s.dimmed()));
  for op in ops {
    println!("    {}", op.name.if_supports_color(Stream::Stdout, |s| s.bold()));
    for action in &op.actions {
      println!("      {action}");
    }
  }
}

pub fn cmd_plan(target: &TargetArgs, working_dir: &Path, catalogue: Option<&PathBuf>, output: OutputFormat) -> Result<()> {
  let mut options = base_options(working_dir)?;
  target.apply(&mut options);
  let ctx = load_context(options, catalogue)?;

  let runner = SystemRunner::new();
  let plan = Builder::new(&ctx, &runner, &SilentProgress)
    .plan()
    .context("Failed to plan build")?;
  let nodes: Vec<PlannedNode> = plan.steps.iter().map(planned_node).collect();

  if output.is_json() {
    return print_json(&nodes);
  }

  print_info(&format!("Plan for {} ({})", target.target, target.config));
  print_stat("Configurations", &plan.resolution.configs.join(", "));
  print_stat("Nodes", &nodes.len().to_string());
  for node in &nodes {
    println!();
    println!("{}/{}", node.config, node.component);
    if !node.deps.is_empty() {
      println!("  deps: {}", node.deps.join(", "));
    }
    print_ops("source", &node.source);
    print_ops("build", &node.build);
  }
  Ok(())
}
