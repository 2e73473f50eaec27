//! Step instantiation.
//!
//! Once resolution is final and every running configuration is finalized,
//! each selected node becomes a [`Step`]: a source step, shared by every
//! node reading the same source directory, followed by a build step bound to
//! the node's own build directory and environment.

pub mod build;
pub mod layout;
pub mod operation;
pub mod source;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::catalogue::{BuildMethod, CatalogueError};
use crate::config::active::Environments;
use crate::context::BuildContext;
use crate::execute::command::CommandSpec;
use crate::execute::env::EnvBuilder;
use crate::graph::{NodeKey, Resolution};
use crate::placeholder::{self, PlaceholderError};

pub use build::BuildStep;
pub use layout::{NodeLayout, NodeResolver};
pub use operation::{Action, Operation};
pub use source::SourceStep;

use build::BuildPlanner;

#[derive(Debug, Error)]
pub enum InstantiateError {
  #[error(transparent)]
  Catalogue(#[from] CatalogueError),

  #[error("{node}: {source}")]
  Placeholder {
    node: NodeKey,
    #[source]
    source: PlaceholderError,
  },

  #[error("configuration {0} was not finalized")]
  MissingEnv(String),

  #[error("node {0} is not part of the resolution")]
  UnknownNode(NodeKey),

  #[error("{node}: {op} has an empty command")]
  EmptyCommand { node: NodeKey, op: String },
}

/// Placeholder substitution and command construction for one node.
pub(crate) struct Planner<'a> {
  key: &'a NodeKey,
  resolver: NodeResolver<'a>,
}

impl<'a> Planner<'a> {
  pub(crate) fn new(key: &'a NodeKey, resolver: NodeResolver<'a>) -> Self {
    Self { key, resolver }
  }

  pub(crate) fn jobs(&self) -> usize {
    self.resolver.jobs
  }

  pub(crate) fn sub(&self, input: &str) -> Result<String, InstantiateError> {
    placeholder::substitute(input, &self.resolver).map_err(|source| InstantiateError::Placeholder {
      node: self.key.clone(),
      source,
    })
  }

  pub(crate) fn sub_all(&self, args: &[String]) -> Result<Vec<String>, InstantiateError> {
    placeholder::substitute_all(args, &self.resolver).map_err(|source| InstantiateError::Placeholder {
      node: self.key.clone(),
      source,
    })
  }

  /// Build a command from a program-first argument vector.
  pub(crate) fn command(
    &self,
    argv: &[String],
    op: &str,
    cwd: &Path,
    env: EnvBuilder,
  ) -> Result<CommandSpec, InstantiateError> {
    let mut argv = self.sub_all(argv)?.into_iter();
    let program = argv.next().ok_or_else(|| InstantiateError::EmptyCommand {
      node: self.key.clone(),
      op: op.to_string(),
    })?;
    Ok(CommandSpec::new(program, cwd).args(argv).env(env))
  }
}

/// Everything the engine runs for one node.
#[derive(Debug, Clone)]
pub struct Step {
  pub key: NodeKey,
  pub layout: NodeLayout,
  pub source: Arc<SourceStep>,
  pub build: BuildStep,
  /// Dependencies of the node, in resolution order.
  pub deps: Vec<NodeKey>,
}

/// Steps in execution order.
#[derive(Debug, Clone, Default)]
pub struct Steps {
  steps: Vec<Step>,
  index: HashMap<NodeKey, usize>,
}

impl Steps {
  pub fn get(&self, key: &NodeKey) -> Option<&Step> {
    self.index.get(key).map(|&i| &self.steps[i])
  }

  pub fn iter(&self) -> impl Iterator<Item = &Step> {
    self.steps.iter()
  }

  pub fn len(&self) -> usize {
    self.steps.len()
  }

  pub fn is_empty(&self) -> bool {
    self.steps.is_empty()
  }

  pub(crate) fn push(&mut self, step: Step) {
    self.index.insert(step.key.clone(), self.steps.len());
    self.steps.push(step);
  }
}

/// Bind every node of `nodes` to its source and build operations.
///
/// Layouts are computed for the whole resolution so `node:` placeholders can
/// reach siblings that were pruned from `nodes`.
pub fn instantiate(
  ctx: &BuildContext,
  resolution: &Resolution,
  envs: &Environments,
  nodes: &[NodeKey],
) -> Result<Steps, InstantiateError> {
  let mut layouts = HashMap::new();
  for key in &resolution.order {
    let def = ctx.catalogue.get(&key.component)?;
    let env = envs
      .get(&key.config)
      .ok_or_else(|| InstantiateError::MissingEnv(key.config.clone()))?;
    layouts.insert(
      key.clone(),
      NodeLayout::compute(key, def, env, &ctx.host.dirs, &ctx.options),
    );
  }

  let mut sources: HashMap<PathBuf, Arc<SourceStep>> = HashMap::new();
  let mut steps = Steps::default();

  for key in nodes {
    let def = ctx.catalogue.get(&key.component)?;
    let env = envs
      .get(&key.config)
      .ok_or_else(|| InstantiateError::MissingEnv(key.config.clone()))?;
    let layout = match layouts.get(key) {
      Some(layout) => layout,
      None => return Err(InstantiateError::UnknownNode(key.clone())),
    };
    let planner = Planner::new(
      key,
      NodeResolver {
        layout,
        layouts: &layouts,
        jobs: ctx.options.jobs,
      },
    );

    let source = match sources.get(&layout.source_dir) {
      Some(shared) => Arc::clone(shared),
      None => {
        let step = Arc::new(SourceStep::plan(def, layout, &planner, &ctx.host, &ctx.options)?);
        sources.insert(layout.source_dir.clone(), Arc::clone(&step));
        step
      }
    };

    let deps: Vec<NodeKey> = resolution.dependencies(key).into_iter().cloned().collect();
    let merge_inputs = if matches!(def.build.method, BuildMethod::MergeLibs { .. }) {
      merge_inputs(ctx, &deps, &layouts)
    } else {
      Vec::new()
    };

    let planner = BuildPlanner {
      def,
      layout,
      env,
      host: &ctx.host,
      planner: &planner,
      merge_inputs,
    };
    let build = if ctx.options.make_dist && resolution.is_root(key) {
      planner.dist_ops()?
    } else {
      planner.ops()?
    };

    debug!(
      node = %key,
      source_ops = source.ops.len(),
      build_ops = build.ops.len(),
      "instantiated step"
    );
    steps.push(Step {
      key: key.clone(),
      layout: layout.clone(),
      source,
      build,
      deps,
    });
  }

  Ok(steps)
}

/// Install directories of the non-toolchain dependencies, without repeats.
fn merge_inputs(ctx: &BuildContext, deps: &[NodeKey], layouts: &HashMap<NodeKey, NodeLayout>) -> Vec<PathBuf> {
  let mut inputs: Vec<PathBuf> = Vec::new();
  for dep in deps {
    let is_toolchain = ctx
      .catalogue
      .get(&dep.component)
      .map(|def| def.is_toolchain())
      .unwrap_or(false);
    if is_toolchain {
      continue;
    }
    if let Some(layout) = layouts.get(dep)
      && !inputs.contains(&layout.install_dir)
    {
      inputs.push(layout.install_dir.clone());
    }
  }
  inputs
}
