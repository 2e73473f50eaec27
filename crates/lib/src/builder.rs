//! Build orchestration.
//!
//! A run goes through these phases, each announced through [`Progress`]:
//!
//! 1. resolve the requested `(config, component)` into an ordered node list
//! 2. `SETUP CONFIGS`: finalize every running configuration
//! 3. `INSTALL PACKAGES`: drop nodes satisfied by host packages
//! 4. `SELECT`: apply `build_nodeps` / `build_deps_only`
//! 5. `PREPARE` and `BUILD`: run the steps through the [`Engine`]
//! 6. `CLEAN`: remove intermediate files when `clean_at_end` is set
//!
//! Resolution and configuration errors surface before any subprocess runs.

use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::ConfigError;
use crate::config::active::{Environments, finalize};
use crate::context::BuildContext;
use crate::execute::command::CommandRunner;
use crate::execute::progress::Progress;
use crate::execute::{Engine, ExecuteError, RunReport};
use crate::graph::{NodeKey, Resolution, ResolveError, Resolver};
use crate::packages::{HostPackages, PackageError, PackageReport, install_packages};
use crate::step::{InstantiateError, Steps, instantiate};

#[derive(Debug, Error)]
pub enum BuildError {
  #[error(transparent)]
  Resolve(#[from] ResolveError),

  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Instantiate(#[from] InstantiateError),

  #[error("package installation failed: {0}")]
  Packages(#[from] PackageError),

  #[error(transparent)]
  Execute(#[from] ExecuteError),

  #[error("io error on {path}: {source}")]
  Io {
    path: std::path::PathBuf,
    #[source]
    source: std::io::Error,
  },
}

impl BuildError {
  /// Whether an external tool failed, as opposed to a setup problem.
  pub fn is_stop_build(&self) -> bool {
    matches!(self, Self::Execute(e) if e.is_stop_build())
  }
}

/// Resolved and instantiated work, before anything runs.
#[derive(Debug)]
pub struct Plan {
  pub resolution: Resolution,
  pub envs: Environments,
  /// Nodes that will run, in order.
  pub selected: Vec<NodeKey>,
  pub steps: Steps,
}

/// What a completed run did.
#[derive(Debug)]
pub struct BuildSummary {
  pub resolution: Resolution,
  pub packages: PackageReport,
  pub selected: Vec<NodeKey>,
  pub report: RunReport,
}

/// Nodes to run: `order` minus `satisfied`, narrowed by the selection options.
pub fn select(resolution: &Resolution, satisfied: &dyn Fn(&NodeKey) -> bool, nodeps: bool, deps_only: bool) -> Vec<NodeKey> {
  resolution
    .order
    .iter()
    .filter(|key| !satisfied(key))
    .filter(|key| !nodeps || resolution.is_root(key))
    .filter(|key| !deps_only || !resolution.is_root(key))
    .cloned()
    .collect()
}

/// Remove everything in `build_dir` except `install_dir`.
fn clean_intermediate(build_dir: &Path, install_dir: &Path) -> Result<(), BuildError> {
  let clean_err = |path: &Path, source| BuildError::Io {
    path: path.to_path_buf(),
    source,
  };
  let entries = match fs::read_dir(build_dir) {
    Ok(entries) => entries,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
    Err(e) => return Err(clean_err(build_dir, e)),
  };
  for entry in entries {
    let entry = entry.map_err(|e| clean_err(build_dir, e))?;
    let path = entry.path();
    if path == install_dir {
      continue;
    }
    let file_type = entry.file_type().map_err(|e| clean_err(&path, e))?;
    let removed = if file_type.is_dir() {
      fs::remove_dir_all(&path)
    } else {
      fs::remove_file(&path)
    };
    removed.map_err(|e| clean_err(&path, e))?;
  }
  Ok(())
}

/// Drives one requested build.
pub struct Builder<'a, R: CommandRunner> {
  ctx: &'a BuildContext,
  runner: &'a R,
  progress: &'a dyn Progress,
}

impl<'a, R: CommandRunner> Builder<'a, R> {
  pub fn new(ctx: &'a BuildContext, runner: &'a R, progress: &'a dyn Progress) -> Self {
    Self { ctx, runner, progress }
  }

  pub fn resolve(&self) -> Result<Resolution, BuildError> {
    let ctx = self.ctx;
    let resolution = Resolver::new(&ctx.catalogue, &ctx.configs, &ctx.host.system, &ctx.options)
      .resolve(&ctx.options.config, &ctx.options.target)?;
    Ok(resolution)
  }

  fn setup_configs(&self, resolution: &Resolution) -> Result<Environments, BuildError> {
    let ctx = self.ctx;
    let defs = resolution
      .configs
      .iter()
      .map(|name| ctx.configs.get(name))
      .collect::<Result<Vec<_>, _>>()?;
    Ok(finalize(&defs, &ctx.catalogue, &ctx.host)?)
  }

  /// Resolve and instantiate without touching packages or running anything.
  ///
  /// Every node not excluded by the selection options is listed, including
  /// nodes a host package might satisfy.
  pub fn plan(&self) -> Result<Plan, BuildError> {
    let options = &self.ctx.options;
    let resolution = self.resolve()?;
    let envs = self.setup_configs(&resolution)?;
    let selected = select(&resolution, &|_| false, options.build_nodeps, options.build_deps_only);
    let steps = instantiate(self.ctx, &resolution, &envs, &selected)?;
    Ok(Plan {
      resolution,
      envs,
      selected,
      steps,
    })
  }

  /// Run every phase.
  pub async fn run(&self) -> Result<BuildSummary, BuildError> {
    let ctx = self.ctx;
    let options = &ctx.options;
    info!(target = %options.target, config = %options.config, "starting build");

    let resolution = self.resolve()?;
    debug!(order = ?resolution.order, "resolved");

    self.progress.phase("SETUP CONFIGS");
    let envs = self.setup_configs(&resolution)?;

    self.progress.phase("INSTALL PACKAGES");
    ctx.host.dirs.create().map_err(|e| BuildError::Io {
      path: ctx.host.dirs.root.clone(),
      source: e,
    })?;
    let manager = HostPackages::new(&ctx.host.system, self.runner, self.progress, &ctx.host.dirs);
    let packages = install_packages(ctx, &resolution, &manager, self.progress).await?;
    for (config, outcome) in &packages.configs {
      self.progress.message(&format!("{config}: {outcome}"));
    }

    self.progress.phase("SELECT");
    let selected = select(
      &resolution,
      &|key| packages.satisfied.contains(key),
      options.build_nodeps,
      options.build_deps_only,
    );
    info!(selected = selected.len(), satisfied = packages.satisfied.len(), "selected nodes");
    let steps = instantiate(ctx, &resolution, &envs, &selected)?;

    let engine = Engine::new(self.runner, self.progress, &ctx.host.dirs)
      .verbose(options.verbose)
      .skip_source_prepare(options.skip_source_prepare);
    let report = engine.run(&steps).await?;

    self.progress.phase("CLEAN");
    if options.clean_at_end {
      for env in envs.iter() {
        debug!(build_dir = %env.build_dir.display(), "cleaning intermediate files");
        clean_intermediate(&env.build_dir, &env.install_dir)?;
      }
    } else {
      self.progress.message("SKIP");
    }

    Ok(BuildSummary {
      resolution,
      packages,
      selected,
      report,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::execute::OpOutcome;
  use crate::options::BuildOptions;
  use crate::util::testutil::{RecordingProgress, RecordingRunner, Workspace, script_component};

  fn workspace(options: BuildOptions) -> Workspace {
    // Mapped packages are assumed present, so zlib is never built.
    Workspace::new(
      BuildOptions {
        target: "tools".to_string(),
        config: "native_dyn".to_string(),
        dont_install_packages: true,
        ..options
      },
      vec![
        script_component("core", &[]),
        script_component("tools", &["core", "zlib"]),
      ],
    )
  }

  fn key(component: &str) -> NodeKey {
    NodeKey::new("native_dyn", component)
  }

  #[tokio::test]
  async fn run_announces_phases_and_skips_satisfied_nodes() {
    let ws = workspace(BuildOptions::default());
    let runner = RecordingRunner::new();
    let progress = RecordingProgress::default();

    let summary = Builder::new(&ws.ctx, &runner, &progress).run().await.unwrap();

    assert_eq!(
      *progress.phases.borrow(),
      vec!["SETUP CONFIGS", "INSTALL PACKAGES", "SELECT", "PREPARE", "BUILD", "CLEAN"]
    );
    assert!(summary.packages.satisfied.contains(&key("zlib")));
    assert_eq!(summary.selected, vec![key("core"), key("tools")]);
    assert_eq!(summary.report.outcome(&key("tools"), "install"), Some(&OpOutcome::Done));
    assert!(!runner.command_lines().iter().any(|c| c.contains("zlib")));
  }

  #[tokio::test]
  async fn nodeps_builds_only_the_target() {
    let ws = workspace(BuildOptions {
      build_nodeps: true,
      ..BuildOptions::default()
    });
    let runner = RecordingRunner::new();
    let summary = Builder::new(&ws.ctx, &runner, &RecordingProgress::default())
      .run()
      .await
      .unwrap();

    assert_eq!(summary.selected, vec![key("tools")]);
    assert!(runner.command_lines().iter().all(|c| c.starts_with("tools-")));
  }

  #[tokio::test]
  async fn deps_only_leaves_the_target_out() {
    let ws = workspace(BuildOptions {
      build_deps_only: true,
      ..BuildOptions::default()
    });
    let runner = RecordingRunner::new();
    let summary = Builder::new(&ws.ctx, &runner, &RecordingProgress::default())
      .run()
      .await
      .unwrap();

    assert_eq!(summary.selected, vec![key("core")]);
    assert!(!runner.command_lines().iter().any(|c| c.starts_with("tools-")));
  }

  #[tokio::test]
  async fn clean_at_end_keeps_only_install() {
    let ws = workspace(BuildOptions {
      clean_at_end: true,
      ..BuildOptions::default()
    });
    let installed = ws.ctx.host.dirs.install_dir("native_dyn").join("lib/libcore.a");
    fs::create_dir_all(installed.parent().unwrap()).unwrap();
    fs::write(&installed, "").unwrap();
    let runner = RecordingRunner::new();
    Builder::new(&ws.ctx, &runner, &RecordingProgress::default())
      .run()
      .await
      .unwrap();

    assert!(installed.is_file());
    let build_dir = ws.ctx.host.dirs.build_dir("native_dyn");
    let names: Vec<String> = fs::read_dir(&build_dir)
      .unwrap()
      .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
      .collect();
    assert_eq!(names, vec!["INSTALL".to_string()]);
  }

  #[tokio::test]
  async fn failing_tool_is_a_stop_build() {
    let ws = workspace(BuildOptions::default());
    let runner = RecordingRunner::new().failing("core-install");

    let err = Builder::new(&ws.ctx, &runner, &RecordingProgress::default())
      .run()
      .await
      .unwrap_err();

    assert!(err.is_stop_build());
    assert!(!runner.command_lines().iter().any(|c| c.starts_with("tools-")));
  }

  #[tokio::test]
  async fn unknown_component_fails_before_running_anything() {
    let mut ws = workspace(BuildOptions::default());
    ws.ctx.options.target = "nope".to_string();
    let runner = RecordingRunner::new();

    let err = Builder::new(&ws.ctx, &runner, &RecordingProgress::default())
      .run()
      .await
      .unwrap_err();

    assert!(matches!(err, BuildError::Resolve(_)));
    assert!(!err.is_stop_build());
    assert!(runner.calls().is_empty());
  }

  #[test]
  fn plan_lists_every_selected_node() {
    let ws = workspace(BuildOptions::default());
    let runner = RecordingRunner::new();
    let plan = Builder::new(&ws.ctx, &runner, &RecordingProgress::default()).plan().unwrap();

    assert_eq!(plan.selected, plan.resolution.order);
    assert!(plan.selected.contains(&key("zlib")));
    assert_eq!(plan.steps.len(), plan.selected.len());
    assert!(runner.calls().is_empty());
  }
}
