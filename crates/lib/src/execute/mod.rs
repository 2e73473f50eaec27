//! Sequential execution of instantiated steps.
//!
//! The engine first prepares the sources of every step, once per source
//! directory, then runs the build steps in resolution order. Every operation
//! is guarded by its completion marker:
//!
//! - marker present and nothing upstream changed: the operation is cached
//! - otherwise the operation runs and its marker is written on success
//!
//! Once an operation runs, every later operation of the node runs too, and so
//! does the build of every node depending on it. A failing external tool stops
//! the whole run; markers of the operations before it stay, so the next run
//! resumes there.

pub mod actions;
pub mod command;
pub mod env;
pub mod marker;
pub mod progress;
pub mod types;

use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, error, info};

use crate::graph::NodeKey;
use crate::platform::paths::WorkDirs;
use crate::step::{Action, Operation, Steps};

use actions::{Extraction, MergeRequest};
use command::{CommandRunner, CommandSpec, OutputTarget};
use progress::{Progress, StepKind};

pub use types::{ExecuteError, NodeReport, OpOutcome, RunReport, RunStatus, StepError};

/// Runs steps through a [`CommandRunner`].
pub struct Engine<'a, R: CommandRunner> {
  runner: &'a R,
  progress: &'a dyn Progress,
  dirs: &'a WorkDirs,
  verbose: bool,
  skip_source_prepare: bool,
  invocations: Cell<usize>,
}

impl<'a, R: CommandRunner> Engine<'a, R> {
  pub fn new(runner: &'a R, progress: &'a dyn Progress, dirs: &'a WorkDirs) -> Self {
    Self {
      runner,
      progress,
      dirs,
      verbose: false,
      skip_source_prepare: false,
      invocations: Cell::new(0),
    }
  }

  /// Stream tool output to the terminal instead of log files.
  pub fn verbose(mut self, verbose: bool) -> Self {
    self.verbose = verbose;
    self
  }

  pub fn skip_source_prepare(mut self, skip: bool) -> Self {
    self.skip_source_prepare = skip;
    self
  }

  /// Prepare every source, then run every build, in step order.
  pub async fn run(&self, steps: &Steps) -> Result<RunReport, ExecuteError> {
    info!(nodes = steps.len(), "executing steps");
    let mut report = RunReport::default();

    self.progress.phase("PREPARE");
    let mut sources: HashMap<PathBuf, bool> = HashMap::new();
    if self.skip_source_prepare {
      self.progress.message("SKIP");
    } else {
      for step in steps.iter() {
        let source = &step.source;
        if sources.contains_key(&source.source_dir) {
          continue;
        }
        self.progress.node(&step.key, StepKind::Source);
        let node = self.run_ops(&step.key, &source.component, &source.ops, false).await?;
        sources.insert(source.source_dir.clone(), node.executed());
        report.nodes.push(node);
      }
    }

    self.progress.phase("BUILD");
    let mut changed: HashSet<NodeKey> = HashSet::new();
    for step in steps.iter() {
      let source_executed = sources.get(&step.source.source_dir).copied().unwrap_or(false);
      let upstream_changed = step.deps.iter().any(|dep| changed.contains(dep));
      let force = source_executed || upstream_changed;
      if force {
        debug!(node = %step.key, source_executed, upstream_changed, "forcing build");
      }

      std::fs::create_dir_all(&step.layout.build_dir).map_err(|e| ExecuteError::Step {
        node: step.key.clone(),
        op: "build".to_string(),
        source: StepError::io(&step.layout.build_dir, e),
      })?;

      self.progress.node(&step.key, StepKind::Build);
      let node = self
        .run_ops(&step.key, &step.key.component, &step.build.ops, force)
        .await?;
      if node.executed() {
        changed.insert(step.key.clone());
      }
      report.nodes.push(node);
    }

    report.invocations = self.invocations.get();
    info!(invocations = report.invocations, "execution complete");
    Ok(report)
  }

  async fn run_ops(
    &self,
    key: &NodeKey,
    component: &str,
    ops: &[Operation],
    force: bool,
  ) -> Result<NodeReport, ExecuteError> {
    let mut forced = force;
    let mut report = NodeReport {
      key: key.clone(),
      ops: Vec::new(),
    };

    for op in ops {
      self.progress.op_start(&op.name, component);
      let started = Instant::now();

      let outcome = match self.run_op(op, component, forced).await {
        Ok(outcome) => outcome,
        Err(source) => return Err(self.failure(key, op, source)),
      };

      debug!(node = %key, op = %op.name, outcome = %outcome, "operation finished");
      self.progress.op_end(&op.name, &outcome, started.elapsed());
      forced |= outcome.executed();
      report.ops.push((op.name.clone(), outcome));
    }
    Ok(report)
  }

  fn failure(&self, key: &NodeKey, op: &Operation, source: StepError) -> ExecuteError {
    error!(node = %key, op = %op.name, error = %source, "operation failed");
    if !source.is_fatal() {
      return ExecuteError::Step {
        node: key.clone(),
        op: op.name.clone(),
        source,
      };
    }

    match &source {
      StepError::CommandFailed { log: Some(path), .. } => match std::fs::read_to_string(path) {
        Ok(content) => self.progress.failure_log(&content),
        Err(err) => debug!(log = %path.display(), error = %err, "cannot read failure log"),
      },
      other => self.progress.failure_log(&other.to_string()),
    }
    ExecuteError::StopBuild {
      node: key.clone(),
      op: op.name.clone(),
      source,
    }
  }

  async fn run_op(&self, op: &Operation, component: &str, forced: bool) -> Result<OpOutcome, StepError> {
    if let Some(path) = &op.skip_if_exists
      && path.exists()
    {
      return Ok(OpOutcome::Cached);
    }
    if let Some(marker) = &op.marker {
      if marker.exists() && !forced {
        return Ok(OpOutcome::Cached);
      }
      marker.clear().map_err(|e| StepError::io(marker.path(), e))?;
    }

    let output = self.output_for(&op.name, component)?;
    for action in &op.actions {
      match action {
        Action::Skip(reason) => return Ok(OpOutcome::Skipped(Some(reason.clone()))),
        Action::Run(specs) => {
          for spec in specs {
            self.spawn(spec, &output).await?;
          }
        }
        Action::Download { url, sha256, dest } => actions::download(url, sha256, dest).await?,
        Action::Extract {
          archive,
          dest,
          top_dir,
          tar,
        } => {
          let extraction = Extraction::begin(archive, dest, top_dir.as_deref())?;
          if let Some(spec) = extraction.unpack(tar)? {
            self.spawn(&spec, &output).await?;
          }
          extraction.finish()?;
        }
        Action::ResetDir(dir) => actions::reset_dir(dir)?,
        Action::CopyTree { from, to } => actions::copy_tree(from, to)?,
        Action::MergeLibs {
          inputs,
          output: merged,
          libdir,
          mode,
          program,
          env,
        } => {
          let commands = actions::merge_commands(&MergeRequest {
            inputs,
            output: merged,
            libdir,
            mode: *mode,
            program,
            env,
          })?;
          for spec in &commands {
            self.spawn(spec, &output).await?;
          }
        }
      }
    }

    if let Some(marker) = &op.marker {
      marker.set().map_err(|e| StepError::io(marker.path(), e))?;
    }
    Ok(OpOutcome::Done)
  }

  /// Where the operation's commands write, truncating the previous log.
  fn output_for(&self, op: &str, component: &str) -> Result<OutputTarget, StepError> {
    if self.verbose {
      return Ok(OutputTarget::Inherit);
    }
    let log = self.dirs.log_file(op, component);
    if let Some(parent) = log.parent() {
      std::fs::create_dir_all(parent).map_err(|e| StepError::io(parent, e))?;
    }
    std::fs::File::create(&log).map_err(|e| StepError::io(&log, e))?;
    Ok(OutputTarget::Log(log))
  }

  async fn spawn(&self, spec: &CommandSpec, output: &OutputTarget) -> Result<(), StepError> {
    self.invocations.set(self.invocations.get() + 1);
    let status = self
      .runner
      .run(spec, output, self.progress)
      .await
      .map_err(|e| spawn_error(spec, e))?;

    if !status.success() {
      return Err(StepError::CommandFailed {
        command: spec.display(),
        code: status.code,
        log: output.log_path().map(Path::to_path_buf),
      });
    }
    Ok(())
  }
}

fn spawn_error(spec: &CommandSpec, err: io::Error) -> StepError {
  if err.kind() == io::ErrorKind::NotFound && spec.cwd.is_dir() {
    StepError::ToolMissing {
      tool: spec.program.clone(),
    }
  } else {
    StepError::io(&spec.cwd, err)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::execute::marker::Marker;
  use crate::options::BuildOptions;
  use crate::step::{BuildStep, NodeLayout, SourceStep, Step};
  use crate::util::testutil::{RecordingProgress, RecordingRunner, Workspace, script_component};
  use std::sync::Arc;

  fn workspace() -> Workspace {
    Workspace::new(
      BuildOptions::default(),
      vec![
        script_component("core", &[]),
        script_component("util", &[]),
        script_component("tools", &["core", "util"]),
      ],
    )
  }

  fn key(component: &str) -> NodeKey {
    NodeKey::new("native_dyn", component)
  }

  #[tokio::test]
  async fn first_run_executes_everything_and_rerun_nothing() {
    let ws = workspace();
    let steps = ws.steps("native_dyn", "tools");
    let runner = RecordingRunner::new();
    let progress = RecordingProgress::default();
    let engine = Engine::new(&runner, &progress, &ws.ctx.host.dirs);

    let first = engine.run(&steps).await.unwrap();
    assert_eq!(first.invocations, 9);
    assert_eq!(first.outcome(&key("tools"), "install"), Some(&OpOutcome::Done));

    let rerun_engine = Engine::new(&runner, &progress, &ws.ctx.host.dirs);
    let second = rerun_engine.run(&steps).await.unwrap();
    assert_eq!(second.invocations, 0);
    assert!(second.executed_ops().is_empty());
    assert_eq!(second.outcome(&key("core"), "compile"), Some(&OpOutcome::Cached));
  }

  #[tokio::test]
  async fn deleted_marker_reruns_that_op_and_everything_downstream() {
    let ws = workspace();
    let steps = ws.steps("native_dyn", "tools");
    let runner = RecordingRunner::new();
    let progress = RecordingProgress::default();
    Engine::new(&runner, &progress, &ws.ctx.host.dirs)
      .run(&steps)
      .await
      .unwrap();

    let core = steps.get(&key("core")).unwrap();
    Marker::new(&core.layout.build_dir, "compile").clear().unwrap();
    runner.clear();

    let report = Engine::new(&runner, &progress, &ws.ctx.host.dirs)
      .run(&steps)
      .await
      .unwrap();

    let core_key = key("core");
    let tools_key = key("tools");
    assert_eq!(
      report.executed_ops(),
      vec![
        (&core_key, "compile"),
        (&core_key, "install"),
        (&tools_key, "configure"),
        (&tools_key, "compile"),
        (&tools_key, "install"),
      ]
    );
    assert_eq!(report.outcome(&key("util"), "compile"), Some(&OpOutcome::Cached));
    assert_eq!(report.outcome(&core_key, "configure"), Some(&OpOutcome::Cached));
    assert!(!runner.command_lines().iter().any(|c| c.starts_with("util-")));
  }

  #[tokio::test]
  async fn failing_tool_stops_before_later_nodes() {
    let ws = workspace();
    let steps = ws.steps("native_dyn", "tools");
    let runner = RecordingRunner::new().failing("core-compile");
    let progress = RecordingProgress::default();

    let err = Engine::new(&runner, &progress, &ws.ctx.host.dirs)
      .run(&steps)
      .await
      .unwrap_err();

    assert!(err.is_stop_build());
    assert!(matches!(&err, ExecuteError::StopBuild { op, .. } if op == "compile"));
    assert!(!runner.command_lines().iter().any(|c| c.starts_with("tools-")));

    let logs = progress.failure_logs.borrow();
    assert_eq!(logs.len(), 1);
    assert!(logs[0].contains("ran core-compile"));

    let core = steps.get(&key("core")).unwrap();
    assert!(Marker::new(&core.layout.build_dir, "configure").exists());
    assert!(!Marker::new(&core.layout.build_dir, "compile").exists());
  }

  #[tokio::test]
  async fn resumed_run_starts_at_the_failed_operation() {
    let ws = workspace();
    let steps = ws.steps("native_dyn", "tools");
    let progress = RecordingProgress::default();
    let failing = RecordingRunner::new().failing("core-compile");
    let _ = Engine::new(&failing, &progress, &ws.ctx.host.dirs).run(&steps).await;

    let runner = RecordingRunner::new();
    Engine::new(&runner, &progress, &ws.ctx.host.dirs)
      .run(&steps)
      .await
      .unwrap();

    let lines = runner.command_lines();
    assert!(!lines.iter().any(|c| c.starts_with("core-configure")));
    assert!(lines[0].starts_with("core-compile"));
  }

  #[tokio::test]
  async fn missing_tool_is_not_a_stop_build() {
    let ws = workspace();
    let steps = ws.steps("native_dyn", "core");
    let runner = RecordingRunner::new().missing("core-configure");
    let progress = RecordingProgress::default();

    let err = Engine::new(&runner, &progress, &ws.ctx.host.dirs)
      .run(&steps)
      .await
      .unwrap_err();

    assert!(matches!(
      err,
      ExecuteError::Step {
        source: StepError::ToolMissing { .. },
        ..
      }
    ));
  }

  fn manual_step(ws: &Workspace, component: &str, source: Arc<SourceStep>, ops: Vec<Operation>) -> Step {
    let build_dir = ws.ctx.host.dirs.build_dir("native_dyn").join(component);
    Step {
      key: key(component),
      layout: NodeLayout {
        key: key(component),
        full_name: component.to_string(),
        source_dir: source.source_dir.clone(),
        build_src_dir: source.source_dir.clone(),
        build_dir,
        install_dir: ws.ctx.host.dirs.install_dir("native_dyn"),
        libprefix: "lib".to_string(),
        arch: "x86_64".to_string(),
      },
      source,
      build: BuildStep { ops },
      deps: Vec::new(),
    }
  }

  #[tokio::test]
  async fn skipped_operations_leave_no_marker() {
    let ws = workspace();
    let build_dir = ws.ctx.host.dirs.build_dir("native_dyn").join("meta");
    let source = Arc::new(SourceStep {
      component: "meta".to_string(),
      source_dir: ws.ctx.host.dirs.source.join("meta"),
      ops: Vec::new(),
    });
    let test = Operation::new("test", &build_dir).action(Action::Skip("No test for android".to_string()));
    let mut steps = Steps::default();
    steps.push(manual_step(&ws, "meta", source, vec![test]));

    let runner = RecordingRunner::new();
    let report = Engine::new(&runner, &RecordingProgress::default(), &ws.ctx.host.dirs)
      .run(&steps)
      .await
      .unwrap();

    assert_eq!(
      report.outcome(&key("meta"), "test"),
      Some(&OpOutcome::Skipped(Some("No test for android".to_string())))
    );
    assert!(!Marker::new(&build_dir, "test").exists());
  }

  fn xz_source(ws: &Workspace) -> (Arc<SourceStep>, PathBuf) {
    let source_dir = ws.ctx.host.dirs.source.join("xapian-core-1.4.23");
    let extract = Operation::new("extract", &source_dir).action(Action::Extract {
      archive: ws.ctx.host.dirs.archive.join("xapian-core-1.4.23.tar.xz"),
      dest: source_dir.clone(),
      top_dir: None,
      tar: "tar".to_string(),
    });
    let source = Arc::new(SourceStep {
      component: "xapian-core".to_string(),
      source_dir: source_dir.clone(),
      ops: vec![extract],
    });
    (source, source_dir)
  }

  #[tokio::test]
  async fn host_tar_goes_through_the_runner() {
    let ws = workspace();
    let (source, source_dir) = xz_source(&ws);
    let mut steps = Steps::default();
    steps.push(manual_step(&ws, "xapian-core", source, Vec::new()));

    let runner = RecordingRunner::new();
    let report = Engine::new(&runner, &RecordingProgress::default(), &ws.ctx.host.dirs)
      .run(&steps)
      .await
      .unwrap();

    assert_eq!(report.invocations, 1);
    assert!(runner.command_lines()[0].starts_with("tar -xf "));
    assert!(ws.ctx.host.dirs.log_file("extract", "xapian-core").is_file());
    assert!(Marker::new(&source_dir, "extract").exists());
  }

  #[tokio::test]
  async fn failing_host_tar_stops_the_build() {
    let ws = workspace();
    let (source, source_dir) = xz_source(&ws);
    let mut steps = Steps::default();
    steps.push(manual_step(&ws, "xapian-core", source, Vec::new()));

    let runner = RecordingRunner::new().failing("tar");
    let progress = RecordingProgress::default();
    let err = Engine::new(&runner, &progress, &ws.ctx.host.dirs)
      .run(&steps)
      .await
      .unwrap_err();

    assert!(err.is_stop_build());
    assert!(progress.failure_logs.borrow()[0].contains("ran tar -xf"));
    assert!(!Marker::new(&source_dir, "extract").exists());
  }

  #[tokio::test]
  async fn shared_source_runs_once_and_forces_every_user() {
    let ws = workspace();
    let source_dir = ws.ctx.host.dirs.source.join("shared");
    let fetch = Operation::new("fetch", &source_dir).run(CommandSpec::new("fetch-sources", &ws.ctx.host.dirs.source));
    let source = Arc::new(SourceStep {
      component: "shared".to_string(),
      source_dir: source_dir.clone(),
      ops: vec![fetch],
    });

    let mut steps = Steps::default();
    for name in ["first", "second"] {
      let build_dir = ws.ctx.host.dirs.build_dir("native_dyn").join(name);
      let op = Operation::new("compile", &build_dir).run(CommandSpec::new(format!("{name}-compile"), &build_dir));
      steps.push(manual_step(&ws, name, Arc::clone(&source), vec![op]));
    }

    let runner = RecordingRunner::new();
    let progress = RecordingProgress::default();
    Engine::new(&runner, &progress, &ws.ctx.host.dirs)
      .run(&steps)
      .await
      .unwrap();
    assert_eq!(
      runner.command_lines(),
      vec!["fetch-sources", "first-compile", "second-compile"]
    );

    // A new fetch rebuilds both users even though their markers exist.
    Marker::new(&source_dir, "fetch").clear().unwrap();
    runner.clear();
    Engine::new(&runner, &progress, &ws.ctx.host.dirs)
      .run(&steps)
      .await
      .unwrap();
    assert_eq!(
      runner.command_lines(),
      vec!["fetch-sources", "first-compile", "second-compile"]
    );

    runner.clear();
    let report = Engine::new(&runner, &progress, &ws.ctx.host.dirs)
      .skip_source_prepare(true)
      .run(&steps)
      .await
      .unwrap();
    assert_eq!(report.invocations, 0);
  }

  #[tokio::test]
  async fn each_operation_logs_to_its_own_file() {
    let ws = workspace();
    let steps = ws.steps("native_dyn", "core");
    let runner = RecordingRunner::new();
    Engine::new(&runner, &RecordingProgress::default(), &ws.ctx.host.dirs)
      .run(&steps)
      .await
      .unwrap();

    let log = ws.ctx.host.dirs.log_file("compile", "core");
    let content = std::fs::read_to_string(log).unwrap();
    assert!(content.starts_with("ran core-compile"));
  }
}
