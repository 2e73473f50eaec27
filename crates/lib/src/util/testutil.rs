//! Test doubles and fixtures shared by the library's unit tests.

use std::cell::RefCell;
use std::collections::HashSet;
use std::io::{self, Write};
use std::time::Duration;

use tempfile::TempDir;

use crate::catalogue::{BuildDef, BuildMethod, Catalogue, ComponentDef, DepRef};
use crate::config::ConfigRegistry;
use crate::config::active::finalize;
use crate::context::BuildContext;
use crate::execute::command::{CommandRunner, CommandSpec, OutputTarget};
use crate::execute::progress::Progress;
use crate::execute::types::{OpOutcome, RunStatus};
use crate::graph::{Resolution, Resolver};
use crate::options::BuildOptions;
use crate::platform::HostEnv;
use crate::platform::host::HostSystem;
use crate::step::{Steps, instantiate};

/// Records every command instead of spawning it.
///
/// Programs listed with [`RecordingRunner::failing`] exit with status 2.
/// In log mode a line naming the program is appended to the log.
#[derive(Debug, Default)]
pub struct RecordingRunner {
  calls: RefCell<Vec<CommandSpec>>,
  failing: HashSet<String>,
  missing: HashSet<String>,
}

impl RecordingRunner {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn failing(mut self, program: &str) -> Self {
    self.failing.insert(program.to_string());
    self
  }

  /// Behave as if `program` was not installed.
  pub fn missing(mut self, program: &str) -> Self {
    self.missing.insert(program.to_string());
    self
  }

  pub fn calls(&self) -> Vec<CommandSpec> {
    self.calls.borrow().clone()
  }

  /// `program arg...` of every recorded call.
  pub fn command_lines(&self) -> Vec<String> {
    self.calls.borrow().iter().map(CommandSpec::display).collect()
  }

  pub fn clear(&self) {
    self.calls.borrow_mut().clear();
  }
}

impl CommandRunner for RecordingRunner {
  async fn run(&self, spec: &CommandSpec, output: &OutputTarget, _progress: &dyn Progress) -> io::Result<RunStatus> {
    if self.missing.contains(&spec.program) {
      return Err(io::Error::new(io::ErrorKind::NotFound, spec.program.clone()));
    }
    self.calls.borrow_mut().push(spec.clone());

    if let OutputTarget::Log(path) = output {
      let mut log = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
      writeln!(log, "ran {}", spec.display())?;
    }
    let code = if self.failing.contains(&spec.program) { 2 } else { 0 };
    Ok(RunStatus { code: Some(code) })
  }
}

/// Keeps what the engine reports.
#[derive(Debug, Default)]
pub struct RecordingProgress {
  pub outcomes: RefCell<Vec<(String, OpOutcome)>>,
  pub failure_logs: RefCell<Vec<String>>,
  pub phases: RefCell<Vec<String>>,
  pub messages: RefCell<Vec<String>>,
}

impl Progress for RecordingProgress {
  fn phase(&self, name: &str) {
    self.phases.borrow_mut().push(name.to_string());
  }

  fn op_end(&self, op: &str, outcome: &OpOutcome, _elapsed: Duration) {
    self.outcomes.borrow_mut().push((op.to_string(), outcome.clone()));
  }

  fn failure_log(&self, log: &str) {
    self.failure_logs.borrow_mut().push(log.to_string());
  }

  fn message(&self, message: &str) {
    self.messages.borrow_mut().push(message.to_string());
  }
}

/// A component built by plain scripts: `<name>-configure`, `<name>-compile`
/// and `<name>-install`, each receiving the install directory.
pub fn script_component(name: &str, deps: &[&str]) -> ComponentDef {
  let phase = |step: &str| Some(vec![format!("{name}-{step}"), "$${install_dir}".to_string()]);
  ComponentDef {
    deps: deps.iter().map(|d| DepRef::from(*d)).collect(),
    build: BuildDef::new(BuildMethod::Script {
      configure: phase("configure"),
      compile: phase("compile"),
      test: None,
      install: phase("install"),
    }),
    ..ComponentDef::new(name)
  }
}

/// A working tree in a temporary directory with a Debian host.
pub struct Workspace {
  pub temp: TempDir,
  pub ctx: BuildContext,
}

impl Workspace {
  pub fn new(options: BuildOptions, extra: Vec<ComponentDef>) -> Self {
    let temp = TempDir::new().expect("tempdir");
    let options = BuildOptions {
      working_dir: temp.path().to_path_buf(),
      patches_dir: temp.path().join("patches"),
      ..options
    };
    let host = HostEnv::with(HostSystem::Debian, temp.path(), "lib");
    host.dirs.create().expect("work dirs");
    let mut catalogue = Catalogue::builtin();
    for def in extra {
      catalogue.register(def);
    }
    Self {
      temp,
      ctx: BuildContext::new(options, host, catalogue, ConfigRegistry::builtin()),
    }
  }

  pub fn resolve(&self, config: &str, component: &str) -> Resolution {
    let ctx = &self.ctx;
    Resolver::new(&ctx.catalogue, &ctx.configs, &ctx.host.system, &ctx.options)
      .resolve(config, component)
      .expect("resolution")
  }

  /// Resolve, finalize and instantiate every node.
  pub fn steps(&self, config: &str, component: &str) -> Steps {
    let ctx = &self.ctx;
    let resolution = self.resolve(config, component);
    let defs: Vec<_> = resolution
      .configs
      .iter()
      .map(|name| ctx.configs.get(name).expect("config"))
      .collect();
    let envs = finalize(&defs, &ctx.catalogue, &ctx.host).expect("finalize");
    instantiate(ctx, &resolution, &envs, &resolution.order).expect("instantiate")
  }
}
