//! External command invocation.
//!
//! Commands are argument vectors, never shell strings. The environment is
//! fully described by the command's [`EnvBuilder`]: the child starts from
//! an empty environment and receives exactly the serialized variables.

use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::future::Future;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use crate::consts::HEARTBEAT_INTERVAL;
use crate::execute::env::EnvBuilder;
use crate::execute::progress::Progress;
use crate::execute::types::RunStatus;

/// One command to spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
  pub program: String,
  pub args: Vec<String>,
  pub cwd: PathBuf,
  pub env: EnvBuilder,
  /// File fed to the command's standard input.
  pub stdin: Option<PathBuf>,
}

impl CommandSpec {
  pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      cwd: cwd.into(),
      env: EnvBuilder::new(),
      stdin: None,
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn env(mut self, env: EnvBuilder) -> Self {
    self.env = env;
    self
  }

  pub fn stdin(mut self, path: impl Into<PathBuf>) -> Self {
    self.stdin = Some(path.into());
    self
  }

  /// Program and arguments joined with spaces, for logs and messages.
  pub fn display(&self) -> String {
    let mut out = self.program.clone();
    for arg in &self.args {
      out.push(' ');
      out.push_str(arg);
    }
    out
  }
}

/// Where a command's output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
  /// Appended to a log file, stdout and stderr combined.
  Log(PathBuf),
  /// Shared with the calling process.
  Inherit,
}

impl OutputTarget {
  pub fn log_path(&self) -> Option<&Path> {
    match self {
      Self::Log(path) => Some(path),
      Self::Inherit => None,
    }
  }
}

/// Spawns commands and waits for them.
///
/// An `Err` means the command could not run at all; a non-zero exit is an
/// `Ok` carrying the status.
pub trait CommandRunner {
  fn run(
    &self,
    spec: &CommandSpec,
    output: &OutputTarget,
    progress: &dyn Progress,
  ) -> impl Future<Output = io::Result<RunStatus>>;
}

/// Runs commands on the host with `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
  pub fn new() -> Self {
    Self
  }
}

/// Header written at the top of each command's log section.
pub fn log_header(spec: &CommandSpec) -> String {
  let mut header = String::new();
  let _ = writeln!(header, "run command '{}'", spec.display());
  let _ = writeln!(header, "current directory is '{}'", spec.cwd.display());
  let _ = writeln!(header, "env is :");
  for (key, value) in spec.env.to_vars() {
    let _ = writeln!(header, "  {key} : {value}");
  }
  header.push('\n');
  header
}

fn open_log(path: &Path) -> io::Result<File> {
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent)?;
  }
  OpenOptions::new().create(true).append(true).open(path)
}

impl CommandRunner for SystemRunner {
  async fn run(&self, spec: &CommandSpec, output: &OutputTarget, progress: &dyn Progress) -> io::Result<RunStatus> {
    info!(cmd = %spec.program, cwd = %spec.cwd.display(), "running command");
    debug!(args = ?spec.args, "command arguments");

    let mut command = Command::new(&spec.program);
    command
      .args(&spec.args)
      .current_dir(&spec.cwd)
      .env_clear()
      .envs(spec.env.to_vars())
      .kill_on_drop(true);

    match &spec.stdin {
      Some(path) => command.stdin(Stdio::from(File::open(path)?)),
      None => command.stdin(Stdio::null()),
    };

    match output {
      OutputTarget::Log(path) => {
        let mut log = open_log(path)?;
        log.write_all(log_header(spec).as_bytes())?;
        log.flush()?;
        command.stdout(Stdio::from(log.try_clone()?)).stderr(Stdio::from(log));
      }
      OutputTarget::Inherit => {
        command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
      }
    }

    let mut child = command.spawn()?;
    loop {
      match tokio::time::timeout(HEARTBEAT_INTERVAL, child.wait()).await {
        Ok(status) => {
          let status = status?;
          debug!(cmd = %spec.program, code = ?status.code(), "command finished");
          return Ok(RunStatus { code: status.code() });
        }
        Err(_) => progress.heartbeat(),
      }
    }
  }
}
