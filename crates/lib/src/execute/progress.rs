//! Human facing progress reporting.
//!
//! The library never writes to the terminal itself. Front ends implement
//! [`Progress`] to render phases, operations and failures.

use std::time::Duration;

use crate::execute::types::OpOutcome;
use crate::graph::NodeKey;

/// Which half of a step is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
  Source,
  Build,
}

impl StepKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Source => "source",
      Self::Build => "build",
    }
  }
}

pub trait Progress {
  /// A top level phase such as `SETUP CONFIGS` or `BUILD`.
  fn phase(&self, _name: &str) {}

  fn node(&self, _key: &NodeKey, _kind: StepKind) {}

  fn op_start(&self, _op: &str, _component: &str) {}

  fn op_end(&self, _op: &str, _outcome: &OpOutcome, _elapsed: Duration) {}

  /// Called periodically while a long running command is still alive.
  fn heartbeat(&self) {}

  /// Captured output of a failed command.
  fn failure_log(&self, _log: &str) {}

  fn message(&self, _message: &str) {}
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentProgress;

impl Progress for SilentProgress {}
