//! Outcomes, errors and reports of step execution.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::graph::NodeKey;

/// Result of one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpOutcome {
  /// The operation ran and succeeded; its marker was written.
  Done,
  /// The marker was already present.
  Cached,
  /// Not applicable here, with an optional reason.
  Skipped(Option<String>),
  /// Ran but degraded; the run continues.
  Warning(String),
}

impl OpOutcome {
  /// Whether the operation did work, which forces what comes after it.
  pub fn executed(&self) -> bool {
    matches!(self, Self::Done | Self::Warning(_))
  }

  pub fn label(&self) -> &'static str {
    match self {
      Self::Done => "OK",
      Self::Cached => "Skip",
      Self::Skipped(_) => "Skip",
      Self::Warning(_) => "WARNING",
    }
  }
}

impl fmt::Display for OpOutcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Skipped(Some(reason)) => write!(f, "Skip ({reason})"),
      Self::Warning(message) => write!(f, "WARNING ({message})"),
      other => f.write_str(other.label()),
    }
  }
}

/// Why a single operation failed.
#[derive(Debug, Error)]
pub enum StepError {
  #[error("command '{command}' failed with exit code {code:?}")]
  CommandFailed {
    command: String,
    code: Option<i32>,
    log: Option<PathBuf>,
  },

  #[error("required tool '{tool}' not found")]
  ToolMissing { tool: String },

  #[error("fetch failed for {url}: {message}")]
  FetchFailed { url: String, message: String },

  #[error("hash mismatch for {path}: expected {expected}, got {actual}")]
  HashMismatch {
    path: PathBuf,
    expected: String,
    actual: String,
  },

  #[error("failed to extract {archive}: {message}")]
  Extract { archive: PathBuf, message: String },

  #[error("io error on {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

impl StepError {
  pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::Io {
      path: path.into(),
      source,
    }
  }

  /// External tool and download failures stop the whole build.
  pub fn is_fatal(&self) -> bool {
    matches!(
      self,
      Self::CommandFailed { .. } | Self::FetchFailed { .. } | Self::HashMismatch { .. }
    )
  }
}

#[derive(Debug, Error)]
pub enum ExecuteError {
  /// An external tool failed; nothing after it runs.
  #[error("{node}: {op} failed: {source}")]
  StopBuild {
    node: NodeKey,
    op: String,
    #[source]
    source: StepError,
  },

  #[error("{node}: {op}: {source}")]
  Step {
    node: NodeKey,
    op: String,
    #[source]
    source: StepError,
  },
}

impl ExecuteError {
  pub fn is_stop_build(&self) -> bool {
    matches!(self, Self::StopBuild { .. })
  }
}

/// Exit status of a spawned command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStatus {
  pub code: Option<i32>,
}

impl RunStatus {
  pub fn success(&self) -> bool {
    self.code == Some(0)
  }
}

/// Outcomes of every operation of one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeReport {
  pub key: NodeKey,
  pub ops: Vec<(String, OpOutcome)>,
}

impl NodeReport {
  pub fn executed(&self) -> bool {
    self.ops.iter().any(|(_, outcome)| outcome.executed())
  }
}

/// Everything a run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
  pub nodes: Vec<NodeReport>,
  /// Number of subprocesses spawned.
  pub invocations: usize,
}

impl RunReport {
  pub fn outcome(&self, key: &NodeKey, op: &str) -> Option<&OpOutcome> {
    self
      .nodes
      .iter()
      .filter(|n| n.key == *key)
      .flat_map(|n| n.ops.iter())
      .find(|(name, _)| name == op)
      .map(|(_, outcome)| outcome)
  }

  /// `(node, op)` pairs that did work, in execution order.
  pub fn executed_ops(&self) -> Vec<(&NodeKey, &str)> {
    self
      .nodes
      .iter()
      .flat_map(|n| {
        n.ops
          .iter()
          .filter(|(_, outcome)| outcome.executed())
          .map(move |(op, _)| (&n.key, op.as_str()))
      })
      .collect()
  }
}
