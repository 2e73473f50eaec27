//! Named operations and the actions they perform.

use std::path::{Path, PathBuf};

use crate::catalogue::MergeMode;
use crate::execute::command::CommandSpec;
use crate::execute::env::EnvBuilder;
use crate::execute::marker::Marker;

/// A unit of work inside an operation, run in order by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
  /// Spawn commands one after the other.
  Run(Vec<CommandSpec>),
  /// Fetch a file unless it is already present with the expected hash.
  Download { url: String, sha256: String, dest: PathBuf },
  /// Unpack an archive so that its top directory becomes `dest`.
  Extract {
    archive: PathBuf,
    dest: PathBuf,
    top_dir: Option<String>,
    /// Host `tar`, for formats not unpacked in-process.
    tar: String,
  },
  /// Empty a directory, keeping completion markers.
  ResetDir(PathBuf),
  CopyTree { from: PathBuf, to: PathBuf },
  /// Combine the libraries of several install trees.
  MergeLibs {
    inputs: Vec<PathBuf>,
    output: PathBuf,
    libdir: String,
    mode: MergeMode,
    program: String,
    env: EnvBuilder,
  },
  /// Not applicable here.
  Skip(String),
}

impl Action {
  /// One line per command or filesystem effect, for plans.
  pub fn describe(&self) -> Vec<String> {
    match self {
      Self::Run(specs) => specs.iter().map(CommandSpec::display).collect(),
      Self::Download { url, dest, .. } => vec![format!("download {url} -> {}", dest.display())],
      Self::Extract { archive, dest, .. } => vec![format!("extract {} -> {}", archive.display(), dest.display())],
      Self::ResetDir(dir) => vec![format!("reset {}", dir.display())],
      Self::CopyTree { from, to } => vec![format!("copy {} -> {}", from.display(), to.display())],
      Self::MergeLibs {
        inputs, output, mode, ..
      } => vec![format!("merge {:?} of {} trees -> {}", mode, inputs.len(), output.display())],
      Self::Skip(reason) => vec![format!("skip: {reason}")],
    }
  }
}

/// A named operation of a source or build step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
  pub name: String,
  /// Completion marker; `None` for operations that always run.
  pub marker: Option<Marker>,
  /// The operation counts as done when this path exists.
  pub skip_if_exists: Option<PathBuf>,
  pub actions: Vec<Action>,
}

impl Operation {
  /// Operation with its marker `<marker_dir>/.<name>_ok`.
  pub fn new(name: &str, marker_dir: &Path) -> Self {
    Self {
      name: name.to_string(),
      marker: Some(Marker::new(marker_dir, name)),
      skip_if_exists: None,
      actions: Vec::new(),
    }
  }

  pub fn unmarked(name: &str) -> Self {
    Self {
      name: name.to_string(),
      marker: None,
      skip_if_exists: None,
      actions: Vec::new(),
    }
  }

  pub fn with_marker(mut self, marker: Marker) -> Self {
    self.marker = Some(marker);
    self
  }

  pub fn skip_if_exists(mut self, path: impl Into<PathBuf>) -> Self {
    self.skip_if_exists = Some(path.into());
    self
  }

  pub fn action(mut self, action: Action) -> Self {
    self.actions.push(action);
    self
  }

  pub fn run(self, spec: CommandSpec) -> Self {
    self.action(Action::Run(vec![spec]))
  }

  pub fn commands(&self) -> impl Iterator<Item = &CommandSpec> {
    self.actions.iter().flat_map(|action| match action {
      Action::Run(specs) => specs.as_slice(),
      _ => &[],
    })
  }

  pub fn describe(&self) -> Vec<String> {
    self.actions.iter().flat_map(Action::describe).collect()
  }
}
