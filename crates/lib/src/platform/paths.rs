//! Layout of the working tree.

use std::io;
use std::path::{Path, PathBuf};

use crate::consts::{ARCHIVE_DIR, BUILD_DIR_PREFIX, INSTALL_DIR, LOGS_DIR, SOURCE_DIR, TOOLCHAINS_DIR};

/// Directories shared by every configuration of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkDirs {
  pub root: PathBuf,
  pub source: PathBuf,
  pub archive: PathBuf,
  pub toolchains: PathBuf,
  pub logs: PathBuf,
}

impl WorkDirs {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    let root = root.into();
    Self {
      source: root.join(SOURCE_DIR),
      archive: root.join(ARCHIVE_DIR),
      toolchains: root.join(TOOLCHAINS_DIR),
      logs: root.join(LOGS_DIR),
      root,
    }
  }

  /// `BUILD_<config>`
  pub fn build_dir(&self, config: &str) -> PathBuf {
    self.root.join(format!("{BUILD_DIR_PREFIX}{config}"))
  }

  /// `BUILD_<config>/INSTALL`
  pub fn install_dir(&self, config: &str) -> PathBuf {
    self.build_dir(config).join(INSTALL_DIR)
  }

  /// Log file of one operation: `LOGS/cmd_<op>_<component>.log`.
  pub fn log_file(&self, op: &str, component: &str) -> PathBuf {
    self.logs.join(format!("cmd_{op}_{component}.log"))
  }

  /// Where a toolchain is unpacked (neutral) or installed for one configuration.
  pub fn toolchain_dir(&self, config: Option<&str>, name: &str) -> PathBuf {
    match config {
      Some(config) => self.toolchains.join(config).join(name),
      None => self.toolchains.join(name),
    }
  }

  pub fn create(&self) -> io::Result<()> {
    for dir in [&self.root, &self.source, &self.archive, &self.toolchains, &self.logs] {
      std::fs::create_dir_all(dir)?;
    }
    Ok(())
  }

  pub fn root(&self) -> &Path {
    &self.root
  }
}
