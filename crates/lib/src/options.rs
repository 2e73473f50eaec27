//! Parsed options consumed by the core.
//!
//! The command-line layer owns argument parsing; everything below it only sees
//! a [`BuildOptions`] value.

use std::path::PathBuf;

use crate::consts::{DEFAULT_JOBS, DEFAULT_REMOTE_PREFIX};

#[derive(Debug, Clone)]
pub struct BuildOptions {
  /// Component requested by the user.
  pub target: String,
  /// Configuration the target is built for.
  pub config: String,
  /// Root of the working tree (`SOURCE/`, `ARCHIVE/`, `BUILD_*`...).
  pub working_dir: PathBuf,
  /// Directory holding patch files referenced by archive sources.
  pub patches_dir: PathBuf,
  /// Overrides the detected library prefix (`lib`, `lib64`, `lib/<multiarch>`).
  pub libprefix: Option<String>,
  /// Stream tool output to the terminal instead of per-operation log files.
  pub verbose: bool,
  pub skip_source_prepare: bool,
  pub build_deps_only: bool,
  pub build_nodeps: bool,
  /// Use release refs of git sources.
  pub make_release: bool,
  /// Produce a distribution archive of the target instead of installing it.
  pub make_dist: bool,
  pub force_install_packages: bool,
  /// Assume mapped host packages are present: never query or install them.
  pub dont_install_packages: bool,
  pub clean_at_end: bool,
  pub android_arch: Vec<String>,
  pub ios_arch: Vec<String>,
  pub jobs: usize,
  /// Prefix prepended to archive names without an explicit url.
  pub remote_prefix: String,
}

impl BuildOptions {
  pub fn new(target: impl Into<String>, config: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
    let working_dir = working_dir.into();
    Self {
      target: target.into(),
      config: config.into(),
      patches_dir: working_dir.join("patches"),
      working_dir,
      ..Default::default()
    }
  }
}

impl Default for BuildOptions {
  fn default() -> Self {
    Self {
      target: String::new(),
      config: "native_dyn".to_string(),
      working_dir: PathBuf::from("BUILD"),
      patches_dir: PathBuf::from("patches"),
      libprefix: None,
      verbose: false,
      skip_source_prepare: false,
      build_deps_only: false,
      build_nodeps: false,
      make_release: false,
      make_dist: false,
      force_install_packages: false,
      dont_install_packages: false,
      clean_at_end: false,
      android_arch: vec!["arm".to_string(), "arm64".to_string(), "x86".to_string(), "x86_64".to_string()],
      ios_arch: vec!["arm64".to_string(), "x86_64".to_string()],
      jobs: DEFAULT_JOBS,
      remote_prefix: DEFAULT_REMOTE_PREFIX.to_string(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn new_places_patches_under_working_dir() {
    let options = BuildOptions::new("zlib", "native_static", "/tmp/work");
    assert_eq!(options.patches_dir, PathBuf::from("/tmp/work/patches"));
    assert_eq!(options.config, "native_static");
    assert_eq!(options.jobs, DEFAULT_JOBS);
  }
}
