mod build;
mod graph;
mod info;
mod list;
mod plan;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tracing::debug;

use crossbuild_lib::catalogue::Catalogue;
use crossbuild_lib::config::ConfigRegistry;
use crossbuild_lib::context::BuildContext;
use crossbuild_lib::options::BuildOptions;
use crossbuild_lib::platform::HostEnv;

pub use build::{BuildArgs, BuildStatus, cmd_build};
pub use graph::cmd_graph;
pub use info::cmd_info;
pub use list::{ListKind, cmd_list};
pub use plan::cmd_plan;

/// The requested node and how the graph around it is narrowed.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
  /// Component to build
  pub target: String,

  /// Configuration to build for
  #[arg(short, long, default_value = "native_dyn", env = "CROSSBUILD_CONFIG")]
  pub config: String,

  /// Build only the target, not its dependencies
  #[arg(long, conflicts_with = "build_deps_only")]
  pub build_nodeps: bool,

  /// Build the dependencies, not the target
  #[arg(long)]
  pub build_deps_only: bool,

  /// Use release refs of git sources
  #[arg(long)]
  pub make_release: bool,

  /// Make a distribution archive of the target instead of installing it
  #[arg(long)]
  pub make_dist: bool,

  /// Android ABIs of the `android` meta configuration
  #[arg(long, value_delimiter = ',')]
  pub android_arch: Vec<String>,

  /// iOS architectures of the `ios_multi` meta configuration
  #[arg(long, value_delimiter = ',')]
  pub ios_arch: Vec<String>,
}

impl TargetArgs {
  /// Fill the target related fields of `options`.
  pub fn apply(&self, options: &mut BuildOptions) {
    options.target = self.target.clone();
    options.config = self.config.clone();
    options.build_nodeps = self.build_nodeps;
    options.build_deps_only = self.build_deps_only;
    options.make_release = self.make_release;
    options.make_dist = self.make_dist;
    if !self.android_arch.is_empty() {
      options.android_arch = self.android_arch.clone();
    }
    if !self.ios_arch.is_empty() {
      options.ios_arch = self.ios_arch.clone();
    }
  }
}

/// Options with the working tree resolved against the current directory.
pub fn base_options(working_dir: &Path) -> Result<BuildOptions> {
  let working_dir = if working_dir.is_absolute() {
    working_dir.to_path_buf()
  } else {
    std::env::current_dir()
      .context("Failed to read current directory")?
      .join(working_dir)
  };
  let working_dir = dunce::simplified(&working_dir).to_path_buf();
  Ok(BuildOptions::new("", "native_dyn", working_dir))
}

/// Probe the host and load the builtin recipes plus any extra catalogue.
pub fn load_context(options: BuildOptions, catalogue: Option<&PathBuf>) -> Result<BuildContext> {
  let host = HostEnv::probe(&options);
  let mut recipes = Catalogue::builtin();
  if let Some(path) = catalogue {
    let count = recipes
      .load_json(path)
      .with_context(|| format!("Failed to load catalogue: {}", path.display()))?;
    debug!(count, path = %path.display(), "loaded extra recipes");
  }
  Ok(BuildContext::new(options, host, recipes, ConfigRegistry::builtin()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossbuild_lib::consts::HOST_ENV_VAR;
  use crossbuild_lib::platform::host::HostSystem;
  use serial_test::serial;
  use tempfile::TempDir;

  #[test]
  fn relative_working_dir_is_made_absolute() {
    let options = base_options(Path::new("BUILD")).unwrap();
    assert!(options.working_dir.is_absolute());
    assert!(options.working_dir.ends_with("BUILD"));
  }

  #[test]
  #[serial]
  fn context_honours_host_override_and_extra_recipes() {
    let temp = TempDir::new().unwrap();
    let recipes = temp.path().join("recipes.json");
    std::fs::write(
      &recipes,
      r#"[{"name": "viewer", "deps": ["zlib"], "build": {"method": "script", "install": ["true"]}}]"#,
    )
    .unwrap();
    let options = base_options(&temp.path().join("BUILD")).unwrap();

    let ctx = temp_env::with_var(HOST_ENV_VAR, Some("fedora"), || load_context(options, Some(&recipes))).unwrap();

    assert_eq!(ctx.host.system, HostSystem::Fedora);
    assert!(ctx.catalogue.get("viewer").is_ok());
    assert!(ctx.catalogue.get("zlib").is_ok());
  }

  #[test]
  fn missing_catalogue_is_an_error() {
    let temp = TempDir::new().unwrap();
    let options = base_options(temp.path()).unwrap();
    let missing = temp.path().join("nope.json");

    let err = load_context(options, Some(&missing)).unwrap_err();
    assert!(err.to_string().contains("Failed to load catalogue"));
  }
}
