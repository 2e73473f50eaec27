//! Shared test helpers for CLI integration tests.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::{Value, json};
use tempfile::TempDir;

/// A script phase appending `<component>:<phase>` to the shared journal.
pub fn phase(component: &str, phase: &str) -> Value {
  json!([
    "sh",
    "-c",
    format!("echo {component}:{phase} >> \"$CROSSBUILD_BUILD_DIR/../journal\"")
  ])
}

/// A component built by three journaled script phases.
pub fn script_component(name: &str, deps: &[&str]) -> Value {
  json!({
    "name": name,
    "deps": deps,
    "build": {
      "method": "script",
      "configure": phase(name, "configure"),
      "compile": phase(name, "compile"),
      "install": phase(name, "install"),
    }
  })
}

/// Isolated test environment.
///
/// Each test gets its own working tree and recipe file.
pub struct TestEnv {
  pub temp: TempDir,
  pub catalogue: PathBuf,
}

impl TestEnv {
  pub fn with_components(components: Vec<Value>) -> Self {
    let temp = TempDir::new().unwrap();
    let catalogue = temp.path().join("recipes.json");
    std::fs::write(&catalogue, serde_json::to_string_pretty(&components).unwrap()).unwrap();
    Self { temp, catalogue }
  }

  pub fn working_dir(&self) -> PathBuf {
    let p = self.temp.path().join("BUILD");
    std::fs::create_dir_all(&p).unwrap();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  pub fn build_dir(&self, config: &str) -> PathBuf {
    self.working_dir().join(format!("BUILD_{config}"))
  }

  /// Lines written by the script phases, in execution order.
  pub fn journal(&self, config: &str) -> Vec<String> {
    let path = self.build_dir(config).join("journal");
    match std::fs::read_to_string(path) {
      Ok(content) => content.lines().map(str::to_string).collect(),
      Err(_) => Vec::new(),
    }
  }

  pub fn clear_journal(&self, config: &str) {
    let _ = std::fs::remove_file(self.build_dir(config).join("journal"));
  }

  /// `xb build <target>` on a Debian host without touching host packages.
  pub fn build(&self, target: &str) -> Command {
    let mut cmd = cargo_bin_cmd!("xb");
    cmd
      .env("CROSSBUILD_HOST", "debian")
      .arg("--working-dir")
      .arg(self.working_dir())
      .arg("--catalogue")
      .arg(&self.catalogue)
      .args(["build", target, "--dont-install-packages"]);
    cmd
  }

  pub fn marker(&self, config: &str, component: &str, op: &str) -> PathBuf {
    self.build_dir(config).join(component).join(format!(".{op}_ok"))
  }
}

pub fn exists(path: &Path) -> bool {
  path.symlink_metadata().is_ok()
}
