//! Host package managers.

use std::future::Future;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::execute::command::{CommandRunner, CommandSpec, OutputTarget};
use crate::execute::env::EnvBuilder;
use crate::execute::progress::Progress;
use crate::platform::host::HostSystem;
use crate::platform::paths::WorkDirs;

use super::PackageError;

/// Query and install host packages.
pub trait PackageManager {
  fn is_installed(&self, package: &str) -> impl Future<Output = Result<bool, PackageError>>;

  /// Install every package in one invocation.
  fn install(&self, packages: &[String]) -> impl Future<Output = Result<(), PackageError>>;
}

/// The package tool of a host distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageTool {
  Dnf,
  Apt,
  Brew,
}

impl PackageTool {
  pub fn for_host(system: &HostSystem) -> Option<Self> {
    match system {
      HostSystem::Fedora => Some(Self::Dnf),
      HostSystem::Debian => Some(Self::Apt),
      HostSystem::Darwin => Some(Self::Brew),
      HostSystem::Other(_) => None,
    }
  }

  pub fn check_command(&self, package: &str, cwd: &Path) -> CommandSpec {
    let mut env = EnvBuilder::inherit();
    env.set("LANG", "C");
    let spec = match self {
      Self::Dnf => CommandSpec::new("rpm", cwd).args(["-q", "--quiet", package]),
      Self::Apt => CommandSpec::new("dpkg", cwd).args(["-s", package]),
      Self::Brew => CommandSpec::new("brew", cwd).args(["list", "-1"]),
    };
    spec.env(env)
  }

  pub fn install_command(&self, packages: &[String], cwd: &Path) -> CommandSpec {
    let spec = match self {
      Self::Dnf => CommandSpec::new("sudo", cwd).args(["dnf", "install"]),
      Self::Apt => CommandSpec::new("sudo", cwd).args(["apt-get", "install"]),
      Self::Brew => CommandSpec::new("brew", cwd).arg("install"),
    };
    spec.args(packages.iter().cloned()).env(EnvBuilder::inherit())
  }

  /// Read the check's exit code and captured output.
  pub fn is_installed(&self, package: &str, success: bool, output: &str) -> bool {
    match self {
      Self::Dnf => success,
      Self::Apt => {
        success
          && output
            .lines()
            .any(|line| line.starts_with("Status:") && line.contains("ok installed"))
      }
      Self::Brew => success && output.lines().any(|line| line.trim() == package),
    }
  }
}

/// [`PackageManager`] spawning the host's package tool.
pub struct HostPackages<'a, R: CommandRunner> {
  tool: Option<PackageTool>,
  runner: &'a R,
  progress: &'a dyn Progress,
  dirs: &'a WorkDirs,
}

impl<'a, R: CommandRunner> HostPackages<'a, R> {
  pub fn new(system: &HostSystem, runner: &'a R, progress: &'a dyn Progress, dirs: &'a WorkDirs) -> Self {
    Self {
      tool: PackageTool::for_host(system),
      runner,
      progress,
      dirs,
    }
  }

  fn tool(&self) -> Result<PackageTool, PackageError> {
    self.tool.ok_or(PackageError::UnsupportedHost)
  }

  fn check_log(&self, package: &str) -> PathBuf {
    self.dirs.log_file("check_package", package)
  }
}

impl<R: CommandRunner> PackageManager for HostPackages<'_, R> {
  async fn is_installed(&self, package: &str) -> Result<bool, PackageError> {
    let tool = self.tool()?;
    let log = self.check_log(package);
    if let Some(parent) = log.parent() {
      std::fs::create_dir_all(parent).map_err(|e| PackageError::io(parent, e))?;
    }
    std::fs::File::create(&log).map_err(|e| PackageError::io(&log, e))?;

    let spec = tool.check_command(package, &self.dirs.root);
    let status = self
      .runner
      .run(&spec, &OutputTarget::Log(log.clone()), self.progress)
      .await
      .map_err(|e| PackageError::Spawn {
        command: spec.display(),
        source: e,
      })?;
    let output = std::fs::read_to_string(&log).map_err(|e| PackageError::io(&log, e))?;
    let installed = tool.is_installed(package, status.success(), &output);
    debug!(package, installed, "checked package");
    Ok(installed)
  }

  async fn install(&self, packages: &[String]) -> Result<(), PackageError> {
    if packages.is_empty() {
      return Ok(());
    }
    let spec = self.tool()?.install_command(packages, &self.dirs.root);
    info!(command = %spec.display(), "installing packages");
    self.progress.message(&spec.display());

    let status = self
      .runner
      .run(&spec, &OutputTarget::Inherit, self.progress)
      .await
      .map_err(|e| PackageError::Spawn {
        command: spec.display(),
        source: e,
      })?;
    if !status.success() {
      return Err(PackageError::InstallFailed {
        command: spec.display(),
        code: status.code,
      });
    }
    Ok(())
  }
}
