//! Environment probe.
//!
//! Everything the rest of the crate needs to know about the machine it runs
//! on is gathered once into a [`HostEnv`] and treated as read-only afterwards.

pub mod arch;
pub mod host;
pub mod os;
pub mod paths;
pub mod tools;

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use arch::Arch;
use host::HostSystem;
use os::Os;
use paths::WorkDirs;
use tools::HostTools;

use crate::options::BuildOptions;

/// Platform identifier combining architecture and OS (e.g., "x86_64-linux")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
  pub arch: Arch,
  pub os: Os,
}

impl Platform {
  pub fn new(arch: Arch, os: Os) -> Self {
    Self { arch, os }
  }

  /// Returns `None` if the OS or architecture is not supported
  pub fn current() -> Option<Self> {
    Some(Self {
      arch: Arch::current()?,
      os: Os::current()?,
    })
  }

  pub fn triple(&self) -> String {
    format!("{}-{}", self.arch, self.os)
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.triple())
  }
}

/// Read-only description of the host.
#[derive(Debug, Clone)]
pub struct HostEnv {
  pub platform: Option<Platform>,
  pub system: HostSystem,
  pub tools: HostTools,
  /// Library directory relative to an install prefix.
  pub libprefix: String,
  pub ccache_dir: Option<PathBuf>,
  pub dirs: WorkDirs,
}

impl HostEnv {
  /// Probe the running machine.
  pub fn probe(options: &BuildOptions) -> Self {
    let system = HostSystem::detect();
    let libprefix = options.libprefix.clone().unwrap_or_else(|| detect_libprefix(&system));
    let env = Self {
      platform: Platform::current(),
      tools: HostTools::discover(),
      ccache_dir: detect_ccache(),
      dirs: WorkDirs::new(&options.working_dir),
      system,
      libprefix,
    };
    info!(host = %env.system, libprefix = %env.libprefix, "probed host");
    env
  }

  /// A host description with no discovered tools, for callers that already
  /// know the answers.
  pub fn with(system: HostSystem, working_dir: impl Into<PathBuf>, libprefix: impl Into<String>) -> Self {
    Self {
      platform: Platform::current(),
      system,
      tools: HostTools::default(),
      libprefix: libprefix.into(),
      ccache_dir: None,
      dirs: WorkDirs::new(working_dir),
    }
  }
}

/// Detect where the host toolchain expects libraries: the Debian multiarch
/// directory, `lib64`, or plain `lib`.
pub fn detect_libprefix(system: &HostSystem) -> String {
  if system.is_debian_like()
    && let Ok(output) = Command::new("dpkg-architecture").arg("-qDEB_HOST_MULTIARCH").output()
    && output.status.success()
  {
    let multiarch = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !multiarch.is_empty() {
      return format!("lib/{multiarch}");
    }
  }

  let lib64 = Path::new("/usr/lib64");
  let is_real_dir = lib64
    .symlink_metadata()
    .map(|m| m.is_dir() && !m.file_type().is_symlink())
    .unwrap_or(false);
  if is_real_dir { "lib64".to_string() } else { "lib".to_string() }
}

fn detect_ccache() -> Option<PathBuf> {
  let found = ["/usr/lib/ccache", "/usr/lib64/ccache"]
    .into_iter()
    .map(PathBuf::from)
    .find(|p| p.is_dir());
  if let Some(dir) = &found {
    debug!(dir = %dir.display(), "using ccache");
  }
  found
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn platform_triple_format() {
    let platform = Platform::new(Arch::Aarch64, Os::MacOs);
    assert_eq!(platform.triple(), "aarch64-darwin");
  }

  #[test]
  fn libprefix_is_lib_or_lib64_off_debian() {
    let prefix = detect_libprefix(&HostSystem::Fedora);
    assert!(prefix == "lib" || prefix == "lib64");
  }

  #[test]
  fn with_uses_given_values() {
    let env = HostEnv::with(HostSystem::Debian, "/w", "lib/x86_64-linux-gnu");
    assert_eq!(env.dirs.logs, PathBuf::from("/w/LOGS"));
    assert_eq!(env.libprefix, "lib/x86_64-linux-gnu");
  }
}
