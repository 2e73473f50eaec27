//! Host system detection.
//!
//! Configurations and package tables are keyed by the host distribution
//! family rather than by the raw OS, since package names and install
//! commands differ between Fedora and Debian derived systems.

use std::fmt;
use std::fs;

use tracing::debug;

use crate::consts::HOST_ENV_VAR;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HostSystem {
  Fedora,
  Debian,
  Darwin,
  Other(String),
}

impl HostSystem {
  /// Detect the host, honouring the `CROSSBUILD_HOST` override.
  pub fn detect() -> Self {
    if let Ok(name) = std::env::var(HOST_ENV_VAR)
      && !name.is_empty()
    {
      debug!(host = %name, "host overridden from environment");
      return Self::parse(&name);
    }

    match std::env::consts::OS {
      "macos" => Self::Darwin,
      "linux" => fs::read_to_string("/etc/os-release")
        .map(|content| Self::from_os_release(&content))
        .unwrap_or_else(|_| Self::Other("linux".to_string())),
      other => Self::Other(other.to_string()),
    }
  }

  /// Map a distribution or OS name to a host family.
  pub fn parse(name: &str) -> Self {
    match name.trim().to_lowercase().as_str() {
      "fedora" => Self::Fedora,
      "debian" | "ubuntu" | "linuxmint" => Self::Debian,
      "darwin" | "macos" => Self::Darwin,
      other => Self::Other(other.to_string()),
    }
  }

  /// Parse the `ID=` entry of an os-release file.
  pub fn from_os_release(content: &str) -> Self {
    content
      .lines()
      .find_map(|line| line.strip_prefix("ID="))
      .map(|id| Self::parse(id.trim_matches('"')))
      .unwrap_or_else(|| Self::Other("linux".to_string()))
  }

  pub fn as_str(&self) -> &str {
    match self {
      Self::Fedora => "fedora",
      Self::Debian => "debian",
      Self::Darwin => "Darwin",
      Self::Other(name) => name,
    }
  }

  pub fn is_debian_like(&self) -> bool {
    matches!(self, Self::Debian)
  }
}

impl fmt::Display for HostSystem {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}
