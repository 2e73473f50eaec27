//! Discovery of host build tools on `PATH`.
//!
//! Each tool family has a list of candidate executable names (e.g. Fedora
//! ships `ninja-build`). A missing tool is not an error here; it only
//! becomes one when an operation actually spawns it.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ToolKind {
  Ninja,
  Meson,
  Git,
  Make,
  CMake,
  Patch,
  Gradle,
  Tar,
  Lipo,
  Xcodebuild,
}

impl ToolKind {
  pub const ALL: [ToolKind; 10] = [
    ToolKind::Ninja,
    ToolKind::Meson,
    ToolKind::Git,
    ToolKind::Make,
    ToolKind::CMake,
    ToolKind::Patch,
    ToolKind::Gradle,
    ToolKind::Tar,
    ToolKind::Lipo,
    ToolKind::Xcodebuild,
  ];

  /// Executable names to look for, in order of preference.
  pub fn candidates(&self) -> &'static [&'static str] {
    match self {
      Self::Ninja => &["ninja", "ninja-build"],
      Self::Meson => &["meson", "meson.py"],
      Self::Git => &["git"],
      Self::Make => &["make"],
      Self::CMake => &["cmake"],
      Self::Patch => &["patch"],
      Self::Gradle => &["gradle"],
      Self::Tar => &["tar"],
      Self::Lipo => &["lipo"],
      Self::Xcodebuild => &["xcodebuild"],
    }
  }

  pub fn name(&self) -> &'static str {
    self.candidates()[0]
  }
}

impl fmt::Display for ToolKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.name())
  }
}

/// Tools found on the host.
#[derive(Debug, Clone, Default)]
pub struct HostTools {
  found: BTreeMap<ToolKind, PathBuf>,
}

impl HostTools {
  /// Scan the current `PATH`.
  pub fn discover() -> Self {
    let path = std::env::var_os("PATH").unwrap_or_default();
    Self::discover_in(&path)
  }

  /// Scan an explicit search path.
  pub fn discover_in(path: &OsStr) -> Self {
    let dirs: Vec<PathBuf> = std::env::split_paths(path).collect();
    let mut found = BTreeMap::new();

    for kind in ToolKind::ALL {
      let hit = kind
        .candidates()
        .iter()
        .find_map(|name| dirs.iter().map(|dir| dir.join(name)).find(|p| is_executable(p)));
      if let Some(path) = hit {
        debug!(tool = %kind, path = %path.display(), "found tool");
        found.insert(kind, path);
      }
    }

    Self { found }
  }

  pub fn get(&self, kind: ToolKind) -> Option<&Path> {
    self.found.get(&kind).map(PathBuf::as_path)
  }

  /// Program to spawn for a tool: the discovered path, or its canonical name
  /// so the spawn itself reports the tool as missing.
  pub fn program(&self, kind: ToolKind) -> String {
    self
      .get(kind)
      .map(|p| p.to_string_lossy().to_string())
      .unwrap_or_else(|| kind.name().to_string())
  }

  pub fn iter(&self) -> impl Iterator<Item = (ToolKind, Option<&Path>)> {
    ToolKind::ALL.into_iter().map(|kind| (kind, self.get(kind)))
  }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
  use std::os::unix::fs::PermissionsExt;
  path
    .metadata()
    .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
    .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
  path.is_file()
}
