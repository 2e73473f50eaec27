//! Cross compilation environments and cross files.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use super::ConfigError;
use super::types::{ConfigDef, CrossTarget};
use crate::platform::host::HostSystem;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostMachine {
  pub system: String,
  pub cpu_family: String,
  pub cpu: String,
  pub endian: String,
}

impl HostMachine {
  fn new(system: &str, cpu_family: &str, cpu: &str) -> Self {
    Self {
      system: system.to_string(),
      cpu_family: cpu_family.to_string(),
      cpu: cpu.to_string(),
      endian: "little".to_string(),
    }
  }
}

/// Everything the overlays of a cross configuration need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossSetup {
  /// Sysroot or toolchain root.
  pub root: PathBuf,
  /// `CC`, `CXX`, `AR`... to their programs.
  pub binaries: BTreeMap<String, String>,
  pub cflags: Vec<String>,
  pub cxxflags: Vec<String>,
  pub ldflags: Vec<String>,
  /// Variables set by the cross flags overlay.
  pub extra_env: BTreeMap<String, String>,
  /// Prepended to `PATH` by the cross path overlay.
  pub bin_dirs: Vec<PathBuf>,
  pub host_machine: HostMachine,
}

const GNU_BINARIES: &[(&str, &str)] = &[
  ("CC", "gcc"),
  ("CXX", "g++"),
  ("AR", "ar"),
  ("STRIP", "strip"),
  ("RANLIB", "ranlib"),
  ("LD", "ld"),
];

fn prefixed_binaries(dir: Option<&Path>, prefix: &str, tools: &[(&str, &str)]) -> BTreeMap<String, String> {
  tools
    .iter()
    .map(|(key, tool)| {
      let name = format!("{prefix}-{tool}");
      let program = match dir {
        Some(dir) => dir.join(name).to_string_lossy().to_string(),
        None => name,
      };
      (key.to_string(), program)
    })
    .collect()
}

fn toolchain_root(def: &ConfigDef, toolchain: &str, roots: &BTreeMap<String, PathBuf>) -> Result<PathBuf, ConfigError> {
  roots.get(toolchain).cloned().ok_or_else(|| ConfigError::MissingToolchain {
    config: def.name.clone(),
    toolchain: toolchain.to_string(),
  })
}

/// Compute the cross setup of a concrete configuration; `None` for native ones.
///
/// `toolchain_roots` maps toolchain component names to where they are installed.
pub fn compute(
  def: &ConfigDef,
  toolchain_roots: &BTreeMap<String, PathBuf>,
  host: &HostSystem,
) -> Result<Option<CrossSetup>, ConfigError> {
  let Some(target) = def.target() else {
    return Ok(None);
  };

  let setup = match target {
    CrossTarget::Native => return Ok(None),

    CrossTarget::Android { arch } => {
      let root = toolchain_root(def, "android-ndk", toolchain_roots)?;
      let sysroot = root.join("sysroot");
      let bin = root.join("bin");
      let mut binaries = prefixed_binaries(
        Some(&bin),
        arch.arch_full,
        &[
          ("CC", "clang"),
          ("CXX", "clang++"),
          ("AR", "ar"),
          ("STRIP", "strip"),
          ("RANLIB", "ranlib"),
          ("LD", "ld"),
        ],
      );
      binaries.insert("PKGCONFIG".to_string(), "pkg-config".to_string());

      let mut cflags = vec![
        "-fPIC".to_string(),
        "-D_LARGEFILE64_SOURCE=1".to_string(),
        "-D_FILE_OFFSET_BITS=64".to_string(),
        format!("--sysroot={}", sysroot.display()),
      ];
      if let Some(march) = arch.march {
        cflags.push(format!("-march={march}"));
      }

      let mut extra_env = BTreeMap::new();
      extra_env.insert(
        "PKG_CONFIG_LIBDIR".to_string(),
        root.join("lib").join("pkgconfig").to_string_lossy().to_string(),
      );
      extra_env.insert("NDK_DEBUG".to_string(), "0".to_string());

      CrossSetup {
        binaries,
        cxxflags: cflags.clone(),
        cflags,
        ldflags: vec![format!("--sysroot={}", sysroot.display())],
        extra_env,
        bin_dirs: vec![bin],
        host_machine: HostMachine::new("android", arch.cpu_family, arch.cpu),
        root,
      }
    }

    CrossTarget::Apple {
      sdk,
      arch,
      target,
      min_version_flag,
      ..
    } => {
      let root = PathBuf::from(xcrun(sdk, &["--show-sdk-path"])?);
      let mut binaries = BTreeMap::new();
      for (key, tool) in [
        ("CC", "clang"),
        ("CXX", "clang++"),
        ("AR", "ar"),
        ("STRIP", "strip"),
        ("RANLIB", "ranlib"),
        ("LD", "ld"),
      ] {
        binaries.insert(key.to_string(), xcrun(sdk, &["-find", tool])?);
      }
      binaries.insert("PKGCONFIG".to_string(), "pkg-config".to_string());

      let root_str = root.to_string_lossy().to_string();
      let mut cflags = vec![
        "-isysroot".to_string(),
        root_str.clone(),
        "-arch".to_string(),
        arch.clone(),
        "-target".to_string(),
        target.clone(),
      ];
      cflags.extend(min_version_flag.iter().cloned());
      let mut cxxflags = cflags.clone();
      cxxflags.push("-std=c++11".to_string());

      let cpu_family = if arch == "arm64" { "aarch64" } else { arch.as_str() };
      let system = if sdk == "macosx" { "darwin" } else { "ios" };
      CrossSetup {
        binaries,
        cflags,
        cxxflags,
        ldflags: vec!["-arch".to_string(), arch.clone(), "-isysroot".to_string(), root_str],
        extra_env: BTreeMap::new(),
        bin_dirs: Vec::new(),
        host_machine: HostMachine::new(system, cpu_family, arch),
        root,
      }
    }

    CrossTarget::Mingw { triple } => {
      let root = match host {
        HostSystem::Fedora => PathBuf::from(format!("/usr/{triple}/sys-root/mingw")),
        _ => PathBuf::from(format!("/usr/{triple}")),
      };
      let mut binaries = prefixed_binaries(None, triple, GNU_BINARIES);
      binaries.insert("WINDRES".to_string(), format!("{triple}-windres"));
      binaries.insert("PKGCONFIG".to_string(), format!("{triple}-pkg-config"));

      let mut extra_env = BTreeMap::new();
      extra_env.insert(
        "PKG_CONFIG_LIBDIR".to_string(),
        root.join("lib").join("pkgconfig").to_string_lossy().to_string(),
      );
      extra_env.insert(
        "LIBS".to_string(),
        "-lwinmm -lws2_32 -lshlwapi -lrpcrt4 -lmsvcr90 -liphlpapi".to_string(),
      );

      CrossSetup {
        binaries,
        cflags: vec!["-DWIN32".to_string()],
        cxxflags: vec!["-DWIN32".to_string()],
        ldflags: Vec::new(),
        extra_env,
        bin_dirs: vec![root.join("bin")],
        host_machine: HostMachine::new("windows", "x86", "i686"),
        root,
      }
    }

    CrossTarget::Gnu {
      triple,
      toolchain,
      cpu_family,
      cpu,
    } => {
      let root = toolchain_root(def, toolchain, toolchain_roots)?;
      let bin = root.join("bin");
      let mut binaries = prefixed_binaries(Some(&bin), triple, GNU_BINARIES);
      binaries.insert("PKGCONFIG".to_string(), "pkg-config".to_string());

      let cflags: Vec<String> = ["-fPIC", "-Wp,-D_FORTIFY_SOURCE=2", "-fexceptions", "--param=ssp-buffer-size=4"]
        .into_iter()
        .map(str::to_string)
        .collect();

      let mut extra_env = BTreeMap::new();
      extra_env.insert(
        "PKG_CONFIG_LIBDIR".to_string(),
        root.join("lib").join("pkgconfig").to_string_lossy().to_string(),
      );

      CrossSetup {
        binaries,
        cxxflags: cflags.clone(),
        cflags,
        ldflags: Vec::new(),
        extra_env,
        bin_dirs: vec![bin],
        host_machine: HostMachine::new("linux", cpu_family, cpu),
        root,
      }
    }
  };

  debug!(config = %def.name, root = %setup.root.display(), "computed cross setup");
  Ok(Some(setup))
}

fn xcrun(sdk: &str, args: &[&str]) -> Result<String, ConfigError> {
  let output = Command::new("xcrun")
    .arg("--sdk")
    .arg(sdk)
    .args(args)
    .output()
    .map_err(|e| ConfigError::Sdk {
      sdk: sdk.to_string(),
      what: args.join(" "),
      message: e.to_string(),
    })?;
  if !output.status.success() {
    return Err(ConfigError::Sdk {
      sdk: sdk.to_string(),
      what: args.join(" "),
      message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    });
  }
  Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn meson_list(items: &[String]) -> String {
  let quoted: Vec<String> = items.iter().map(|s| format!("'{s}'")).collect();
  format!("[{}]", quoted.join(", "))
}

/// Meson cross file.
pub fn render_meson(setup: &CrossSetup) -> String {
  let mut out = String::from("[binaries]\n");
  for (key, meson_key) in [
    ("CC", "c"),
    ("CXX", "cpp"),
    ("AR", "ar"),
    ("STRIP", "strip"),
    ("WINDRES", "windres"),
    ("PKGCONFIG", "pkgconfig"),
  ] {
    if let Some(program) = setup.binaries.get(key) {
      let _ = writeln!(out, "{meson_key} = '{program}'");
    }
  }

  out.push_str("\n[built-in options]\n");
  let _ = writeln!(out, "c_args = {}", meson_list(&setup.cflags));
  let _ = writeln!(out, "cpp_args = {}", meson_list(&setup.cxxflags));
  let _ = writeln!(out, "c_link_args = {}", meson_list(&setup.ldflags));
  let _ = writeln!(out, "cpp_link_args = {}", meson_list(&setup.ldflags));

  out.push_str("\n[properties]\n");
  let _ = writeln!(out, "root = '{}'", setup.root.display());

  let machine = &setup.host_machine;
  out.push_str("\n[host_machine]\n");
  let _ = writeln!(out, "system = '{}'", machine.system);
  let _ = writeln!(out, "cpu_family = '{}'", machine.cpu_family);
  let _ = writeln!(out, "cpu = '{}'", machine.cpu);
  let _ = writeln!(out, "endian = '{}'", machine.endian);
  out
}

/// CMake toolchain file.
pub fn render_cmake(setup: &CrossSetup) -> String {
  let system = match setup.host_machine.system.as_str() {
    "windows" => "Windows",
    "darwin" => "Darwin",
    "ios" => "iOS",
    "android" => "Android",
    _ => "Linux",
  };
  let mut out = String::new();
  let _ = writeln!(out, "SET(CMAKE_SYSTEM_NAME {system})");
  let _ = writeln!(out, "SET(CMAKE_SYSTEM_PROCESSOR {})", setup.host_machine.cpu);
  for (key, cmake_key) in [
    ("CC", "CMAKE_C_COMPILER"),
    ("CXX", "CMAKE_CXX_COMPILER"),
    ("WINDRES", "CMAKE_RC_COMPILER"),
    ("AR", "CMAKE_AR"),
    ("RANLIB", "CMAKE_RANLIB"),
  ] {
    if let Some(program) = setup.binaries.get(key) {
      let _ = writeln!(out, "SET({cmake_key} \"{program}\")");
    }
  }
  let _ = writeln!(out, "SET(CMAKE_FIND_ROOT_PATH {})", setup.root.display());
  out.push_str("SET(CMAKE_FIND_ROOT_PATH_MODE_PROGRAM NEVER)\n");
  out.push_str("SET(CMAKE_FIND_ROOT_PATH_MODE_LIBRARY ONLY)\n");
  out.push_str("SET(CMAKE_FIND_ROOT_PATH_MODE_INCLUDE ONLY)\n");
  out
}
