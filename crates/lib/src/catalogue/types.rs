//! Component definitions.
//!
//! These types are plain data: the builtin recipes construct them in code and
//! extra catalogues deserialize them from JSON.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A dependency of a component.
///
/// In JSON a bare reference is a string (`"zlib"`) and a qualified one is a
/// two element array (`["native_static", "icu4c"]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DepRef {
  /// Resolved against the configuration of the depending node.
  Bare(String),
  /// Explicit `(config, component)` pair.
  Qualified(String, String),
}

impl DepRef {
  pub fn component(&self) -> &str {
    match self {
      Self::Bare(name) | Self::Qualified(_, name) => name,
    }
  }
}

impl From<&str> for DepRef {
  fn from(name: &str) -> Self {
    Self::Bare(name.to_string())
  }
}

impl fmt::Display for DepRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Bare(name) => write!(f, "{name}"),
      Self::Qualified(config, name) => write!(f, "{config}/{name}"),
    }
  }
}

/// An archive to download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
  /// File name inside the archive directory.
  pub name: String,
  /// Lowercase hex sha256 of the file.
  pub sha256: String,
  /// Defaults to the configured remote prefix followed by `name`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub url: Option<String>,
}

impl RemoteFile {
  pub fn new(name: &str, sha256: &str, url: Option<&str>) -> Self {
    Self {
      name: name.to_string(),
      sha256: sha256.to_string(),
      url: url.map(str::to_string),
    }
  }

  pub fn url(&self, remote_prefix: &str) -> String {
    match &self.url {
      Some(url) => url.clone(),
      None => format!("{remote_prefix}{}", self.name),
    }
  }
}

/// Where a hook runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookCwd {
  Source,
  #[default]
  Build,
}

/// An optional script attached to a source or build step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hook {
  /// Program followed by its arguments; placeholders allowed.
  pub command: Vec<String>,
  #[serde(default)]
  pub cwd: HookCwd,
}

impl Hook {
  pub fn new(command: &[&str], cwd: HookCwd) -> Self {
    Self {
      command: command.iter().map(|s| s.to_string()).collect(),
      cwd,
    }
  }
}

/// How source material reaches the source directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceDef {
  Archive {
    archive: RemoteFile,
    /// Name of the directory inside the archive; detected when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    top_dir: Option<String>,
    /// Patch file names, applied in order with `patch -p1`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    patches: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    post_prepare: Option<Hook>,
  },
  Git {
    remote: String,
    dir: String,
    #[serde(default = "default_git_ref")]
    base_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    release_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    post_prepare: Option<Hook>,
  },
  #[default]
  Noop,
}

fn default_git_ref() -> String {
  "main".to_string()
}

/// Which static libraries a merge node combines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
  /// One fat library per name with `lipo -create`.
  Lipo,
  /// One `.xcframework` per static library with `xcodebuild`.
  XcFramework,
}

/// Build method family.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum BuildMethod {
  #[default]
  Noop,
  /// Autotools style `configure && make && make install`.
  Make {
    /// Path of the configure script; placeholders allowed.
    #[serde(default = "default_configure_script")]
    configure_script: String,
    /// Pass `--enable-static`/`--enable-shared` according to the linkage.
    #[serde(default = "default_true")]
    linkage_flags: bool,
  },
  #[serde(rename = "cmake")]
  CMake,
  Meson,
  Gradle {
    #[serde(default = "default_gradle_targets")]
    targets: Vec<String>,
  },
  /// Plain argument lists per phase.
  Script {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    configure: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    compile: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    test: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    install: Option<Vec<String>>,
  },
  /// Combine the installs of the sub-configurations of a meta configuration.
  MergeLibs { mode: MergeMode },
}

fn default_configure_script() -> String {
  "$${source_dir}/configure".to_string()
}

fn default_true() -> bool {
  true
}

fn default_gradle_targets() -> Vec<String> {
  vec!["build".to_string()]
}

impl BuildMethod {
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Noop => "noop",
      Self::Make { .. } => "make",
      Self::CMake => "cmake",
      Self::Meson => "meson",
      Self::Gradle { .. } => "gradle",
      Self::Script { .. } => "script",
      Self::MergeLibs { .. } => "merge_libs",
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildDef {
  #[serde(flatten)]
  pub method: BuildMethod,
  /// Extra configure arguments; placeholders allowed.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub configure_options: Vec<String>,
  /// Extra configure arguments used only for static linkage.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub static_configure_options: Vec<String>,
  /// Extra configure arguments used only when cross compiling.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub cross_configure_options: Vec<String>,
  /// Sub-directory of the source tree holding the build files.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub source_subdir: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub pre_build: Option<Hook>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub post_configure: Option<Hook>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub post_build: Option<Hook>,
}

impl BuildDef {
  pub fn new(method: BuildMethod) -> Self {
    Self {
      method,
      ..Default::default()
    }
  }
}

/// Marks a component as a toolchain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchainInfo {
  /// Neutral toolchains are shared by every configuration and live in the
  /// `neutral` configuration.
  #[serde(default)]
  pub neutral: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDef {
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,
  #[serde(default)]
  pub deps: Vec<DepRef>,
  /// Dependencies added only when the node's configuration cross compiles.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub cross_deps: Vec<DepRef>,
  #[serde(default)]
  pub source: SourceDef,
  #[serde(default)]
  pub build: BuildDef,
  /// Build-time helpers that must run on the host even in cross configurations.
  #[serde(default)]
  pub force_native_build: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub toolchain: Option<ToolchainInfo>,
  /// Host packages needed whenever this component is built.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub extra_packages: Vec<String>,
}

impl ComponentDef {
  pub fn new(name: &str) -> Self {
    Self {
      name: name.to_string(),
      version: None,
      deps: Vec::new(),
      cross_deps: Vec::new(),
      source: SourceDef::Noop,
      build: BuildDef::default(),
      force_native_build: false,
      toolchain: None,
      extra_packages: Vec::new(),
    }
  }

  /// `<name>-<version>`, or the bare name for unversioned components.
  pub fn full_name(&self) -> String {
    match &self.version {
      Some(version) => format!("{}-{}", self.name, version),
      None => self.name.clone(),
    }
  }

  pub fn is_toolchain(&self) -> bool {
    self.toolchain.is_some()
  }

  pub fn is_neutral_toolchain(&self) -> bool {
    self.toolchain.as_ref().is_some_and(|t| t.neutral)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn deps_accept_bare_and_qualified_forms() {
    let deps: Vec<DepRef> = serde_json::from_str(r#"["core", ["neutral", "codegen"]]"#).unwrap();
    assert_eq!(
      deps,
      vec![
        DepRef::Bare("core".to_string()),
        DepRef::Qualified("neutral".to_string(), "codegen".to_string())
      ]
    );
    assert_eq!(deps[1].to_string(), "neutral/codegen");
  }

  #[test]
  fn script_component_from_json() {
    let json = r#"{
      "name": "tools",
      "version": "1.2",
      "deps": ["core"],
      "build": {
        "method": "script",
        "install": ["sh", "-c", "touch $${install_dir}/tools"],
        "pre_build": { "command": ["true"], "cwd": "source" }
      }
    }"#;
    let def: ComponentDef = serde_json::from_str(json).unwrap();

    assert_eq!(def.full_name(), "tools-1.2");
    assert_eq!(def.source, SourceDef::Noop);
    assert!(matches!(def.build.method, BuildMethod::Script { install: Some(_), compile: None, .. }));
    assert_eq!(def.build.pre_build.as_ref().map(|h| h.cwd), Some(HookCwd::Source));
  }

  #[test]
  fn archive_source_from_json() {
    let json = r#"{
      "name": "zlib",
      "source": { "type": "archive", "archive": { "name": "zlib.tar.gz", "sha256": "00" } },
      "build": { "method": "make" }
    }"#;
    let def: ComponentDef = serde_json::from_str(json).unwrap();

    let SourceDef::Archive { archive, .. } = &def.source else {
      panic!("expected archive source");
    };
    assert_eq!(archive.url("http://mirror/"), "http://mirror/zlib.tar.gz");
    assert_eq!(
      def.build.method,
      BuildMethod::Make {
        configure_script: "$${source_dir}/configure".to_string(),
        linkage_flags: true,
      }
    );
  }

  #[test]
  fn neutral_toolchain_flag() {
    let mut def = ComponentDef::new("armv6");
    assert!(!def.is_toolchain());
    def.toolchain = Some(ToolchainInfo { neutral: true });
    assert!(def.is_neutral_toolchain());
  }
}
