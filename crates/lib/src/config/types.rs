//! Build configuration descriptors.

use std::fmt;

use crate::options::BuildOptions;
use crate::platform::host::HostSystem;

/// Platform family of a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
  Neutral,
  Native,
  Android,
  Ios,
  Macos,
  Win32,
  Musl,
  Armhf,
}

impl Family {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Neutral => "neutral",
      Self::Native => "native",
      Self::Android => "android",
      Self::Ios => "iOS",
      Self::Macos => "macOS",
      Self::Win32 => "win32",
      Self::Musl => "musl",
      Self::Armhf => "armhf",
    }
  }
}

impl fmt::Display for Family {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Linkage {
  Dynamic,
  Static,
  /// The requested target links dynamically, every dependency resolves to
  /// the paired static configuration.
  Mixed { static_config: String },
  /// No linkage: toolchains and host-only helpers.
  Neutral,
}

impl Linkage {
  pub fn is_static(&self) -> bool {
    matches!(self, Self::Static)
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Dynamic => "dynamic",
      Self::Static => "static",
      Self::Mixed { .. } => "mixed",
      Self::Neutral => "neutral",
    }
  }
}

/// Android ABI description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AndroidArch {
  pub name: &'static str,
  pub arch_full: &'static str,
  pub abi: &'static str,
  pub cpu_family: &'static str,
  pub cpu: &'static str,
  pub march: Option<&'static str>,
}

impl AndroidArch {
  pub fn lookup(name: &str) -> Option<Self> {
    let arch = match name {
      "arm" => Self {
        name: "arm",
        arch_full: "arm-linux-androideabi",
        abi: "armeabi-v7a",
        cpu_family: "arm",
        cpu: "armv7",
        march: Some("armv7-a"),
      },
      "arm64" => Self {
        name: "arm64",
        arch_full: "aarch64-linux-android",
        abi: "arm64-v8a",
        cpu_family: "aarch64",
        cpu: "aarch64",
        march: None,
      },
      "x86" => Self {
        name: "x86",
        arch_full: "i686-linux-android",
        abi: "x86",
        cpu_family: "x86",
        cpu: "i686",
        march: None,
      },
      "x86_64" => Self {
        name: "x86_64",
        arch_full: "x86_64-linux-android",
        abi: "x86_64",
        cpu_family: "x86_64",
        cpu: "x86_64",
        march: None,
      },
      _ => return None,
    };
    Some(arch)
  }
}

/// How the cross environment of a concrete configuration is computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrossTarget {
  Native,
  Android {
    arch: AndroidArch,
  },
  /// Apple SDK located with `xcrun`.
  Apple {
    sdk: String,
    arch: String,
    target: String,
    host_triple: String,
    /// Complete deployment target flag, e.g. `-miphoneos-version-min=15.0`.
    min_version_flag: Option<String>,
  },
  /// MinGW cross compiler installed by the host package manager.
  Mingw {
    triple: String,
  },
  /// GNU style cross toolchain shipped as a toolchain component.
  Gnu {
    triple: String,
    toolchain: String,
    cpu_family: String,
    cpu: String,
  },
}

impl CrossTarget {
  /// Architecture name exposed to recipes as `$${arch}`.
  pub fn arch_name(&self) -> String {
    match self {
      Self::Native => std::env::consts::ARCH.to_string(),
      Self::Android { arch } => arch.name.to_string(),
      Self::Apple { arch, .. } => arch.clone(),
      Self::Mingw { .. } => "i686".to_string(),
      Self::Gnu { cpu, .. } => cpu.clone(),
    }
  }
}

/// Sub-configurations of a meta configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubConfigs {
  Fixed(Vec<String>),
  /// `android_<arch>` for every `--android-arch`.
  AndroidArchs,
  /// `ios_arm64` for `arm64`, `iossimulator_<arch>` for the others.
  IosArchs,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigKind {
  Concrete(CrossTarget),
  Meta {
    subs: SubConfigs,
    /// Synthetic node appended after all sub-resolutions.
    merge: Option<String>,
  },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDef {
  pub name: String,
  pub family: Family,
  pub linkage: Linkage,
  /// Toolchain components every node of this configuration needs.
  pub toolchains: Vec<String>,
  pub compatible_hosts: Vec<HostSystem>,
  pub kind: ConfigKind,
  /// Library directory overriding the host libprefix.
  pub libdir: Option<String>,
  /// Extra autotools configure arguments (e.g. `--host=`).
  pub configure_options: Vec<String>,
}

impl ConfigDef {
  pub fn new(name: &str, family: Family, linkage: Linkage, kind: ConfigKind) -> Self {
    Self {
      name: name.to_string(),
      family,
      linkage,
      toolchains: Vec::new(),
      compatible_hosts: vec![HostSystem::Fedora, HostSystem::Debian],
      kind,
      libdir: None,
      configure_options: Vec::new(),
    }
  }

  pub fn is_meta(&self) -> bool {
    matches!(self.kind, ConfigKind::Meta { .. })
  }

  /// Whether nodes of this configuration are cross compiled.
  pub fn is_cross(&self) -> bool {
    !matches!(self.family, Family::Native | Family::Neutral)
  }

  pub fn is_compatible(&self, host: &HostSystem) -> bool {
    self.compatible_hosts.contains(host)
  }

  pub fn target(&self) -> Option<&CrossTarget> {
    match &self.kind {
      ConfigKind::Concrete(target) => Some(target),
      ConfigKind::Meta { .. } => None,
    }
  }

  /// Names of the sub-configurations of a meta configuration, in order.
  pub fn sub_configs(&self, options: &BuildOptions) -> Vec<String> {
    match &self.kind {
      ConfigKind::Concrete(_) => Vec::new(),
      ConfigKind::Meta { subs, .. } => match subs {
        SubConfigs::Fixed(names) => names.clone(),
        SubConfigs::AndroidArchs => options.android_arch.iter().map(|a| format!("android_{a}")).collect(),
        SubConfigs::IosArchs => options
          .ios_arch
          .iter()
          .map(|a| match a.as_str() {
            "arm64" => "ios_arm64".to_string(),
            other => format!("iossimulator_{other}"),
          })
          .collect(),
      },
    }
  }

  pub fn merge_component(&self) -> Option<&str> {
    match &self.kind {
      ConfigKind::Meta { merge, .. } => merge.as_deref(),
      ConfigKind::Concrete(_) => None,
    }
  }
}
