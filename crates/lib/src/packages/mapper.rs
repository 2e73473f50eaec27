//! Which host packages stand in for which components.
//!
//! Tables are keyed `<host>_<config>`. A component mapped to a package list is
//! satisfied by those packages; a component mapped to nothing, or absent,
//! is built. `COMMON` lists tools every build on that host needs.

use std::collections::BTreeMap;

use crate::platform::host::HostSystem;

const COMMON: &str = "COMMON";

const FEDORA_COMMON: &[&str] = &[
  "automake",
  "libtool",
  "cmake",
  "git",
  "ccache",
  "pkgconfig",
  "gcc-c++",
  "gettext-devel",
  "meson",
  "ninja-build",
];

const DEBIAN_COMMON: &[&str] = &[
  "automake",
  "libtool",
  "cmake",
  "git",
  "ccache",
  "pkg-config",
  "gcc",
  "autopoint",
  "meson",
  "ninja-build",
];

const DARWIN_COMMON: &[&str] = &["autoconf", "automake", "libtool", "cmake", "pkg-config", "meson", "ninja"];

const ANDROID_ARCHS: &[&str] = &["arm", "arm64", "x86", "x86_64"];

/// Package names for one `(host, config)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageMapper {
  key: String,
  entries: BTreeMap<String, Option<Vec<String>>>,
}

impl PackageMapper {
  fn new(key: String) -> Self {
    Self {
      key,
      entries: BTreeMap::new(),
    }
  }

  fn with(mut self, name: &str, packages: &[&str]) -> Self {
    self
      .entries
      .insert(name.to_string(), Some(packages.iter().map(|p| p.to_string()).collect()));
    self
  }

  fn with_common(self, base: &[&str], extra: &[&str]) -> Self {
    let all: Vec<&str> = base.iter().chain(extra).copied().collect();
    self.with(COMMON, &all)
  }

  /// Explicitly built even if the host has some package for it.
  fn built(mut self, name: &str) -> Self {
    self.entries.insert(name.to_string(), None);
    self
  }

  /// The table for `host` building `config`, if one is known.
  pub fn lookup(host: &HostSystem, config: &str) -> Option<Self> {
    let key = format!("{}_{config}", host.as_str());
    let mapper = Self::new(key);
    let mapper = match (host, config) {
      (HostSystem::Fedora, "native_dyn") => mapper
        .with_common(FEDORA_COMMON, &[])
        .built("xapian-core")
        .built("pugixml")
        .built("icu4c")
        .built("libzim")
        .with("libmicrohttpd", &["libmicrohttpd-devel"])
        .with("zlib", &["zlib-devel"])
        .with("lzma", &["xz-devel"])
        .with("uuid", &["libuuid-devel"]),
      (HostSystem::Fedora, "native_static" | "native_mixed") => mapper
        .with_common(FEDORA_COMMON, &["glibc-static", "libstdc++-static"])
        .with("zlib", &["zlib-devel", "zlib-static"])
        .with("lzma", &["xz-devel", "xz-static"]),
      (HostSystem::Fedora, "win32_dyn") => mapper
        .with_common(
          FEDORA_COMMON,
          &["mingw32-gcc-c++", "mingw32-bzip2", "mingw32-win-iconv", "mingw32-winpthreads", "wine"],
        )
        .with("zlib", &["mingw32-zlib"])
        .with("lzma", &["mingw32-xz-libs"])
        .with("libmicrohttpd", &["mingw32-libmicrohttpd"]),
      (HostSystem::Fedora, "win32_static") => mapper
        .with_common(
          FEDORA_COMMON,
          &[
            "mingw32-gcc-c++",
            "mingw32-bzip2-static",
            "mingw32-win-iconv-static",
            "mingw32-winpthreads-static",
            "wine",
          ],
        )
        .with("zlib", &["mingw32-zlib-static"])
        .with("lzma", &["mingw32-xz-libs-static"])
        .built("libmicrohttpd"),
      (HostSystem::Fedora, c) if is_android(c) => mapper.with_common(FEDORA_COMMON, &["java-1.8.0-openjdk-devel"]),
      (HostSystem::Fedora, c) if is_plain(c) => mapper.with_common(FEDORA_COMMON, &[]),

      (HostSystem::Debian, "native_dyn") => mapper
        .with_common(DEBIAN_COMMON, &["libbz2-dev", "libmagic-dev"])
        .with("zlib", &["zlib1g-dev"])
        .with("uuid", &["uuid-dev"])
        .with("libmicrohttpd", &["libmicrohttpd-dev", "ccache"]),
      (HostSystem::Debian, "native_static" | "native_mixed") => mapper
        .with_common(DEBIAN_COMMON, &["libbz2-dev", "libmagic-dev"])
        .with("zlib", &["zlib1g-dev"])
        .with("uuid", &["uuid-dev"]),
      (HostSystem::Debian, "win32_dyn" | "win32_static") => mapper.with_common(
        DEBIAN_COMMON,
        &["g++-mingw-w64-i686", "gcc-mingw-w64-i686", "gcc-mingw-w64-base", "mingw-w64-tools"],
      ),
      (HostSystem::Debian, c) if is_android(c) => mapper.with_common(DEBIAN_COMMON, &["default-jdk"]),
      (HostSystem::Debian, c) if is_plain(c) => mapper.with_common(DEBIAN_COMMON, &[]),

      (HostSystem::Darwin, "native_dyn" | "native_static" | "native_mixed") => {
        mapper.with_common(DARWIN_COMMON, &[]).with("file", &["libmagic"])
      }
      (HostSystem::Darwin, c) if c.starts_with("ios") || c.starts_with("macos") || c.starts_with("apple") => {
        mapper.with_common(DARWIN_COMMON, &[])
      }
      (HostSystem::Darwin, c) if is_android(c) || is_plain(c) => mapper.with_common(DARWIN_COMMON, &[]),
      _ => return None,
    };
    Some(mapper)
  }

  pub fn key(&self) -> &str {
    &self.key
  }

  /// Packages every build with this table needs.
  pub fn common(&self) -> &[String] {
    self.packages(COMMON).unwrap_or_default()
  }

  /// Packages providing `component`, or `None` when it must be built.
  pub fn packages(&self, component: &str) -> Option<&[String]> {
    self
      .entries
      .get(component)
      .and_then(|entry| entry.as_deref())
      .filter(|packages| !packages.is_empty())
  }
}

fn is_android(config: &str) -> bool {
  config == "android"
    || config
      .strip_prefix("android_")
      .is_some_and(|arch| ANDROID_ARCHS.contains(&arch))
}

/// Configurations whose whole toolchain is fetched, so only the common tools are needed.
fn is_plain(config: &str) -> bool {
  config == crate::consts::NEUTRAL_CONFIG || config.starts_with("armv6") || config.starts_with("aarch64_musl")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn debian_native_maps_zlib() {
    let mapper = PackageMapper::lookup(&HostSystem::Debian, "native_dyn").unwrap();
    assert_eq!(mapper.key(), "debian_native_dyn");
    assert_eq!(mapper.packages("zlib"), Some(&["zlib1g-dev".to_string()][..]));
    assert!(mapper.common().contains(&"autopoint".to_string()));
    assert_eq!(mapper.packages("libzim"), None);
  }

  #[test]
  fn explicitly_built_components_have_no_packages() {
    let mapper = PackageMapper::lookup(&HostSystem::Fedora, "native_dyn").unwrap();
    assert_eq!(mapper.packages("icu4c"), None);
    assert!(mapper.packages("lzma").is_some());
  }

  #[test]
  fn android_archs_share_a_table() {
    let arm = PackageMapper::lookup(&HostSystem::Fedora, "android_arm").unwrap();
    let x86 = PackageMapper::lookup(&HostSystem::Fedora, "android_x86_64").unwrap();
    assert_eq!(arm.common(), x86.common());
    assert!(arm.common().contains(&"java-1.8.0-openjdk-devel".to_string()));
  }

  #[test]
  fn unknown_pairs_have_no_table() {
    assert!(PackageMapper::lookup(&HostSystem::Other("arch".to_string()), "native_dyn").is_none());
    assert!(PackageMapper::lookup(&HostSystem::Debian, "ios_arm64").is_none());
  }
}
