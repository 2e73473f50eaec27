//! Builtin component recipes.

use super::Catalogue;
use super::types::{
  BuildDef, BuildMethod, ComponentDef, DepRef, Hook, HookCwd, MergeMode, RemoteFile, SourceDef, ToolchainInfo,
};

/// Register every builtin recipe.
pub fn register_builtin(catalogue: &mut Catalogue) {
  for def in [
    zlib(),
    lzma(),
    zstd(),
    xapian_core(),
    icu4c(),
    pugixml(),
    libmicrohttpd(),
    libzim(),
    zim_tools(),
    android_ndk(),
    aarch64_musl(),
    armv6(),
    merge("_ios_fat_lib", MergeMode::Lipo),
    merge("apple_xcframework", MergeMode::XcFramework),
  ] {
    catalogue.register(def);
  }
}

fn strings(items: &[&str]) -> Vec<String> {
  items.iter().map(|s| s.to_string()).collect()
}

fn archive(name: &str, sha256: &str, url: Option<&str>) -> SourceDef {
  SourceDef::Archive {
    archive: RemoteFile::new(name, sha256, url),
    top_dir: None,
    patches: Vec::new(),
    post_prepare: None,
  }
}

fn git(remote: &str, dir: &str, release_ref: Option<&str>) -> SourceDef {
  SourceDef::Git {
    remote: remote.to_string(),
    dir: dir.to_string(),
    base_ref: "main".to_string(),
    release_ref: release_ref.map(str::to_string),
    post_prepare: None,
  }
}

fn make() -> BuildMethod {
  BuildMethod::Make {
    configure_script: "$${source_dir}/configure".to_string(),
    linkage_flags: true,
  }
}

fn component(name: &str, version: Option<&str>, source: SourceDef, build: BuildDef) -> ComponentDef {
  ComponentDef {
    version: version.map(str::to_string),
    source,
    build,
    ..ComponentDef::new(name)
  }
}

fn zlib() -> ComponentDef {
  // zlib's configure does not support out of tree builds.
  let build = BuildDef {
    static_configure_options: strings(&["--static"]),
    pre_build: Some(Hook::new(&["cp", "-a", "$${source_dir}/.", "$${build_dir}"], HookCwd::Build)),
    ..BuildDef::new(BuildMethod::Make {
      configure_script: "$${build_dir}/configure".to_string(),
      linkage_flags: false,
    })
  };
  component(
    "zlib",
    Some("1.2.12"),
    archive(
      "zlib-1.2.12.tar.gz",
      "91844808532e5ce316b3c010929493c0244f3d37593afd6de04f71821d5136d9",
      None,
    ),
    build,
  )
}

fn lzma() -> ComponentDef {
  let build = BuildDef {
    configure_options: strings(&["--disable-assembler", "--disable-xz", "--disable-xzdec"]),
    ..BuildDef::new(make())
  };
  component(
    "lzma",
    Some("5.2.3"),
    archive(
      "xz-5.2.3.tar.bz2",
      "fd9ca16de1052aac899ad3495ad20dfa906c27b4a5070102a2ec35ca3a4740c1",
      Some("https://tukaani.org/xz/xz-5.2.3.tar.bz2"),
    ),
    build,
  )
}

fn zstd() -> ComponentDef {
  let build = BuildDef {
    configure_options: strings(&["-Dbin_programs=false", "-Dbin_contrib=false"]),
    source_subdir: Some("build/meson".to_string()),
    ..BuildDef::new(BuildMethod::Meson)
  };
  component(
    "zstd",
    Some("1.4.4"),
    archive(
      "zstd-1.4.4.tar.gz",
      "59ef70ebb757ffe74a7b3fe9c305e2ba3350021a918d168a046c6300aeea9315",
      Some("https://github.com/facebook/zstd/releases/download/v1.4.4/zstd-1.4.4.tar.gz"),
    ),
    build,
  )
}

fn xapian_core() -> ComponentDef {
  let build = BuildDef {
    configure_options: strings(&["--disable-sse", "--disable-backend-inmemory", "--disable-documentation"]),
    ..BuildDef::new(make())
  };
  ComponentDef {
    deps: vec![DepRef::from("zlib"), DepRef::from("lzma")],
    ..component(
      "xapian-core",
      Some("1.4.5"),
      archive(
        "xapian-core-1.4.5.tar.xz",
        "85b5f952de9df925fd13e00f6e82484162fd506d38745613a50b0a2064c6b02b",
        None,
      ),
      build,
    )
  }
}

fn icu4c() -> ComponentDef {
  let build = BuildDef {
    configure_options: strings(&[
      "--disable-samples",
      "--disable-tests",
      "--disable-extras",
      "--disable-dyload",
      "--enable-rpath",
      "--disable-icuio",
      "--disable-layoutex",
    ]),
    cross_configure_options: strings(&["--with-cross-build=$${node:native_static:icu4c:build_dir}"]),
    source_subdir: Some("source".to_string()),
    ..BuildDef::new(make())
  };
  let source = SourceDef::Archive {
    archive: RemoteFile::new(
      "icu4c-73_2-src.tgz",
      "818a80712ed3caacd9b652305e01afc7fa167e6f2e94996da44b90c2ab604ce1",
      Some("https://github.com/unicode-org/icu/releases/download/release-73-2/icu4c-73_2-src.tgz"),
    ),
    top_dir: Some("icu".to_string()),
    patches: Vec::new(),
    post_prepare: None,
  };
  ComponentDef {
    // Cross builds run the code generators of a host build.
    cross_deps: vec![DepRef::Qualified("native_static".to_string(), "icu4c".to_string())],
    ..component("icu4c", Some("73.2"), source, build)
  }
}

fn pugixml() -> ComponentDef {
  component(
    "pugixml",
    Some("1.15"),
    archive(
      "pugixml-1.15.tar.gz",
      "2e094287f58de02047b2ef23122904de0e02e3b4e9d6b44952d087e746b25974",
      Some("https://dev.kiwix.org/kiwix-build/pugixml-1.15.tar.gz"),
    ),
    BuildDef::new(BuildMethod::Meson),
  )
}

fn libmicrohttpd() -> ComponentDef {
  let build = BuildDef {
    configure_options: strings(&[
      "--disable-https",
      "--without-libgcrypt",
      "--without-libcurl",
      "--disable-doc",
      "--disable-examples",
    ]),
    ..BuildDef::new(make())
  };
  component(
    "libmicrohttpd",
    Some("0.9.46"),
    archive(
      "libmicrohttpd-0.9.46.tar.gz",
      "06dbd2654f390fa1e8196fe063fc1449a6c2ed65a38199a49bf29ad8a93b8979",
      Some("http://ftp.gnu.org/gnu/libmicrohttpd/libmicrohttpd-0.9.46.tar.gz"),
    ),
    build,
  )
}

fn libzim() -> ComponentDef {
  let build = BuildDef {
    configure_options: strings(&["-Dexamples=false"]),
    static_configure_options: strings(&["-Dstatic-linkage=true"]),
    ..BuildDef::new(BuildMethod::Meson)
  };
  ComponentDef {
    deps: ["zstd", "lzma", "xapian-core", "icu4c"].into_iter().map(DepRef::from).collect(),
    ..component(
      "libzim",
      None,
      git("https://github.com/openzim/libzim.git", "libzim", Some("9.2.3")),
      build,
    )
  }
}

fn zim_tools() -> ComponentDef {
  let build = BuildDef {
    static_configure_options: strings(&["-Dstatic-linkage=true"]),
    ..BuildDef::new(BuildMethod::Meson)
  };
  ComponentDef {
    deps: vec![DepRef::from("libzim")],
    ..component(
      "zim-tools",
      None,
      git("https://github.com/openzim/zim-tools.git", "zim-tools", Some("3.5.0")),
      build,
    )
  }
}

fn android_ndk() -> ComponentDef {
  let build = BuildDef::new(BuildMethod::Script {
    configure: None,
    compile: Some(strings(&[
      "$${source_dir}/build/tools/make_standalone_toolchain.py",
      "--arch=$${arch}",
      "--api=24",
      "--install-dir=$${build_dir}",
      "--force",
    ])),
    test: None,
    install: None,
  });
  ComponentDef {
    force_native_build: true,
    toolchain: Some(ToolchainInfo { neutral: false }),
    ..component(
      "android-ndk",
      Some("r21e"),
      archive(
        "android-ndk-r21e-linux-x86_64.zip",
        "ad7ce5467e18d40050dc51b8e7affc3e635c85bd8c59be62de32352328ed467e",
        Some("https://dl.google.com/android/repository/android-ndk-r21e-linux-x86_64.zip"),
      ),
      build,
    )
  }
}

fn aarch64_musl() -> ComponentDef {
  ComponentDef {
    toolchain: Some(ToolchainInfo { neutral: true }),
    ..component(
      "aarch64_musl",
      None,
      archive(
        "aarch64-linux-musl-cross.tgz",
        "c909817856d6ceda86aa510894fa3527eac7989f0ef6e87b5721c58737a06c38",
        Some("https://musl.cc/aarch64-linux-musl-cross.tgz"),
      ),
      BuildDef::default(),
    )
  }
}

fn armv6() -> ComponentDef {
  let source = SourceDef::Archive {
    archive: RemoteFile::new(
      "x-tools-armv6-rpi-linux-gnueabihf.tar.xz",
      "4c371c4c5b55ebd1f3d7dd26b14703632d9ba47423f901bcd9303d83ad444434",
      Some(
        "https://github.com/tttapa/docker-arm-cross-toolchain/releases/download/0.1.0/x-tools-armv6-rpi-linux-gnueabihf.tar.xz",
      ),
    ),
    top_dir: Some("x-tools/armv6-rpi-linux-gnueabihf".to_string()),
    patches: Vec::new(),
    post_prepare: None,
  };
  ComponentDef {
    toolchain: Some(ToolchainInfo { neutral: true }),
    ..component("armv6", None, source, BuildDef::default())
  }
}

fn merge(name: &str, mode: MergeMode) -> ComponentDef {
  component(name, None, SourceDef::Noop, BuildDef::new(BuildMethod::MergeLibs { mode }))
}
