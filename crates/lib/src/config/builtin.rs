//! Builtin build configurations.

use super::ConfigRegistry;
use super::types::{AndroidArch, ConfigDef, ConfigKind, CrossTarget, Family, Linkage, SubConfigs};
use crate::consts::NEUTRAL_CONFIG;
use crate::platform::host::HostSystem;

pub fn register_builtin(registry: &mut ConfigRegistry) {
  let all_hosts = vec![HostSystem::Fedora, HostSystem::Debian, HostSystem::Darwin];

  registry.register(ConfigDef {
    compatible_hosts: all_hosts.clone(),
    ..ConfigDef::new(
      NEUTRAL_CONFIG,
      Family::Neutral,
      Linkage::Neutral,
      ConfigKind::Concrete(CrossTarget::Native),
    )
  });
  registry.register(ConfigDef {
    compatible_hosts: all_hosts,
    ..native("native_dyn", Linkage::Dynamic)
  });
  registry.register(native("native_static", Linkage::Static));
  registry.register(native(
    "native_mixed",
    Linkage::Mixed {
      static_config: "native_static".to_string(),
    },
  ));

  for name in ["arm", "arm64", "x86", "x86_64"] {
    if let Some(arch) = AndroidArch::lookup(name) {
      registry.register(android(arch));
    }
  }
  registry.register(ConfigDef::new(
    "android",
    Family::Android,
    Linkage::Static,
    ConfigKind::Meta {
      subs: SubConfigs::AndroidArchs,
      merge: None,
    },
  ));

  registry.register(apple(
    "ios_arm64",
    Family::Ios,
    Linkage::Static,
    ("iphoneos", "arm64", "aarch64-apple-ios", "arm-apple-darwin"),
    Some("-miphoneos-version-min=15.0"),
  ));
  registry.register(apple(
    "iossimulator_x86_64",
    Family::Ios,
    Linkage::Static,
    ("iphonesimulator", "x86_64", "x86_64-apple-ios-simulator", "x86_64-apple-darwin"),
    Some("-mios-simulator-version-min=15.0"),
  ));
  registry.register(apple(
    "iossimulator_arm64",
    Family::Ios,
    Linkage::Static,
    ("iphonesimulator", "arm64", "arm64-apple-ios14.0-simulator", "arm-apple-darwin"),
    Some("-mios-simulator-version-min=15.0"),
  ));
  registry.register(ConfigDef {
    compatible_hosts: vec![HostSystem::Darwin],
    ..ConfigDef::new(
      "ios_multi",
      Family::Ios,
      Linkage::Static,
      ConfigKind::Meta {
        subs: SubConfigs::IosArchs,
        merge: Some("_ios_fat_lib".to_string()),
      },
    )
  });

  let macos_sdk = ("macosx", "arm64", "arm64-apple-macos", "aarch64-apple-darwin");
  let macos_min = Some("-mmacosx-version-min=12.0");
  registry.register(apple("macos_arm64_static", Family::Macos, Linkage::Static, macos_sdk, macos_min));
  registry.register(apple(
    "macos_arm64_mixed",
    Family::Macos,
    Linkage::Mixed {
      static_config: "macos_arm64_static".to_string(),
    },
    macos_sdk,
    macos_min,
  ));
  registry.register(apple(
    "macos_x86_64",
    Family::Macos,
    Linkage::Dynamic,
    ("macosx", "x86_64", "x86_64-apple-macos", "x86_64-apple-darwin"),
    macos_min,
  ));
  registry.register(ConfigDef {
    compatible_hosts: vec![HostSystem::Darwin],
    ..ConfigDef::new(
      "apple_all_static",
      Family::Macos,
      Linkage::Static,
      ConfigKind::Meta {
        subs: SubConfigs::Fixed(vec![
          "macos_arm64_static".to_string(),
          "ios_arm64".to_string(),
          "iossimulator_arm64".to_string(),
        ]),
        merge: Some("apple_xcframework".to_string()),
      },
    )
  });

  registry.register(win32("win32_dyn", Linkage::Dynamic));
  registry.register(win32("win32_static", Linkage::Static));

  registry.register(gnu(
    "aarch64_musl_static",
    Family::Musl,
    Linkage::Static,
    ("aarch64-linux-musl", "aarch64_musl", "aarch64", "aarch64"),
  ));
  for (name, linkage) in [("armv6_static", Linkage::Static), ("armv6_dyn", Linkage::Dynamic)] {
    registry.register(ConfigDef {
      libdir: Some("lib/armv6-rpi-linux-gnueabihf".to_string()),
      ..gnu(
        name,
        Family::Armhf,
        linkage,
        ("armv6-rpi-linux-gnueabihf", "armv6", "arm", "armv6"),
      )
    });
  }
}

fn native(name: &str, linkage: Linkage) -> ConfigDef {
  ConfigDef::new(name, Family::Native, linkage, ConfigKind::Concrete(CrossTarget::Native))
}

fn android(arch: AndroidArch) -> ConfigDef {
  let name = format!("android_{}", arch.name);
  let host = format!("--host={}", arch.arch_full);
  ConfigDef {
    toolchains: vec!["android-ndk".to_string()],
    configure_options: vec![host],
    ..ConfigDef::new(
      &name,
      Family::Android,
      Linkage::Static,
      ConfigKind::Concrete(CrossTarget::Android { arch }),
    )
  }
}

/// `(sdk, arch, target, host_triple)`
type AppleSdk<'a> = (&'a str, &'a str, &'a str, &'a str);

fn apple(name: &str, family: Family, linkage: Linkage, sdk: AppleSdk<'_>, min_version_flag: Option<&str>) -> ConfigDef {
  let (sdk, arch, target, host_triple) = sdk;
  ConfigDef {
    compatible_hosts: vec![HostSystem::Darwin],
    configure_options: vec![format!("--host={host_triple}")],
    ..ConfigDef::new(
      name,
      family,
      linkage,
      ConfigKind::Concrete(CrossTarget::Apple {
        sdk: sdk.to_string(),
        arch: arch.to_string(),
        target: target.to_string(),
        host_triple: host_triple.to_string(),
        min_version_flag: min_version_flag.map(str::to_string),
      }),
    )
  }
}

fn win32(name: &str, linkage: Linkage) -> ConfigDef {
  let triple = "i686-w64-mingw32";
  ConfigDef {
    configure_options: vec![format!("--host={triple}")],
    ..ConfigDef::new(
      name,
      Family::Win32,
      linkage,
      ConfigKind::Concrete(CrossTarget::Mingw {
        triple: triple.to_string(),
      }),
    )
  }
}

/// `(triple, toolchain, cpu_family, cpu)`
fn gnu(name: &str, family: Family, linkage: Linkage, spec: (&str, &str, &str, &str)) -> ConfigDef {
  let (triple, toolchain, cpu_family, cpu) = spec;
  ConfigDef {
    toolchains: vec![toolchain.to_string()],
    configure_options: vec![format!("--host={triple}")],
    ..ConfigDef::new(
      name,
      family,
      linkage,
      ConfigKind::Concrete(CrossTarget::Gnu {
        triple: triple.to_string(),
        toolchain: toolchain.to_string(),
        cpu_family: cpu_family.to_string(),
        cpu: cpu.to_string(),
      }),
    )
  }
}
