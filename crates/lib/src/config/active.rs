//! Configurations taking part in a run.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use tracing::{debug, info};

use super::cross::{self, CrossSetup};
use super::types::{ConfigDef, Linkage};
use super::{ConfigError, ConfigRegistry};
use crate::catalogue::Catalogue;
use crate::execute::env::EnvBuilder;
use crate::platform::HostEnv;
use crate::platform::host::HostSystem;

/// Lazily activated configurations, cached by name in activation order.
#[derive(Debug)]
pub struct RunningConfigs<'a> {
  registry: &'a ConfigRegistry,
  host: &'a HostSystem,
  active: Vec<&'a ConfigDef>,
  by_name: HashMap<String, usize>,
}

impl<'a> RunningConfigs<'a> {
  pub fn new(registry: &'a ConfigRegistry, host: &'a HostSystem) -> Self {
    Self {
      registry,
      host,
      active: Vec::new(),
      by_name: HashMap::new(),
    }
  }

  /// Look up a configuration, activating it on first use.
  ///
  /// Fails with `IncompatibleHost` when the host is not supported. Activating a
  /// mixed configuration also activates its static partner.
  pub fn get(&mut self, name: &str) -> Result<&'a ConfigDef, ConfigError> {
    if let Some(&index) = self.by_name.get(name) {
      return Ok(self.active[index]);
    }

    let registry = self.registry;
    let def = registry.get(name)?;
    if !def.is_compatible(self.host) {
      return Err(ConfigError::IncompatibleHost {
        config: name.to_string(),
        host: self.host.to_string(),
      });
    }

    debug!(config = %name, "activating configuration");
    self.by_name.insert(name.to_string(), self.active.len());
    self.active.push(def);

    if let Linkage::Mixed { static_config } = &def.linkage {
      self.get(static_config)?;
    }
    Ok(def)
  }

  pub fn is_active(&self, name: &str) -> bool {
    self.by_name.contains_key(name)
  }

  /// Activated configurations, in activation order.
  pub fn active(&self) -> &[&'a ConfigDef] {
    &self.active
  }
}

/// Which cross overlays an operation's environment receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overlays {
  pub cross_flags: bool,
  pub cross_compilers: bool,
  pub cross_path: bool,
}

impl Overlays {
  pub const ALL: Overlays = Overlays {
    cross_flags: true,
    cross_compilers: true,
    cross_path: true,
  };

  pub const NONE: Overlays = Overlays {
    cross_flags: false,
    cross_compilers: false,
    cross_path: false,
  };

  /// For tools that read compilers from a cross file (cmake, meson).
  pub const CROSS_ENV_ONLY: Overlays = Overlays {
    cross_flags: true,
    cross_compilers: false,
    cross_path: true,
  };
}

/// A finalized configuration: directories and cross environment.
#[derive(Debug, Clone)]
pub struct BuildEnv {
  pub def: ConfigDef,
  pub build_dir: PathBuf,
  pub install_dir: PathBuf,
  pub libprefix: String,
  pub cross: Option<CrossSetup>,
  pub meson_crossfile: Option<PathBuf>,
  pub cmake_crossfile: Option<PathBuf>,
  /// Install directory of the static partner of a mixed configuration.
  pub static_install_dir: Option<PathBuf>,
  ccache_dir: Option<PathBuf>,
}

impl BuildEnv {
  pub fn name(&self) -> &str {
    &self.def.name
  }

  pub fn arch_name(&self) -> String {
    self
      .def
      .target()
      .map(|t| t.arch_name())
      .unwrap_or_else(|| std::env::consts::ARCH.to_string())
  }

  /// Environment for one operation of a node bound to this configuration.
  pub fn compose(&self, overlays: Overlays) -> EnvBuilder {
    let mut env = EnvBuilder::inherit();
    let install = &self.install_dir;
    let libdir = install.join(&self.libprefix);

    env.append_paths("PKG_CONFIG_PATH", [libdir.join("pkgconfig")]);
    let mut path_prefix = vec![install.join("bin")];
    path_prefix.extend(self.ccache_dir.iter().cloned());
    env.prepend_paths("PATH", path_prefix);
    env.append_paths("LD_LIBRARY_PATH", [install.join("lib"), libdir.clone()]);
    env.set_flags("CPPFLAGS", [format!("-I{}", install.join("include").display())]);
    env.set_flags(
      "LDFLAGS",
      [
        format!("-L{}", install.join("lib").display()),
        format!("-L{}", libdir.display()),
      ],
    );

    if let Some(static_install) = &self.static_install_dir {
      env.prepend_paths("PATH", [static_install.join("bin")]);
      env.append_paths(
        "PKG_CONFIG_PATH",
        [static_install.join(&self.libprefix).join("pkgconfig")],
      );
      env.append_flags("CPPFLAGS", [format!("-I{}", static_install.join("include").display())]);
    }

    if overlays.cross_flags {
      if self.def.linkage.is_static() {
        env.append_flags("CFLAGS", ["-fPIC"]);
        env.append_flags("CXXFLAGS", ["-fPIC"]);
      }
      if let Some(cross) = &self.cross {
        env.prepend_flags("CFLAGS", cross.cflags.iter().cloned());
        env.prepend_flags("CXXFLAGS", cross.cxxflags.iter().cloned());
        env.prepend_flags("LDFLAGS", cross.ldflags.iter().cloned());
        for (key, value) in &cross.extra_env {
          env.set(key, value.clone());
        }
      }
    }

    if let Some(cross) = &self.cross {
      if overlays.cross_compilers {
        for (key, program) in &cross.binaries {
          env.set(key, program.clone());
        }
      }
      if overlays.cross_path {
        env.prepend_paths("PATH", cross.bin_dirs.iter());
      }
    }

    env
  }
}

/// Finalized configurations of a run, in activation order.
#[derive(Debug, Clone, Default)]
pub struct Environments {
  envs: Vec<BuildEnv>,
  index: HashMap<String, usize>,
}

impl Environments {
  pub fn get(&self, name: &str) -> Option<&BuildEnv> {
    self.index.get(name).map(|&i| &self.envs[i])
  }

  pub fn iter(&self) -> impl Iterator<Item = &BuildEnv> {
    self.envs.iter()
  }

  fn push(&mut self, env: BuildEnv) {
    self.index.insert(env.def.name.clone(), self.envs.len());
    self.envs.push(env);
  }
}

/// Where a toolchain component ends up: neutral toolchains are unpacked once,
/// the others are installed per configuration.
pub fn toolchain_dir(host: &HostEnv, catalogue: &Catalogue, config: &str, toolchain: &str) -> Option<PathBuf> {
  let def = catalogue.get(toolchain).ok()?;
  let full_name = def.full_name();
  if def.is_neutral_toolchain() {
    Some(host.dirs.toolchain_dir(None, &full_name))
  } else {
    Some(host.dirs.toolchain_dir(Some(config), &full_name))
  }
}

/// Compute directories and cross environments for every activated
/// configuration, and write cross files for the cross ones.
pub fn finalize(configs: &[&ConfigDef], catalogue: &Catalogue, host: &HostEnv) -> Result<Environments, ConfigError> {
  let mut envs = Environments::default();

  for def in configs {
    let roots: BTreeMap<String, PathBuf> = def
      .toolchains
      .iter()
      .filter_map(|tc| toolchain_dir(host, catalogue, &def.name, tc).map(|dir| (tc.clone(), dir)))
      .collect();

    let build_dir = host.dirs.build_dir(&def.name);
    let mut env = BuildEnv {
      def: (*def).clone(),
      install_dir: host.dirs.install_dir(&def.name),
      libprefix: def.libdir.clone().unwrap_or_else(|| host.libprefix.clone()),
      cross: cross::compute(def, &roots, &host.system)?,
      meson_crossfile: None,
      cmake_crossfile: None,
      static_install_dir: None,
      ccache_dir: host.ccache_dir.clone(),
      build_dir,
    };

    std::fs::create_dir_all(&env.build_dir).map_err(|source| ConfigError::Write {
      path: env.build_dir.clone(),
      source,
    })?;

    if let Some(setup) = &env.cross {
      let meson = env.build_dir.join("meson_cross_file.txt");
      write_file(&meson, &cross::render_meson(setup))?;
      let cmake = env.build_dir.join("cmake_cross_file.txt");
      write_file(&cmake, &cross::render_cmake(setup))?;
      env.meson_crossfile = Some(meson);
      env.cmake_crossfile = Some(cmake);
    }

    info!(config = %def.name, build_dir = %env.build_dir.display(), cross = env.cross.is_some(), "configuration ready");
    envs.push(env);
  }

  let partners: Vec<(String, PathBuf)> = envs
    .iter()
    .filter_map(|env| match &env.def.linkage {
      Linkage::Mixed { static_config } => Some((env.def.name.clone(), host.dirs.install_dir(static_config))),
      _ => None,
    })
    .collect();
  for (name, dir) in partners {
    if let Some(&i) = envs.index.get(&name) {
      envs.envs[i].static_install_dir = Some(dir);
    }
  }

  Ok(envs)
}

fn write_file(path: &PathBuf, content: &str) -> Result<(), ConfigError> {
  std::fs::write(path, content).map_err(|source| ConfigError::Write {
    path: path.clone(),
    source,
  })
}
